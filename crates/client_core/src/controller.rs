//! Reconciliation controller: turns user intents into remote calls and merges
//! the settled results back into the local directory.
//!
//! The state lock is never held across a remote call. Intents against the same
//! target (person id, or lowercased name for a create) are suppressed while one
//! is in flight; overlapping intents against different targets apply
//! last-resume-wins.

use std::{
    collections::HashSet,
    sync::{Arc, Weak},
    time::Duration,
};

use shared::domain::{name_key, Person, PersonDraft, PersonId};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    confirm::{Confirm, ConfirmPrompt},
    error::DirectoryError,
    notification::{Notification, NotificationSlot, Polarity},
    remote::DirectoryClient,
    store::DirectoryStore,
};

pub const DEFAULT_NOTIFICATION_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub notification_ttl: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            notification_ttl: DEFAULT_NOTIFICATION_TTL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryEvent {
    PersonsChanged(Vec<Person>),
    NotificationChanged(Option<Notification>),
    FilterChanged(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Blank name; nothing happened.
    Ignored,
    /// An intent against the same target is still in flight.
    Busy,
    /// The user declined to overwrite the existing number.
    Declined,
    Created(Person),
    Updated(Person),
    /// The record was gone server-side; the stale local entry was dropped.
    Evicted(PersonId),
    Failed(DirectoryError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// No local entry with that id.
    UnknownTarget,
    Busy,
    Declined,
    Deleted(Person),
    /// The server no longer had the record; it was dropped locally as well.
    AlreadyGone(Person),
    Failed(DirectoryError),
}

/// Read-only projection for presentation layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryView {
    pub persons: Vec<Person>,
    pub visible: Vec<Person>,
    pub filter: String,
    pub draft: PersonDraft,
    pub notification: Option<Notification>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum IntentTarget {
    Person(PersonId),
    NewName(String),
}

#[derive(Debug, Default)]
struct DirectoryState {
    store: DirectoryStore,
    draft: PersonDraft,
    filter: String,
    notification: NotificationSlot,
    loaded: bool,
    inflight: HashSet<IntentTarget>,
}

/// Holds one in-flight marker. The marker is cleared when the guard is
/// settled, released, or dropped with the intent that owned it.
struct InflightGuard {
    state: Arc<Mutex<DirectoryState>>,
    target: Option<IntentTarget>,
}

impl InflightGuard {
    /// Clears the marker inside a critical section the caller already holds.
    fn settle(mut self, state: &mut DirectoryState) {
        if let Some(target) = self.target.take() {
            state.inflight.remove(&target);
        }
    }

    async fn release(mut self) {
        if let Some(target) = self.target.take() {
            self.state.lock().await.inflight.remove(&target);
        }
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        let Some(target) = self.target.take() else {
            return;
        };
        debug!(?target, "directory: intent dropped before settling");
        match self.state.try_lock() {
            Ok(mut state) => {
                state.inflight.remove(&target);
            }
            Err(_) => {
                let state = Arc::clone(&self.state);
                if let Ok(handle) = tokio::runtime::Handle::try_current() {
                    handle.spawn(async move {
                        state.lock().await.inflight.remove(&target);
                    });
                }
            }
        }
    }
}

pub struct ReconciliationController {
    client: Arc<dyn DirectoryClient>,
    confirm: Arc<dyn Confirm>,
    config: ControllerConfig,
    state: Arc<Mutex<DirectoryState>>,
    events: broadcast::Sender<DirectoryEvent>,
}

impl ReconciliationController {
    pub fn new(client: Arc<dyn DirectoryClient>, confirm: Arc<dyn Confirm>) -> Self {
        Self::with_config(client, confirm, ControllerConfig::default())
    }

    pub fn with_config(
        client: Arc<dyn DirectoryClient>,
        confirm: Arc<dyn Confirm>,
        config: ControllerConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            client,
            confirm,
            config,
            state: Arc::new(Mutex::new(DirectoryState::default())),
            events,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<DirectoryEvent> {
        self.events.subscribe()
    }

    /// Populates the store with one full `list`. Once a load has succeeded,
    /// later calls return the current size without fetching again.
    pub async fn load(&self) -> Result<usize, DirectoryError> {
        {
            let guard = self.state.lock().await;
            if guard.loaded {
                debug!("directory: already loaded; skipping list");
                return Ok(guard.store.len());
            }
        }

        match self.client.list().await {
            Ok(persons) => {
                let snapshot = {
                    let mut guard = self.state.lock().await;
                    if guard.loaded {
                        return Ok(guard.store.len());
                    }
                    guard.store.populate(persons);
                    guard.loaded = true;
                    guard.store.persons().to_vec()
                };
                info!(count = snapshot.len(), "directory: initial list loaded");
                let count = snapshot.len();
                let _ = self.events.send(DirectoryEvent::PersonsChanged(snapshot));
                Ok(count)
            }
            Err(err) => {
                warn!(error = %err, "directory: initial list failed");
                self.notify(format!("Could not load phonebook: {err}"), Polarity::Error)
                    .await;
                Err(err)
            }
        }
    }

    /// Adds a new person, or replaces the number of an existing one after
    /// confirmation.
    pub async fn submit(&self, name: &str, number: &str) -> SubmitOutcome {
        let name = name.trim();
        if name.is_empty() {
            return SubmitOutcome::Ignored;
        }

        let existing = {
            let mut guard = self.state.lock().await;
            guard.draft = PersonDraft::new(name, number);
            guard.store.find_by_name(name).cloned()
        };

        match existing {
            None => self.create(PersonDraft::new(name, number)).await,
            Some(existing) => self.update_existing(existing, number).await,
        }
    }

    async fn create(&self, draft: PersonDraft) -> SubmitOutcome {
        let target = IntentTarget::NewName(name_key(&draft.name));
        let Some(inflight) = self.begin(target).await else {
            return SubmitOutcome::Busy;
        };

        let result = self.client.create(&draft).await;

        match result {
            Ok(person) => {
                let snapshot = {
                    let mut guard = self.state.lock().await;
                    inflight.settle(&mut guard);
                    guard.store.append(person.clone());
                    guard.draft = PersonDraft::default();
                    guard.store.persons().to_vec()
                };
                info!(person_id = person.id.0, "directory: person created");
                let _ = self.events.send(DirectoryEvent::PersonsChanged(snapshot));
                self.notify(format!("Added {}", person.name), Polarity::Success).await;
                SubmitOutcome::Created(person)
            }
            Err(err) => {
                inflight.release().await;
                warn!(name = %draft.name, error = %err, "directory: create failed");
                self.notify(err.to_string(), Polarity::Error).await;
                SubmitOutcome::Failed(err)
            }
        }
    }

    async fn update_existing(&self, existing: Person, number: &str) -> SubmitOutcome {
        let prompt = ConfirmPrompt::ReplaceNumber {
            existing: existing.clone(),
            number: number.to_string(),
        };
        if !self.confirm.confirm(&prompt) {
            return SubmitOutcome::Declined;
        }

        let Some(inflight) = self.begin(IntentTarget::Person(existing.id)).await else {
            return SubmitOutcome::Busy;
        };

        let draft = PersonDraft {
            number: number.to_string(),
            ..existing.to_draft()
        };
        let result = self.client.update(existing.id, &draft).await;

        match result {
            Ok(person) => {
                let snapshot = {
                    let mut guard = self.state.lock().await;
                    inflight.settle(&mut guard);
                    if !guard.store.replace(person.clone()) {
                        debug!(
                            person_id = person.id.0,
                            "directory: updated entry no longer local; leaving store as is"
                        );
                    }
                    guard.draft = PersonDraft::default();
                    guard.store.persons().to_vec()
                };
                info!(person_id = person.id.0, "directory: person updated");
                let _ = self.events.send(DirectoryEvent::PersonsChanged(snapshot));
                self.notify(format!("Updated {}", person.name), Polarity::Success).await;
                SubmitOutcome::Updated(person)
            }
            Err(DirectoryError::NotFound { id }) => {
                let snapshot = {
                    let mut guard = self.state.lock().await;
                    inflight.settle(&mut guard);
                    guard.store.remove(id);
                    guard.store.persons().to_vec()
                };
                warn!(person_id = id.0, "directory: stale entry evicted after update 404");
                let _ = self.events.send(DirectoryEvent::PersonsChanged(snapshot));
                self.notify(
                    format!(
                        "Information of {} has already been removed from server",
                        existing.name
                    ),
                    Polarity::Error,
                )
                .await;
                SubmitOutcome::Evicted(id)
            }
            Err(err) => {
                inflight.release().await;
                warn!(person_id = existing.id.0, error = %err, "directory: update failed");
                self.notify(err.to_string(), Polarity::Error).await;
                SubmitOutcome::Failed(err)
            }
        }
    }

    /// Removes a person after confirmation. A record already gone server-side
    /// counts as removed.
    pub async fn delete(&self, id: PersonId) -> DeleteOutcome {
        let target_person = {
            let guard = self.state.lock().await;
            guard.store.get(id).cloned()
        };
        let Some(person) = target_person else {
            return DeleteOutcome::UnknownTarget;
        };

        let prompt = ConfirmPrompt::Delete {
            target: person.clone(),
        };
        if !self.confirm.confirm(&prompt) {
            return DeleteOutcome::Declined;
        }

        let Some(inflight) = self.begin(IntentTarget::Person(id)).await else {
            return DeleteOutcome::Busy;
        };

        let result = self.client.remove(id).await;

        let already_gone = match result {
            Ok(()) => false,
            Err(DirectoryError::NotFound { .. }) => true,
            Err(err) => {
                inflight.release().await;
                warn!(person_id = id.0, error = %err, "directory: remove failed");
                self.notify(
                    format!("Could not delete {}: {err}", person.name),
                    Polarity::Error,
                )
                .await;
                return DeleteOutcome::Failed(err);
            }
        };

        let snapshot = {
            let mut guard = self.state.lock().await;
            inflight.settle(&mut guard);
            guard.store.remove(id);
            guard.store.persons().to_vec()
        };
        info!(person_id = id.0, already_gone, "directory: person removed");
        let _ = self.events.send(DirectoryEvent::PersonsChanged(snapshot));
        self.notify(format!("Deleted {}", person.name), Polarity::Success).await;

        if already_gone {
            DeleteOutcome::AlreadyGone(person)
        } else {
            DeleteOutcome::Deleted(person)
        }
    }

    /// Local-only: updates the filter text used for the visible subset.
    pub async fn set_filter(&self, text: &str) {
        {
            let mut guard = self.state.lock().await;
            if guard.filter == text {
                return;
            }
            guard.filter = text.to_string();
        }
        let _ = self
            .events
            .send(DirectoryEvent::FilterChanged(text.to_string()));
    }

    pub async fn persons(&self) -> Vec<Person> {
        self.state.lock().await.store.persons().to_vec()
    }

    pub async fn visible_persons(&self) -> Vec<Person> {
        let guard = self.state.lock().await;
        guard.store.visible(&guard.filter)
    }

    pub async fn filter(&self) -> String {
        self.state.lock().await.filter.clone()
    }

    pub async fn draft(&self) -> PersonDraft {
        self.state.lock().await.draft.clone()
    }

    pub async fn notification(&self) -> Option<Notification> {
        self.state.lock().await.notification.current().cloned()
    }

    pub async fn snapshot(&self) -> DirectoryView {
        let guard = self.state.lock().await;
        DirectoryView {
            persons: guard.store.persons().to_vec(),
            visible: guard.store.visible(&guard.filter),
            filter: guard.filter.clone(),
            draft: guard.draft.clone(),
            notification: guard.notification.current().cloned(),
        }
    }

    /// Marks `target` in flight. Returns `None` if it already was.
    async fn begin(&self, target: IntentTarget) -> Option<InflightGuard> {
        let mut guard = self.state.lock().await;
        if !guard.inflight.insert(target.clone()) {
            info!(?target, "directory: intent already in flight; skipping");
            return None;
        }
        Some(InflightGuard {
            state: Arc::clone(&self.state),
            target: Some(target),
        })
    }

    async fn notify(&self, message: String, polarity: Polarity) {
        let notification = {
            let mut guard = self.state.lock().await;
            let notification = guard.notification.show(message, polarity);
            let expiry = self.spawn_expiry(notification.seq);
            guard.notification.arm(expiry);
            notification
        };
        let _ = self
            .events
            .send(DirectoryEvent::NotificationChanged(Some(notification)));
    }

    fn spawn_expiry(&self, seq: u64) -> JoinHandle<()> {
        let state: Weak<Mutex<DirectoryState>> = Arc::downgrade(&self.state);
        let events = self.events.clone();
        let ttl = self.config.notification_ttl;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let Some(state) = state.upgrade() else {
                return;
            };
            let cleared = state.lock().await.notification.expire(seq);
            if cleared {
                let _ = events.send(DirectoryEvent::NotificationChanged(None));
            }
        })
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
