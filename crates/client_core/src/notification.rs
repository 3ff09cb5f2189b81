//! Single transient notification slot.
//!
//! Each message carries a sequence number. The expiry task scheduled for a
//! message clears the slot only while that sequence is still displayed, so an
//! earlier message's timer can never wipe a later message.

use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub seq: u64,
    pub message: String,
    pub polarity: Polarity,
}

impl Notification {
    pub fn is_error(&self) -> bool {
        self.polarity == Polarity::Error
    }
}

#[derive(Debug, Default)]
pub(crate) struct NotificationSlot {
    current: Option<Notification>,
    next_seq: u64,
    expiry: Option<JoinHandle<()>>,
}

impl NotificationSlot {
    pub(crate) fn current(&self) -> Option<&Notification> {
        self.current.as_ref()
    }

    /// Installs a new message, superseding the current one and cancelling its
    /// pending expiry. The caller arms the new expiry with [`Self::arm`].
    pub(crate) fn show(&mut self, message: impl Into<String>, polarity: Polarity) -> Notification {
        if let Some(previous) = self.expiry.take() {
            previous.abort();
        }
        self.next_seq += 1;
        let notification = Notification {
            seq: self.next_seq,
            message: message.into(),
            polarity,
        };
        self.current = Some(notification.clone());
        notification
    }

    pub(crate) fn arm(&mut self, expiry: JoinHandle<()>) {
        if let Some(previous) = self.expiry.replace(expiry) {
            previous.abort();
        }
    }

    /// Clears the slot if `seq` is still the displayed message. Returns whether
    /// anything was cleared.
    pub(crate) fn expire(&mut self, seq: u64) -> bool {
        match &self.current {
            Some(current) if current.seq == seq => {
                self.current = None;
                self.expiry = None;
                true
            }
            _ => {
                debug!(seq, "notification: stale expiry ignored");
                false
            }
        }
    }
}

impl Drop for NotificationSlot {
    fn drop(&mut self) {
        if let Some(expiry) = self.expiry.take() {
            expiry.abort();
        }
    }
}
