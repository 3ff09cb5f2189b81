use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use client_core::{
    DeleteOutcome, FixedAnswer, HttpDirectoryClient, Polarity, ReconciliationController,
    SubmitOutcome,
};
use shared::{
    domain::{Person, PersonDraft, PersonId},
    error::{ApiError, ErrorCode},
};
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Clone, Default)]
struct Collection {
    persons: Arc<Mutex<Vec<Person>>>,
    next_id: Arc<Mutex<i64>>,
}

type Rejection = (StatusCode, Json<ApiError>);

fn missing(id: i64) -> Rejection {
    (
        StatusCode::NOT_FOUND,
        Json(ApiError::new(ErrorCode::NotFound, format!("person {id} not found"))),
    )
}

async fn list(State(c): State<Collection>) -> Json<Vec<Person>> {
    Json(c.persons.lock().await.clone())
}

async fn create(
    State(c): State<Collection>,
    Json(draft): Json<PersonDraft>,
) -> Result<(StatusCode, Json<Person>), Rejection> {
    if draft.number.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(ErrorCode::Validation, "number missing")),
        ));
    }
    let mut next_id = c.next_id.lock().await;
    *next_id += 1;
    let person = Person {
        id: PersonId(*next_id),
        name: draft.name,
        number: draft.number,
    };
    c.persons.lock().await.push(person.clone());
    Ok((StatusCode::CREATED, Json(person)))
}

async fn update(
    State(c): State<Collection>,
    Path(id): Path<i64>,
    Json(draft): Json<PersonDraft>,
) -> Result<Json<Person>, Rejection> {
    let mut persons = c.persons.lock().await;
    let slot = persons
        .iter_mut()
        .find(|p| p.id.0 == id)
        .ok_or_else(|| missing(id))?;
    slot.name = draft.name;
    slot.number = draft.number;
    Ok(Json(slot.clone()))
}

async fn remove(State(c): State<Collection>, Path(id): Path<i64>) -> Result<StatusCode, Rejection> {
    let mut persons = c.persons.lock().await;
    let before = persons.len();
    persons.retain(|p| p.id.0 != id);
    if persons.len() == before {
        return Err(missing(id));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn spawn_collection(seed: Vec<Person>) -> (String, Collection) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let next_id = seed.iter().map(|p| p.id.0).max().unwrap_or(0);
    let collection = Collection {
        persons: Arc::new(Mutex::new(seed)),
        next_id: Arc::new(Mutex::new(next_id)),
    };
    let app = Router::new()
        .route("/api/persons", get(list).post(create))
        .route("/api/persons/:id", put(update).delete(remove))
        .with_state(collection.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}/api/persons"), collection)
}

fn ada(number: &str) -> Person {
    Person {
        id: PersonId(1),
        name: "Ada".into(),
        number: number.into(),
    }
}

async fn controller_for(url: &str, answer: bool) -> ReconciliationController {
    let client = HttpDirectoryClient::new(url).expect("client");
    let controller = ReconciliationController::new(Arc::new(client), Arc::new(FixedAnswer(answer)));
    controller.load().await.expect("load");
    controller
}

#[tokio::test]
async fn confirmed_resubmit_updates_number_in_place() {
    let (url, collection) = spawn_collection(vec![ada("1")]).await;
    let controller = controller_for(&url, true).await;

    let outcome = controller.submit("Ada", "2").await;
    assert_eq!(outcome, SubmitOutcome::Updated(ada("2")));
    assert_eq!(controller.persons().await, vec![ada("2")]);
    assert_eq!(*collection.persons.lock().await, vec![ada("2")]);
    assert_eq!(
        controller.notification().await.map(|n| n.polarity),
        Some(Polarity::Success)
    );
}

#[tokio::test]
async fn update_after_out_of_band_delete_evicts_local_entry() {
    let (url, collection) = spawn_collection(vec![ada("1")]).await;
    let controller = controller_for(&url, true).await;
    collection.persons.lock().await.clear();

    let outcome = controller.submit("Ada", "2").await;
    assert_eq!(outcome, SubmitOutcome::Evicted(PersonId(1)));
    assert!(controller.persons().await.is_empty());
    assert!(collection.persons.lock().await.is_empty());

    let notification = controller.notification().await.expect("notification");
    assert_eq!(notification.polarity, Polarity::Error);
    assert!(notification.message.contains("already been removed"));
}

#[tokio::test]
async fn create_then_delete_round_trip() {
    let (url, collection) = spawn_collection(Vec::new()).await;
    let controller = controller_for(&url, true).await;

    let created = match controller.submit("Mary", "555").await {
        SubmitOutcome::Created(person) => person,
        other => panic!("unexpected outcome: {other:?}"),
    };
    assert_eq!(collection.persons.lock().await.len(), 1);

    let outcome = controller.delete(created.id).await;
    assert_eq!(outcome, DeleteOutcome::Deleted(created));
    assert!(controller.persons().await.is_empty());
    assert!(collection.persons.lock().await.is_empty());
}

#[tokio::test]
async fn delete_of_record_gone_remotely_still_clears_it() {
    let (url, collection) = spawn_collection(vec![ada("1")]).await;
    let controller = controller_for(&url, true).await;
    collection.persons.lock().await.clear();

    let outcome = controller.delete(PersonId(1)).await;
    assert_eq!(outcome, DeleteOutcome::AlreadyGone(ada("1")));
    assert!(controller.persons().await.is_empty());
}

#[tokio::test]
async fn server_validation_message_reaches_the_notification() {
    let (url, _collection) = spawn_collection(Vec::new()).await;
    let controller = controller_for(&url, true).await;

    let outcome = controller.submit("Mary", " ").await;
    assert!(matches!(outcome, SubmitOutcome::Failed(_)));
    let notification = controller.notification().await.expect("notification");
    assert_eq!(notification.polarity, Polarity::Error);
    assert_eq!(notification.message, "number missing");
    assert!(controller.persons().await.is_empty());
}
