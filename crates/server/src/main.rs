use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use shared::{
    domain::{Person, PersonDraft, PersonId},
    error::{ApiError, ErrorCode},
    protocol::{healthz_route, info_route, PERSONS_ROUTE},
};
use storage::Storage;
use tracing::{error, info};

mod api;
mod app_state;
mod config;

use api::ApiContext;
use app_state::AppState;
use config::load_settings;

type HttpResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings();
    let database_url = storage::normalize_sqlite_url(&settings.database_url);
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; check the path and its permissions"
        );
        error
    })?;

    let state = AppState {
        api: ApiContext { storage },
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(healthz_route(), get(healthz))
        .route(info_route(), get(info_page))
        .route(PERSONS_ROUTE, get(http_list_persons).post(http_create_person))
        .route(
            &format!("{PERSONS_ROUTE}/:id"),
            get(http_get_person)
                .put(http_update_person)
                .delete(http_delete_person),
        )
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> HttpResult<&'static str> {
    state.api.storage.health_check().await.map_err(|e| {
        error!(error = %e, "healthz: storage ping failed");
        into_http(ApiError::new(ErrorCode::Internal, e.to_string()))
    })?;
    Ok("ok")
}

async fn info_page(State(state): State<Arc<AppState>>) -> HttpResult<String> {
    api::info_text(&state.api).await.map_err(into_http)
}

async fn http_list_persons(State(state): State<Arc<AppState>>) -> HttpResult<Json<Vec<Person>>> {
    api::list_persons(&state.api)
        .await
        .map(Json)
        .map_err(into_http)
}

async fn http_get_person(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> HttpResult<Json<Person>> {
    api::get_person(&state.api, PersonId(id))
        .await
        .map(Json)
        .map_err(into_http)
}

async fn http_create_person(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<PersonDraft>,
) -> HttpResult<(StatusCode, Json<Person>)> {
    api::create_person(&state.api, draft)
        .await
        .map(|person| (StatusCode::CREATED, Json(person)))
        .map_err(into_http)
}

async fn http_update_person(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(draft): Json<PersonDraft>,
) -> HttpResult<Json<Person>> {
    api::update_person(&state.api, PersonId(id), draft)
        .await
        .map(Json)
        .map_err(into_http)
}

async fn http_delete_person(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> HttpResult<StatusCode> {
    api::delete_person(&state.api, PersonId(id))
        .await
        .map(|()| StatusCode::NO_CONTENT)
        .map_err(into_http)
}

fn into_http(err: ApiError) -> (StatusCode, Json<ApiError>) {
    let status = match err.code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => {
            error!(message = %err.message, "api: internal error");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(err))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
