use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::{Person, PersonDraft, PersonId},
    error::ApiError,
};
use tracing::{debug, warn};
use url::Url;

use crate::error::DirectoryError;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Gateway to the remote person collection. Every call is a single attempt.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    async fn list(&self) -> Result<Vec<Person>, DirectoryError>;
    async fn create(&self, draft: &PersonDraft) -> Result<Person, DirectoryError>;
    async fn update(&self, id: PersonId, draft: &PersonDraft) -> Result<Person, DirectoryError>;
    async fn remove(&self, id: PersonId) -> Result<(), DirectoryError>;
}

/// JSON-over-HTTP client for a collection such as `http://host:3001/api/persons`.
pub struct HttpDirectoryClient {
    http: Client,
    base_url: String,
}

impl HttpDirectoryClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let parsed =
            Url::parse(base_url).with_context(|| format!("invalid collection url: {base_url}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("collection url must start with http:// or https://");
        }
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn person_url(&self, id: PersonId) -> String {
        format!("{}/{}", self.base_url, id.0)
    }
}

#[async_trait]
impl DirectoryClient for HttpDirectoryClient {
    async fn list(&self) -> Result<Vec<Person>, DirectoryError> {
        debug!(url = %self.base_url, "directory: list");
        let response = self.http.get(&self.base_url).send().await?;
        decode(check_status(response, None).await?).await
    }

    async fn create(&self, draft: &PersonDraft) -> Result<Person, DirectoryError> {
        debug!(url = %self.base_url, name = %draft.name, "directory: create");
        let response = self.http.post(&self.base_url).json(draft).send().await?;
        decode(check_status(response, None).await?).await
    }

    async fn update(&self, id: PersonId, draft: &PersonDraft) -> Result<Person, DirectoryError> {
        debug!(person_id = id.0, "directory: update");
        let response = self
            .http
            .put(self.person_url(id))
            .json(draft)
            .send()
            .await?;
        decode(check_status(response, Some(id)).await?).await
    }

    async fn remove(&self, id: PersonId) -> Result<(), DirectoryError> {
        debug!(person_id = id.0, "directory: remove");
        let response = self.http.delete(self.person_url(id)).send().await?;
        check_status(response, Some(id)).await?;
        Ok(())
    }
}

/// Maps the response status onto the error taxonomy. `target` is the record
/// addressed by the request, if any; only then does a 404 mean the record is gone.
async fn check_status(
    response: Response,
    target: Option<PersonId>,
) -> Result<Response, DirectoryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let message = error_message(response, status).await;

    if status == StatusCode::NOT_FOUND {
        return match target {
            Some(id) => Err(DirectoryError::NotFound { id }),
            None => Err(DirectoryError::Transport(format!(
                "collection not found at {url}"
            ))),
        };
    }

    if status.is_client_error() {
        return Err(DirectoryError::Validation { message });
    }

    warn!(%status, %url, "directory: server failure");
    Err(DirectoryError::Transport(format!(
        "server responded {status}: {message}"
    )))
}

async fn error_message(response: Response, status: StatusCode) -> String {
    let fallback = status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string();
    match response.text().await {
        Ok(body) => match serde_json::from_str::<ApiError>(&body) {
            Ok(api_error) => api_error.message,
            Err(_) if !body.trim().is_empty() => body.trim().to_string(),
            Err(_) => fallback,
        },
        Err(_) => fallback,
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, DirectoryError> {
    response
        .json::<T>()
        .await
        .map_err(|e| DirectoryError::Transport(format!("invalid response body: {e}")))
}

#[cfg(test)]
#[path = "tests/remote_tests.rs"]
mod tests;
