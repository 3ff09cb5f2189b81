use shared::domain::PersonId;
use thiserror::Error;

/// Failure taxonomy surfaced by a [`crate::DirectoryClient`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DirectoryError {
    /// The server rejected the input (4xx other than 404).
    #[error("{message}")]
    Validation { message: String },
    /// The target record does not exist on the server (404).
    #[error("person {id} no longer exists on the server")]
    NotFound { id: PersonId },
    /// Network failure, 5xx, or an undecodable response.
    #[error("transport failure: {0}")]
    Transport(String),
}

impl DirectoryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<reqwest::Error> for DirectoryError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value.to_string())
    }
}
