use thiserror::Error;

use crate::session::SessionState;

/// Errors surfaced by the chat core.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Transport or backend failure talking to the collection store.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// A lookup by username matched nothing.
    #[error("{0} not found")]
    NotFound(String),

    /// Rejected locally before any store call.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("cannot {action} while session is {state}")]
    InvalidState {
        state: SessionState,
        action: &'static str,
    },
}

impl ChatError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ChatError::NotFound(_))
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::StoreUnavailable(err.to_string())
    }
}
