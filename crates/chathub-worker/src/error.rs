//! Persistence pool errors.

use chathub_core::error::AppError;
use chathub_entity::ChatMessage;

/// Why a message could not be queued.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// The pool is shutting down. The message is handed back.
    #[error("Persistence pool is closed")]
    Closed(Box<ChatMessage>),
}

impl SubmitError {
    /// Recover the message that was not queued.
    pub fn into_message(self) -> ChatMessage {
        match self {
            Self::Closed(msg) => *msg,
        }
    }
}

impl From<SubmitError> for AppError {
    fn from(err: SubmitError) -> Self {
        AppError::service_unavailable(err.to_string())
    }
}
