//! Queue Error Types

use crate::core::error_handling::ContextualError;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Invalid queue configuration: {message}")]
    Configuration { message: String },

    #[error("SmartQueue must be created inside a Tokio runtime")]
    NoRuntime,

    #[error("Queue has been stopped")]
    Stopped,

    #[error("Synchronisation failure: {message}")]
    Synchronisation { message: String },
}

impl QueueError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        QueueError::Configuration {
            message: message.into(),
        }
    }

    pub(crate) fn synchronisation(message: String) -> Self {
        QueueError::Synchronisation { message }
    }
}

impl ContextualError for QueueError {
    fn is_user_actionable(&self) -> bool {
        matches!(self, QueueError::Configuration { .. })
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            QueueError::Configuration { message } => Some(message),
            _ => None,
        }
    }
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;
