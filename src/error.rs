//! Error taxonomy for the recommendation core

use thiserror::Error;

use crate::session::{SessionId, SessionState};

/// Errors surfaced by the recommendation engine, model adapter and session manager
#[derive(Debug, Error)]
pub enum HydrationError {
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("insufficient data: need at least {required} samples, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("unknown athlete: {0}")]
    UnknownAthlete(String),

    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("session {id} is {state}, cannot {operation}")]
    InvalidSessionState {
        id: SessionId,
        state: SessionState,
        operation: &'static str,
    },

    #[error("no trained model available")]
    ModelUnavailable,

    #[error("model training failed: {0}")]
    Training(String),

    #[error("model codec error: {0}")]
    Codec(String),

    #[error("model file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("storage error: {0}")]
    Storage(String),
}

impl HydrationError {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        HydrationError::Validation {
            field,
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for HydrationError {
    fn from(err: serde_json::Error) -> Self {
        HydrationError::Codec(err.to_string())
    }
}

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, HydrationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_names_field() {
        let err = HydrationError::validation("duration_minutes", "must be >= 0");
        assert_eq!(err.to_string(), "invalid duration_minutes: must be >= 0");
    }

    #[test]
    fn test_insufficient_data_message() {
        let err = HydrationError::InsufficientData { required: 10, actual: 3 };
        assert!(err.to_string().contains("at least 10"));
        assert!(err.to_string().contains("got 3"));
    }
}
