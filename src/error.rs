// ⚠️ Errors - failure taxonomy for the COHD core
//
// Lookups that find nothing return an empty list, so there is no NotFound.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CohdError {
    /// Malformed or missing identifier, unknown enum value
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// External mapping service failed (timeout, HTTP error, bad payload)
    #[error("Upstream failure{}: {message}", for_source(.source_id))]
    Upstream {
        source_id: Option<String>,
        message: String,
    },

    #[error("Concept store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CohdError {
    pub fn invalid(message: impl Into<String>) -> Self {
        CohdError::InvalidArgument(message.into())
    }

    pub fn upstream(source_id: Option<&str>, message: impl Into<String>) -> Self {
        CohdError::Upstream {
            source_id: source_id.map(str::to_string),
            message: message.into(),
        }
    }

    /// True for failures a caller may reasonably retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, CohdError::Upstream { .. })
    }
}

fn for_source(source_id: &Option<String>) -> String {
    source_id
        .as_ref()
        .map(|id| format!(" for {}", id))
        .unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, CohdError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_message_names_source() {
        let err = CohdError::upstream(Some("DOID:8398"), "timed out");
        assert_eq!(err.to_string(), "Upstream failure for DOID:8398: timed out");
        assert!(err.is_retryable());

        let batch = CohdError::upstream(None, "HTTP 502");
        assert_eq!(batch.to_string(), "Upstream failure: HTTP 502");
    }

    #[test]
    fn test_invalid_argument_not_retryable() {
        let err = CohdError::invalid("empty code");
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "Invalid argument: empty code");
    }
}
