//! Unified error handling for the track-elevation library.
//!
//! Errors are mostly contained: the corrector and the engine degrade to raw
//! elevations instead of propagating them. They surface only from
//! configuration loading and from the collaborator traits.

use thiserror::Error;

/// Unified error type for track-elevation operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ElevationError {
    /// Transport-level failure talking to the elevation service
    #[error("HTTP error: {message}")]
    Http {
        message: String,
        status_code: Option<u16>,
    },
    /// A request did not complete within its time budget
    #[error("Elevation request timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
    /// The service answered with an unusable payload
    #[error("Elevation response has {got} values, {expected} expected")]
    MalformedResponse { expected: usize, got: usize },
    /// The persistence collaborator failed to store corrected elevations
    #[error("Persistence error: {message}")]
    Persistence { message: String },
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config { message: String },
    /// Generic internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ElevationError {
    /// Build an HTTP error without a status code.
    pub fn http(message: impl Into<String>) -> Self {
        ElevationError::Http {
            message: message.into(),
            status_code: None,
        }
    }
}

/// Result type alias for track-elevation operations.
pub type Result<T> = std::result::Result<T, ElevationError>;

/// Extension trait for converting Option to ElevationError.
pub trait OptionExt<T> {
    /// Convert Option to Result with generic internal error.
    fn ok_or_internal(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_internal(self, message: &str) -> Result<T> {
        self.ok_or_else(|| ElevationError::Internal {
            message: message.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ElevationError::MalformedResponse {
            expected: 40,
            got: 39,
        };
        assert!(err.to_string().contains("39 values"));
        assert!(err.to_string().contains("40 expected"));

        let err = ElevationError::Timeout { timeout_ms: 4000 };
        assert_eq!(err.to_string(), "Elevation request timed out after 4000 ms");
    }

    #[test]
    fn test_option_ext() {
        let none: Option<i32> = None;
        let result = none.ok_or_internal("missing chunk");
        assert!(matches!(result, Err(ElevationError::Internal { .. })));
        assert_eq!(Some(3).ok_or_internal("unused"), Ok(3));
    }
}
