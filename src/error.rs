//! Unified error handling for the track-analyzer library.
//!
//! The core layers (parser, analyzer, projector) fail fast with a typed
//! error and never catch-and-continue on structural problems. Resilience
//! (recompute, raw scan) lives one layer up, in the retrieval service.

use thiserror::Error;

/// Unified error type for track analysis operations.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Payload was empty or otherwise unusable before parsing began
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// Unrecoverable GPX/XML malformation in the strict parser
    #[error("GPX parse failed: {message}")]
    Parse { message: String },

    /// A persisted analyzed-track blob exists but cannot be decoded
    #[error("analyzed blob could not be decoded: {message}")]
    Deserialization { message: String },

    /// Unexpected analyzer failure, wrapped with filename context
    #[error("analysis of '{filename}' failed: {message}")]
    AnalysisFailure { filename: String, message: String },

    /// Storage boundary failure (propagated as-is, never retried here)
    #[error("storage error: {message}")]
    Storage { message: String },
}

impl AnalysisError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        AnalysisError::InvalidInput {
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        AnalysisError::Parse {
            message: message.into(),
        }
    }

    pub fn deserialization(message: impl Into<String>) -> Self {
        AnalysisError::Deserialization {
            message: message.into(),
        }
    }

    pub fn analysis_failure(filename: impl Into<String>, message: impl Into<String>) -> Self {
        AnalysisError::AnalysisFailure {
            filename: filename.into(),
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        AnalysisError::Storage {
            message: message.into(),
        }
    }
}

/// Result type alias for track analysis operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AnalysisError::analysis_failure("ride.gpx", "no points");
        assert!(err.to_string().contains("ride.gpx"));
        assert!(err.to_string().contains("no points"));
    }

    #[test]
    fn test_parse_error_display() {
        let err = AnalysisError::parse("unexpected end of document");
        assert!(err.to_string().starts_with("GPX parse failed"));
    }
}
