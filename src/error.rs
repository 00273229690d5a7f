//! Custom error types for the audit log
//!
//! This module defines the error hierarchy for registration, lookup and
//! emission failures using thiserror for ergonomic error definitions.

use thiserror::Error;

/// The main error type for audit log operations
#[derive(Error, Debug)]
pub enum AuditError {
    /// A registration asked for something the engine cannot track
    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// The supplied entity type is not a trackable record type
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// Policy requested for an entity type that was never registered
    #[error("Entity type is not registered: {0}")]
    NotRegistered(String),

    /// Prior state lookup failed because the record no longer exists
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// The emission sink refused or failed to store a record
    #[error("Sink error: {0}")]
    Sink(String),
}

impl AuditError {
    /// Create a "not found" error for a prior-state lookup
    pub fn not_found(entity_type: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            identifier: identifier.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error came from a registration call
    pub fn is_registration(&self) -> bool {
        matches!(self, Self::UnsupportedFeature(_) | Self::InvalidTarget(_))
    }
}

impl From<std::io::Error> for AuditError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AuditError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl serde::ser::Error for AuditError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        Self::Json(msg.to_string())
    }
}

/// Result type alias for audit log operations
pub type AuditResult<T> = Result<T, AuditError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AuditError::Config("test error".into());
        assert_eq!(err.to_string(), "Configuration error: test error");
    }

    #[test]
    fn test_not_found_error() {
        let err = AuditError::not_found("Article", "42");
        assert_eq!(err.to_string(), "Article not found: 42");
        assert!(err.is_not_found());
        assert!(!err.is_registration());
    }

    #[test]
    fn test_registration_errors() {
        assert!(AuditError::UnsupportedFeature("relations".into()).is_registration());
        assert!(AuditError::InvalidTarget("".into()).is_registration());
        assert!(!AuditError::NotRegistered("Article".into()).is_registration());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let audit_err: AuditError = io_err.into();
        assert!(matches!(audit_err, AuditError::Io(_)));
    }
}
