//! Unified error hierarchy for pitchrs
//!
//! Data shortages never become errors: calculators return `None` and
//! scorers fall back to default predictions. What remains here are the
//! failures a caller must see, with severity for the tracing system.

use thiserror::Error;

/// Top-level error type for all pitchrs operations
#[derive(Debug, Error)]
pub enum PitchRsError {
    /// Persistence errors raised by a store implementation
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A referenced entity (player, session) does not exist where it is mandatory
    #[error("Unknown reference: {0}")]
    InvalidReference(String),

    /// A sample or record failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Invalid analytics configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization of feature/recommendation mappings failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Store operation errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite backend failure
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A lock guarding in-memory state was poisoned by a panicking writer
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Result type alias for pitchrs operations
pub type Result<T> = std::result::Result<T, PitchRsError>;

impl PitchRsError {
    /// Check if error is retryable
    ///
    /// Only a busy or locked database clears up on its own; a poisoned lock
    /// stays poisoned.
    pub fn is_retryable(&self) -> bool {
        match self {
            PitchRsError::Store(StoreError::Sqlite(rusqlite::Error::SqliteFailure(e, _))) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            PitchRsError::Validation(_) => ErrorSeverity::Warning,
            PitchRsError::InvalidReference(_) => ErrorSeverity::Warning,
            PitchRsError::Store(StoreError::LockPoisoned(_)) => ErrorSeverity::Critical,
            PitchRsError::Configuration(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            PitchRsError::InvalidReference(reference) => {
                format!("Could not find {}. Check the identifier and try again.", reference)
            }
            PitchRsError::Validation(reason) => {
                format!("Rejected sample: {}. Check the tracker export.", reason)
            }
            PitchRsError::Configuration(reason) => {
                format!("Invalid configuration: {}. Fix the config file and try again.", reason)
            }
            PitchRsError::Store(StoreError::Sqlite(_)) => {
                "Unable to access the metrics database. Please check your configuration.".to_string()
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical system error requiring immediate attention
    Critical,
    /// Error that prevents operation but system can continue
    Error,
    /// Warning that doesn't prevent operation
    Warning,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn busy_database() -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(5), None)
    }

    #[test]
    fn test_error_severity() {
        let err = PitchRsError::InvalidReference("player p-404".to_string());
        assert_eq!(err.severity(), ErrorSeverity::Warning);

        let err = PitchRsError::Configuration("speed bands".to_string());
        assert_eq!(err.severity(), ErrorSeverity::Critical);

        let err = PitchRsError::Store(StoreError::Sqlite(busy_database()));
        assert_eq!(err.severity(), ErrorSeverity::Error);
    }

    #[test]
    fn test_error_retryable() {
        let err = PitchRsError::Store(StoreError::Sqlite(busy_database()));
        assert!(err.is_retryable());

        let err = PitchRsError::Store(StoreError::LockPoisoned("samples".to_string()));
        assert!(!err.is_retryable());
        assert_eq!(err.severity(), ErrorSeverity::Critical);

        let err = PitchRsError::Store(StoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows));
        assert!(!err.is_retryable());

        let err = PitchRsError::Validation("negative speed".to_string());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_user_messages() {
        let err = PitchRsError::InvalidReference("player p-404".to_string());
        assert!(err.user_message().contains("Could not find player p-404"));

        let err = PitchRsError::Validation("latitude 95 out of range".to_string());
        assert!(err.user_message().starts_with("Rejected sample: latitude 95"));
    }
}
