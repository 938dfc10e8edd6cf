//! Audit error types

use thiserror::Error;

/// Result type for audit operations
pub type AuditResult<T> = Result<T, AuditError>;

/// Audit sink and store errors
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Audit I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Audit serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Audit database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Audit sink lock poisoned")]
    SinkPoisoned,
}
