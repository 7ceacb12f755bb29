//! Error types for the RBAC core

use thiserror::Error;

/// RBAC errors
///
/// Unauthenticated and forbidden outcomes are not errors; they are returned
/// as deny [`Decision`](crate::engine::Decision)s by the enforcement point.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// Malformed input rejected before touching storage
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Target of an operation does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// A mutation referenced a user, role or permission that is missing or not ACTIVE
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// Uniqueness invariant would be violated
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for AuthzError {
    fn from(err: sqlx::Error) -> Self {
        AuthzError::DatabaseError(err.to_string())
    }
}

/// Result type for RBAC operations
pub type Result<T> = std::result::Result<T, AuthzError>;
