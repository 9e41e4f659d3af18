use crate::types::RoleId;
use thiserror::Error;

/// Store-layer error type.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
///
/// Read-path store failures never surface here: session and role lookups
/// convert them into negative results so authentication fails closed. Only
/// write-path failures are reported, letting the caller map them to a 5xx.
#[derive(Debug, Error)]
pub enum Error {
    /// Store error wrapper.
    #[error("store error: {0}")]
    Store(#[source] StoreError),
    /// Invalid identifier input.
    #[error("invalid id: {0}")]
    InvalidId(String),
    /// Invalid permission input.
    #[error("invalid permission: {0}")]
    InvalidPermission(String),
    /// Persisting a new role failed.
    #[error("failed to create role: {0}")]
    RoleCreation(#[source] StoreError),
    /// Persisting a role update failed.
    #[error("failed to update role {id}: {source}")]
    RoleUpdate {
        id: RoleId,
        #[source]
        source: StoreError,
    },
    /// Persisting a role deletion failed.
    #[error("failed to delete role {id}: {source}")]
    RoleDeletion {
        id: RoleId,
        #[source]
        source: StoreError,
    },
    /// Durable session write failed after the cache was populated.
    #[error("failed to persist session: {0}")]
    SessionPersist(#[source] StoreError),
    /// Durable session deletion failed after the cache entry was removed.
    #[error("failed to delete session: {0}")]
    SessionDeletion(#[source] StoreError),
    /// Access-token signing failed.
    #[error("failed to sign access token: {0}")]
    TokenSigning(#[source] jsonwebtoken::errors::Error),
}

impl From<StoreError> for Error {
    fn from(error: StoreError) -> Self {
        Self::Store(error)
    }
}
