use thiserror::Error;

/// Failures reported by a document store.
///
/// Kept `Clone` so one failure can be fanned out to every listener of a query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("document store unavailable: {0}")]
    Unavailable(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("document {collection}/{id} not found")]
    NotFound { collection: String, id: String },
    #[error("document store reported corrupted data: {0}")]
    Corrupted(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
