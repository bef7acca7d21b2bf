use thiserror::Error;

/// Error kinds crossing the core's boundary.
///
/// Only `StoreUnavailable` is ever fatal, and only at startup. Per-file scan
/// failures and per-query failures are logged by their call site and the
/// process keeps serving.
#[derive(Debug, Error)]
pub enum FacetError {
    #[error("cannot open the tag store: {0}")]
    StoreUnavailable(String),

    #[error("store query failed: {0}")]
    StoreQueryFailed(#[from] sqlx::Error),

    #[error("classification failed: {0}")]
    ClassificationFailed(#[from] probe::ProbeError),

    #[error("invalid tag name {0:?}")]
    InvalidTagName(String),

    #[error("no such entry")]
    NotFound,

    #[error("the virtual tree is read-only")]
    ReadOnly,
}
