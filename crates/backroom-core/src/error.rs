use thiserror::Error;

use crate::orders::OrderStatus;

/// Failures surfaced by a [`DocumentStore`](crate::store::DocumentStore).
#[derive(Error, Debug)]
pub enum StoreError {
    /// Key segment is empty or contains characters outside `[A-Za-z0-9._-]`
    #[error("invalid document key: {0}")]
    InvalidKey(String),
    /// A conditional write lost against a concurrent commit
    #[error("write conflict on `{key}`")]
    Conflict { key: String },
    /// Transient backend failure (outage, network)
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// Transaction gave up after its retry policy ran out
    #[error("transaction on `{key}` aborted after {attempts} attempts: {reason}")]
    Aborted {
        key: String,
        attempts: u32,
        reason: String,
    },
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed document: {0}")]
    Serde(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether re-running the transaction may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Conflict { .. } | StoreError::Unavailable(_))
    }
}

/// A partition selector or tenant id that does not name a known scope.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid scope: {0}")]
pub struct ScopeError(pub String);

#[derive(Error, Debug)]
pub enum SequenceError {
    #[error(transparent)]
    InvalidScope(#[from] ScopeError),
    #[error("sequence unavailable for `{key}`: {source}")]
    SequenceUnavailable {
        key: String,
        #[source]
        source: StoreError,
    },
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("{collection} record `{id}` not found")]
    NotFound { collection: &'static str, id: String },
    #[error("invalid record: {0}")]
    Invalid(String),
    #[error(transparent)]
    Scope(#[from] ScopeError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum OrderError {
    #[error("invalid order: {0}")]
    Invalid(String),
    #[error("order cannot move from {from} to {to}")]
    Transition { from: OrderStatus, to: OrderStatus },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Sequence(#[from] SequenceError),
}

impl From<StoreError> for OrderError {
    fn from(err: StoreError) -> Self {
        OrderError::Catalog(CatalogError::Store(err))
    }
}

impl From<ScopeError> for OrderError {
    fn from(err: ScopeError) -> Self {
        OrderError::Catalog(CatalogError::Scope(err))
    }
}
