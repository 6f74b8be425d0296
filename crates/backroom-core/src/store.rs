//! Document store contract and the transaction runner built on top of it.
//!
//! Stores only have to offer point reads and a conditional write keyed on the
//! document version. [`transact`] turns that into a read-modify-write that is
//! retried until it commits against an unchanged document.

pub mod file;
pub mod memory;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, warn};

use crate::error::StoreError;

/// Check that a key segment starts with an ASCII letter or digit, then `[A-Za-z0-9._-]`.
pub fn is_valid_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphanumeric() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

pub(crate) fn validate_collection(collection: &str) -> Result<(), StoreError> {
    if collection.split('/').all(is_valid_segment) {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(format!("collection `{collection}`")))
    }
}

/// Address of a single document: a `/`-separated collection path plus an id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocKey {
    collection: String,
    id: String,
}

impl DocKey {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Result<Self, StoreError> {
        let collection = collection.into();
        let id = id.into();
        validate_collection(&collection)?;
        if !is_valid_segment(&id) {
            return Err(StoreError::InvalidKey(format!("id `{id}` in `{collection}`")));
        }
        Ok(Self { collection, id })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for DocKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// A stored document with the metadata the store assigns on every commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub version: u64,
    pub updated_at: DateTime<Utc>,
    pub data: Value,
}

impl Document {
    pub(crate) fn initial(data: Value) -> Self {
        Self {
            version: 1,
            updated_at: Utc::now(),
            data,
        }
    }

    pub(crate) fn successor(&self, data: Value) -> Self {
        Self {
            version: self.version + 1,
            updated_at: Utc::now(),
            data,
        }
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        Ok(T::deserialize(&self.data)?)
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, key: &DocKey) -> Result<Option<Document>, StoreError>;

    /// All documents directly inside `collection`, sorted by id.
    async fn list(&self, collection: &str) -> Result<Vec<(String, Document)>, StoreError>;

    /// Unconditional write.
    async fn put(&self, key: &DocKey, data: Value) -> Result<Document, StoreError>;

    /// Returns whether a document was removed.
    async fn delete(&self, key: &DocKey) -> Result<bool, StoreError>;

    /// Write `data` only if the stored version still equals `expected`
    /// (`None` means the document must not exist). Fails with
    /// [`StoreError::Conflict`] otherwise, leaving the document untouched.
    async fn compare_and_put(
        &self,
        key: &DocKey,
        expected: Option<u64>,
        data: Value,
    ) -> Result<Document, StoreError>;
}

/// How often and how patiently a transaction is re-run after a retryable failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// Delay after the `attempt`-th failure (1-based): doubles each time, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Atomically read, recompute and write one document.
///
/// `update` sees the current document (or `None`) and returns the new data. The
/// write is conditional on the version that was read, so a concurrent commit in
/// between makes the attempt fail with a conflict and the whole cycle re-runs.
/// `update` may therefore be called several times and must not have side effects.
/// Errors returned by `update` abort immediately without writing.
///
/// Cancelling the returned future never leaves a partial write behind: the only
/// write is the single `compare_and_put` call.
pub async fn transact<S, F, E>(
    store: &S,
    key: &DocKey,
    policy: &RetryPolicy,
    mut update: F,
) -> Result<Document, E>
where
    S: DocumentStore + ?Sized,
    F: FnMut(Option<&Document>) -> Result<Value, E> + Send,
    E: From<StoreError>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        let failure = match store.get(key).await {
            Ok(current) => {
                let data = update(current.as_ref())?;
                let expected = current.as_ref().map(|doc| doc.version);
                match store.compare_and_put(key, expected, data).await {
                    Ok(doc) => return Ok(doc),
                    Err(err) => err,
                }
            }
            Err(err) => err,
        };

        if !failure.is_retryable() {
            return Err(failure.into());
        }
        if attempt >= max_attempts {
            error!(%key, attempts = attempt, error = %failure, "transaction retries exhausted");
            return Err(StoreError::Aborted {
                key: key.to_string(),
                attempts: attempt,
                reason: failure.to_string(),
            }
            .into());
        }

        let delay = policy.backoff(attempt);
        warn!(%key, attempt, ?delay, error = %failure, "transaction attempt failed, retrying");
        tokio::time::sleep(delay).await;
    }
}
