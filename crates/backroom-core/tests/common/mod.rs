#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use backroom_core::{Clock, DocKey, Document, DocumentStore, RetryPolicy, StoreError};
use chrono::NaiveDate;
use serde_json::Value;
use tokio::sync::Notify;
use tracing::Level;

static INIT_TRACING: Once = Once::new();

/// Install a compact subscriber once per test binary.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_target(false)
            .without_time()
            .with_test_writer()
            .try_init();
    });
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Retry policy that tolerates `contenders` simultaneous writers on one key:
/// every lost attempt means another writer committed, so each caller fails at
/// most `contenders - 1` times.
pub fn patient(contenders: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts: contenders + 1,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(4),
    }
}

/// Clock whose day is set by the test.
pub struct ManualClock(Mutex<NaiveDate>);

impl ManualClock {
    pub fn new(day: NaiveDate) -> Self {
        Self(Mutex::new(day))
    }

    pub fn set(&self, day: NaiveDate) {
        *self.0.lock().unwrap() = day;
    }
}

impl Clock for ManualClock {
    fn today(&self) -> NaiveDate {
        *self.0.lock().unwrap()
    }
}

/// Wraps a store and rejects the next `n` conditional writes as an outage,
/// without touching the wrapped store.
pub struct FlakyStore<S> {
    inner: S,
    failures: AtomicU32,
}

impl<S> FlakyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            failures: AtomicU32::new(0),
        }
    }

    pub fn fail_next(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl<S: DocumentStore> DocumentStore for FlakyStore<S> {
    async fn get(&self, key: &DocKey) -> Result<Option<Document>, StoreError> {
        self.inner.get(key).await
    }

    async fn list(&self, collection: &str) -> Result<Vec<(String, Document)>, StoreError> {
        self.inner.list(collection).await
    }

    async fn put(&self, key: &DocKey, data: Value) -> Result<Document, StoreError> {
        self.inner.put(key, data).await
    }

    async fn delete(&self, key: &DocKey) -> Result<bool, StoreError> {
        self.inner.delete(key).await
    }

    async fn compare_and_put(
        &self,
        key: &DocKey,
        expected: Option<u64>,
        data: Value,
    ) -> Result<Document, StoreError> {
        let injected = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::Unavailable("injected outage".to_string()));
        }
        self.inner.compare_and_put(key, expected, data).await
    }
}

/// Where a [`GatedStore`] parks the next conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    BeforeCommit,
    AfterCommit,
}

/// Wraps a store and, once armed, parks the next conditional write at the
/// gate until `release` is notified, so a test can cancel the caller there.
pub struct GatedStore<S> {
    inner: S,
    gate: Gate,
    armed: AtomicBool,
    pub arrived: Notify,
    pub release: Notify,
}

impl<S> GatedStore<S> {
    pub fn new(inner: S, gate: Gate) -> Self {
        Self {
            inner,
            gate,
            armed: AtomicBool::new(false),
            arrived: Notify::new(),
            release: Notify::new(),
        }
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl<S: DocumentStore> DocumentStore for GatedStore<S> {
    async fn get(&self, key: &DocKey) -> Result<Option<Document>, StoreError> {
        self.inner.get(key).await
    }

    async fn list(&self, collection: &str) -> Result<Vec<(String, Document)>, StoreError> {
        self.inner.list(collection).await
    }

    async fn put(&self, key: &DocKey, data: Value) -> Result<Document, StoreError> {
        self.inner.put(key, data).await
    }

    async fn delete(&self, key: &DocKey) -> Result<bool, StoreError> {
        self.inner.delete(key).await
    }

    async fn compare_and_put(
        &self,
        key: &DocKey,
        expected: Option<u64>,
        data: Value,
    ) -> Result<Document, StoreError> {
        if !self.armed.swap(false, Ordering::SeqCst) {
            return self.inner.compare_and_put(key, expected, data).await;
        }
        match self.gate {
            Gate::BeforeCommit => {
                self.arrived.notify_one();
                self.release.notified().await;
                self.inner.compare_and_put(key, expected, data).await
            }
            Gate::AfterCommit => {
                let result = self.inner.compare_and_put(key, expected, data).await;
                self.arrived.notify_one();
                self.release.notified().await;
                result
            }
        }
    }
}
