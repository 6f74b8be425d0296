//! Per-(tenant, day) gap-free sequence numbers.
//!
//! Each tenant gets one counter document per calendar day under
//! `<partition>/<tenant>/counters/<YYYYMMDD>`. Incrementing it is a single
//! store transaction, so concurrent callers never receive the same value and
//! no value is skipped.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::{ScopeError, SequenceError, StoreError};
use crate::scope::{Partition, TenantScope};
use crate::store::{transact, DocKey, DocumentStore, RetryPolicy};

pub const COUNTERS: &str = "counters";

/// A calendar day rendered as `YYYYMMDD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayStamp(NaiveDate);

impl DayStamp {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl From<NaiveDate> for DayStamp {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl fmt::Display for DayStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y%m%d"))
    }
}

impl FromStr for DayStamp {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ScopeError(format!("day `{s}` is not YYYYMMDD")));
        }
        NaiveDate::parse_from_str(s, "%Y%m%d")
            .map(Self)
            .map_err(|e| ScopeError(format!("day `{s}`: {e}")))
    }
}

/// Source of "today" for counter keys.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// The host's local wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn today(&self) -> NaiveDate {
        (**self).today()
    }
}

/// A value handed out by [`SequenceCounter`], displayed as `00042-20240726`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SequenceId {
    pub count: u64,
    pub day: DayStamp,
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:05}-{}", self.count, self.day)
    }
}

/// Snapshot of a counter document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterRecord {
    pub count: u64,
    pub last_updated: DateTime<Utc>,
}

#[derive(Deserialize)]
struct StoredCount {
    count: u64,
}

fn counter_key(scope: &TenantScope, day: DayStamp) -> Result<DocKey, SequenceError> {
    DocKey::new(scope.collection(COUNTERS), day.to_string())
        .map_err(|e| SequenceError::InvalidScope(ScopeError(e.to_string())))
}

pub struct SequenceCounter<S: ?Sized, C = LocalClock> {
    store: Arc<S>,
    clock: C,
    retry: RetryPolicy,
}

impl<S: ?Sized, C: Clone> Clone for SequenceCounter<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: self.clock.clone(),
            retry: self.retry,
        }
    }
}

impl<S: DocumentStore + ?Sized> SequenceCounter<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            clock: LocalClock,
            retry: RetryPolicy::default(),
        }
    }
}

impl<S: DocumentStore + ?Sized, C: Clock> SequenceCounter<S, C> {
    pub fn with_clock<K: Clock>(self, clock: K) -> SequenceCounter<S, K> {
        SequenceCounter {
            store: self.store,
            clock,
            retry: self.retry,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn today(&self) -> DayStamp {
        DayStamp(self.clock.today())
    }

    /// Issue the next display identifier for `tenant_id` in the partition named
    /// by `scope_selector` (`"trial"` or `"prod"`), e.g. `"00001-20240726"`.
    ///
    /// The selector and tenant are validated before the store is touched.
    pub async fn next_sequence_id(
        &self,
        tenant_id: &str,
        scope_selector: &str,
    ) -> Result<String, SequenceError> {
        let partition: Partition = scope_selector.parse()?;
        let scope = TenantScope::new(partition, tenant_id)?;
        Ok(self.next(&scope).await?.to_string())
    }

    /// Increment today's counter for `scope` and return the new value.
    ///
    /// On [`SequenceError::SequenceUnavailable`] nothing was reserved; calling
    /// again continues the sequence without a gap.
    pub async fn next(&self, scope: &TenantScope) -> Result<SequenceId, SequenceError> {
        let day = self.today();
        let key = counter_key(scope, day)?;

        let doc = transact(&*self.store, &key, &self.retry, |current| {
            let count = match current {
                Some(doc) => doc.decode::<StoredCount>()?.count + 1,
                None => 1,
            };
            Ok::<_, StoreError>(json!({ "count": count }))
        })
        .await
        .map_err(|source| SequenceError::SequenceUnavailable {
            key: key.to_string(),
            source,
        })?;

        let count = doc
            .decode::<StoredCount>()
            .map_err(|source| SequenceError::SequenceUnavailable {
                key: key.to_string(),
                source,
            })?
            .count;
        debug!(%key, count, "issued sequence value");
        Ok(SequenceId { count, day })
    }

    /// Read a counter without advancing it.
    pub async fn current(
        &self,
        scope: &TenantScope,
        day: DayStamp,
    ) -> Result<Option<CounterRecord>, SequenceError> {
        let key = counter_key(scope, day)?;
        let unavailable = |source| SequenceError::SequenceUnavailable {
            key: key.to_string(),
            source,
        };
        let Some(doc) = self.store.get(&key).await.map_err(unavailable)? else {
            return Ok(None);
        };
        let stored: StoredCount = doc.decode().map_err(unavailable)?;
        Ok(Some(CounterRecord {
            count: stored.count,
            last_updated: doc.updated_at,
        }))
    }
}
