use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{CatalogError, StoreError};
use crate::scope::TenantScope;
use crate::store::{transact, DocKey, DocumentStore, RetryPolicy};

/// A document type kept in a per-tenant collection with `prefix-N` ids.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync {
    const COLLECTION: &'static str;
    const ID_PREFIX: &'static str;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn validate(&self) -> Result<(), String>;
}

fn id_number(prefix: &str, id: &str) -> Option<u64> {
    id.strip_prefix(prefix)?.strip_prefix('-')?.parse().ok()
}

/// Collection holding one high-water mark per record collection.
const ID_MARKS: &str = "id_marks";

fn max_id_number<'a>(prefix: &str, existing: impl IntoIterator<Item = &'a str>) -> u64 {
    existing
        .into_iter()
        .filter_map(|id| id_number(prefix, id))
        .max()
        .unwrap_or(0)
}

/// The number after both the stored mark and every id still present.
/// Ids of deleted records stay behind the mark and are never handed out again.
fn advance_mark(stored: Option<u64>, scanned_max: u64) -> u64 {
    stored.unwrap_or(0).max(scanned_max) + 1
}

#[derive(Deserialize)]
struct IdMark {
    last: u64,
}

/// Typed CRUD over one collection of [`Record`]s.
pub struct Repository<S: ?Sized, T> {
    store: Arc<S>,
    retry: RetryPolicy,
    _record: PhantomData<fn() -> T>,
}

impl<S: ?Sized, T> Clone for Repository<S, T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            retry: self.retry,
            _record: PhantomData,
        }
    }
}

impl<S: DocumentStore + ?Sized, T: Record> Repository<S, T> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
            _record: PhantomData,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn key(&self, scope: &TenantScope, id: &str) -> Result<DocKey, CatalogError> {
        Ok(DocKey::new(scope.collection(T::COLLECTION), id)?)
    }

    /// All records, ordered by their numeric id suffix.
    pub async fn list(&self, scope: &TenantScope) -> Result<Vec<T>, CatalogError> {
        let docs = self.store.list(&scope.collection(T::COLLECTION)).await?;
        let mut records = docs
            .into_iter()
            .map(|(_, doc)| doc.decode::<T>())
            .collect::<Result<Vec<_>, _>>()?;
        records.sort_by_key(|r| id_number(T::ID_PREFIX, r.id()).unwrap_or(u64::MAX));
        Ok(records)
    }

    pub async fn find(&self, scope: &TenantScope, id: &str) -> Result<Option<T>, CatalogError> {
        let key = self.key(scope, id)?;
        match self.store.get(&key).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    pub async fn get(&self, scope: &TenantScope, id: &str) -> Result<T, CatalogError> {
        self.find(scope, id)
            .await?
            .ok_or_else(|| CatalogError::NotFound {
                collection: T::COLLECTION,
                id: id.to_string(),
            })
    }

    /// Insert `record` under a freshly assigned id. Numbers come from a per
    /// collection high-water mark advanced in a transaction, so concurrent
    /// creates never share an id and a deleted record's id is never reused.
    /// The insert itself is create-only; on a collision the id is reserved again.
    pub async fn create(&self, scope: &TenantScope, mut record: T) -> Result<T, CatalogError> {
        record.validate().map_err(CatalogError::Invalid)?;
        let collection = scope.collection(T::COLLECTION);
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let id = self.reserve_id(scope, &collection).await?;
            record.set_id(id.clone());
            let key = DocKey::new(&collection, &id)?;
            let data = serde_json::to_value(&record).map_err(StoreError::from)?;
            match self.store.compare_and_put(&key, None, data).await {
                Ok(_) => return Ok(record),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    warn!(%key, attempt, error = %err, "id taken, reserving another");
                    tokio::time::sleep(self.retry.backoff(attempt)).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn reserve_id(
        &self,
        scope: &TenantScope,
        collection: &str,
    ) -> Result<String, CatalogError> {
        // records written before the mark existed still count
        let existing = self.store.list(collection).await?;
        let scanned = max_id_number(T::ID_PREFIX, existing.iter().map(|(id, _)| id.as_str()));
        let mark_key = DocKey::new(scope.collection(ID_MARKS), T::COLLECTION)?;
        let doc = transact::<_, _, CatalogError>(&*self.store, &mark_key, &self.retry, |current| {
            let stored = match current {
                Some(doc) => Some(doc.decode::<IdMark>()?.last),
                None => None,
            };
            Ok(serde_json::json!({ "last": advance_mark(stored, scanned) }))
        })
        .await?;
        let last = doc.decode::<IdMark>()?.last;
        Ok(format!("{}-{}", T::ID_PREFIX, last))
    }

    /// Replace an existing record. Fails with `NotFound` if it is gone.
    pub async fn update(&self, scope: &TenantScope, record: T) -> Result<T, CatalogError> {
        record.validate().map_err(CatalogError::Invalid)?;
        let key = self.key(scope, record.id())?;
        let data = serde_json::to_value(&record).map_err(StoreError::from)?;
        transact(&*self.store, &key, &self.retry, |current| match current {
            Some(_) => Ok(data.clone()),
            None => Err(CatalogError::NotFound {
                collection: T::COLLECTION,
                id: record.id().to_string(),
            }),
        })
        .await?;
        Ok(record)
    }

    /// Create when the record has no id yet, otherwise update.
    pub async fn upsert(&self, scope: &TenantScope, record: T) -> Result<T, CatalogError> {
        if record.id().is_empty() {
            self.create(scope, record).await
        } else {
            self.update(scope, record).await
        }
    }

    pub async fn delete(&self, scope: &TenantScope, id: &str) -> Result<bool, CatalogError> {
        let key = self.key(scope, id)?;
        Ok(self.store.delete(&key).await?)
    }

    /// Apply `apply` to the stored record inside one transaction. `apply` may run
    /// more than once under contention; its error aborts without writing.
    pub async fn modify<F, E>(&self, scope: &TenantScope, id: &str, mut apply: F) -> Result<T, E>
    where
        F: FnMut(&mut T) -> Result<(), E> + Send,
        E: From<CatalogError> + From<StoreError>,
    {
        let key = self.key(scope, id)?;
        let doc = transact::<_, _, E>(&*self.store, &key, &self.retry, |current| {
            let doc = current.ok_or_else(|| CatalogError::NotFound {
                collection: T::COLLECTION,
                id: id.to_string(),
            })?;
            let mut record: T = doc.decode()?;
            apply(&mut record)?;
            record.validate().map_err(CatalogError::Invalid)?;
            Ok(serde_json::to_value(&record).map_err(StoreError::from)?)
        })
        .await?;
        Ok(doc.decode::<T>()?)
    }
}
