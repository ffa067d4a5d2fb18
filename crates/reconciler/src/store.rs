//! Record store trait and implementations.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::types::{DesiredStateRecord, InstanceStatus, RecordKey, RecordMeta};

/// Typed access to desired-state records and their status.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch a snapshot of a record. `Ok(None)` when it does not exist.
    async fn get(&self, key: &RecordKey) -> Result<Option<DesiredStateRecord>>;

    /// Replace the status of the record `meta` was read from.
    ///
    /// Implementations backed by a versioned store must reject the write
    /// when `meta.resource_version` is stale.
    async fn update_status(&self, meta: &RecordMeta, status: &InstanceStatus) -> Result<()>;
}

/// In-memory record store for testing and local runs.
///
/// Versions are plain counters; a status write carrying a stale version is
/// rejected with `Error::StatusConflict`.
#[derive(Default)]
pub struct InMemoryRecordStore {
    records: RwLock<HashMap<RecordKey, DesiredStateRecord>>,
    status_writes: AtomicUsize,
}

impl InMemoryRecordStore {
    /// Create a new in-memory record store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new in-memory record store wrapped in an Arc.
    pub fn new_arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Insert or replace a record, as an operator applying a manifest would.
    ///
    /// Replacing an existing record keeps its stored status; the status of
    /// `record` is only used when the key is new.
    pub async fn insert(&self, mut record: DesiredStateRecord) {
        let mut records = self.records.write().await;
        if let Some(existing) = records.get(&record.key()) {
            record.status = existing.status.clone();
        }
        let version = next_version(
            records
                .get(&record.key())
                .and_then(|r| r.meta.resource_version.as_deref()),
        );
        record.meta.resource_version = Some(version);
        records.insert(record.key(), record);
    }

    /// Remove a record.
    pub async fn remove(&self, key: &RecordKey) -> Option<DesiredStateRecord> {
        self.records.write().await.remove(key)
    }

    /// Current status of a record, if it exists.
    pub async fn status_of(&self, key: &RecordKey) -> Option<InstanceStatus> {
        self.records
            .read()
            .await
            .get(key)
            .map(|r| r.status.clone())
    }

    /// Number of successful status writes so far.
    pub fn status_writes(&self) -> usize {
        self.status_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get(&self, key: &RecordKey) -> Result<Option<DesiredStateRecord>> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn update_status(&self, meta: &RecordMeta, status: &InstanceStatus) -> Result<()> {
        let key = meta.key();
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&key)
            .ok_or_else(|| Error::record_not_found(key.to_string()))?;

        if let Some(expected) = meta.resource_version.as_deref() {
            let current = record.meta.resource_version.as_deref().unwrap_or_default();
            if current != expected {
                return Err(Error::status_conflict(
                    key.to_string(),
                    format!("read at version {expected}, store is at {current}"),
                ));
            }
        }

        record.status = status.clone();
        record.meta.resource_version = Some(next_version(record.meta.resource_version.as_deref()));
        self.status_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn next_version(current: Option<&str>) -> String {
    current
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(1, |v| v.saturating_add(1))
        .to_string()
}

/// A wrapper that adds tracing to a record store.
pub struct TracingRecordStore<S: RecordStore> {
    inner: S,
}

impl<S: RecordStore> TracingRecordStore<S> {
    /// Create a new tracing record store.
    pub const fn new(inner: S) -> Self {
        Self { inner }
    }

    /// Borrow the wrapped store.
    pub const fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: RecordStore> RecordStore for TracingRecordStore<S> {
    async fn get(&self, key: &RecordKey) -> Result<Option<DesiredStateRecord>> {
        tracing::debug!(key = %key, "Fetching record");
        let result = self.inner.get(key).await;
        if let Ok(ref record) = result {
            tracing::trace!(key = %key, found = record.is_some(), "Record fetched");
        }
        result
    }

    async fn update_status(&self, meta: &RecordMeta, status: &InstanceStatus) -> Result<()> {
        tracing::debug!(
            key = %meta.key(),
            instance_id = %status.instance_id,
            state = %status.state,
            "Updating record status"
        );
        self.inner.update_status(meta, status).await
    }
}
