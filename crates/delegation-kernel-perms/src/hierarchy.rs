//! Lazily resolved data owner hierarchies.
//!
//! A data owner's parent is fetched through a [`DataOwnerLookup`] the first
//! time it is asked for and then kept for the lifetime of the request.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::debug;

use delegation_kernel_core::DataOwnerId;

use crate::auth::{DataOwnerDetails, DataOwnerType};
use crate::error::{PermsError, Result};

/// Stored form of a data owner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataOwnerRecord {
    pub id: DataOwnerId,
    pub data_owner_type: DataOwnerType,
    pub parent_id: Option<DataOwnerId>,
}

impl DataOwnerRecord {
    pub fn new(id: impl Into<DataOwnerId>, data_owner_type: DataOwnerType, parent_id: Option<&str>) -> Self {
        Self {
            id: id.into(),
            data_owner_type,
            parent_id: parent_id.map(DataOwnerId::from),
        }
    }
}

/// Source of data owner records.
#[async_trait]
pub trait DataOwnerLookup: Send + Sync {
    async fn find_data_owner(&self, id: &DataOwnerId) -> Result<Option<DataOwnerRecord>>;
}

/// A data owner whose parent is fetched on first use.
pub struct LazyDataOwner {
    record: DataOwnerRecord,
    lookup: Arc<dyn DataOwnerLookup>,
    parent: OnceCell<Option<Arc<dyn DataOwnerDetails>>>,
}

impl LazyDataOwner {
    pub fn from_record(record: DataOwnerRecord, lookup: Arc<dyn DataOwnerLookup>) -> Self {
        Self {
            record,
            lookup,
            parent: OnceCell::new(),
        }
    }

    /// Fetch a data owner by id.
    pub async fn load(id: &DataOwnerId, lookup: Arc<dyn DataOwnerLookup>) -> Result<Arc<dyn DataOwnerDetails>> {
        let record = lookup
            .find_data_owner(id)
            .await?
            .ok_or_else(|| PermsError::UnknownDataOwner(id.to_string()))?;
        Ok(Arc::new(Self::from_record(record, lookup)))
    }

    pub fn record(&self) -> &DataOwnerRecord {
        &self.record
    }

    async fn fetch_parent(&self) -> Result<Option<Arc<dyn DataOwnerDetails>>> {
        let Some(parent_id) = &self.record.parent_id else {
            return Ok(None);
        };
        debug!(data_owner = %self.record.id, parent = %parent_id, "resolving parent data owner");
        let record = self
            .lookup
            .find_data_owner(parent_id)
            .await?
            .ok_or_else(|| PermsError::UnknownDataOwner(parent_id.to_string()))?;
        let parent: Arc<dyn DataOwnerDetails> =
            Arc::new(LazyDataOwner::from_record(record, self.lookup.clone()));
        Ok(Some(parent))
    }
}

impl std::fmt::Debug for LazyDataOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyDataOwner")
            .field("record", &self.record)
            .field("parent_resolved", &self.parent.initialized())
            .finish()
    }
}

#[async_trait]
impl DataOwnerDetails for LazyDataOwner {
    fn id(&self) -> &DataOwnerId {
        &self.record.id
    }

    fn data_owner_type(&self) -> DataOwnerType {
        self.record.data_owner_type
    }

    async fn parent(&self) -> Result<Option<Arc<dyn DataOwnerDetails>>> {
        let parent = self.parent.get_or_try_init(|| self.fetch_parent()).await?;
        Ok(parent.clone())
    }
}

/// In-memory data owner directory.
///
/// Counts lookups so callers can check that hierarchies are memoized.
#[derive(Debug, Default)]
pub struct InMemoryDataOwnerDirectory {
    records: Mutex<HashMap<DataOwnerId, DataOwnerRecord>>,
    lookups: AtomicUsize,
}

impl InMemoryDataOwnerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record.
    pub fn insert(&self, record: DataOwnerRecord) {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.insert(record.id.clone(), record);
    }

    /// Number of lookups served so far.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataOwnerLookup for InMemoryDataOwnerDirectory {
    async fn find_data_owner(&self, id: &DataOwnerId) -> Result<Option<DataOwnerRecord>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let records = self
            .records
            .lock()
            .map_err(|e| PermsError::Lookup(format!("directory lock poisoned: {}", e)))?;
        Ok(records.get(id).cloned())
    }
}
