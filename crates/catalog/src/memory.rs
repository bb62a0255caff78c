//! In-memory backing store.
//!
//! Writes are staged per connection and applied atomically on commit, so
//! concurrent sessions never observe each other's uncommitted work and the
//! last committed write to an entry wins.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use raster_common::DatasetMetadata;

use crate::error::{CatalogError, Result};
use crate::keys::KeyTuple;
use crate::query::{KeyFilter, Page};
use crate::schema::KeySchema;
use crate::store::{CatalogInfo, MetaStore, OpenMode, StoreConnection};

#[derive(Debug, Clone)]
struct Entry {
    path: String,
    metadata: Option<DatasetMetadata>,
}

#[derive(Debug, Default)]
struct MemoryState {
    info: Option<CatalogInfo>,
    datasets: BTreeMap<KeyTuple, Entry>,
}

/// Catalog held in process memory. Clones share the same state.
#[derive(Debug, Clone)]
pub struct MemoryMetaStore {
    path: String,
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryMetaStore {
    pub fn new() -> Self {
        Self::named("")
    }

    pub fn named(name: &str) -> Self {
        Self {
            path: format!("memory://{}", name),
            state: Arc::new(RwLock::new(MemoryState::default())),
        }
    }
}

impl Default for MemoryMetaStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetaStore for MemoryMetaStore {
    fn driver_name(&self) -> &'static str {
        "MemoryMetaStore"
    }

    fn path(&self) -> &str {
        &self.path
    }

    async fn begin(&self, mode: OpenMode) -> Result<Box<dyn StoreConnection>> {
        if mode == OpenMode::Existing && self.state.read().await.info.is_none() {
            return Err(CatalogError::invalid_database(format!(
                "no catalog found at {}",
                self.path
            )));
        }

        Ok(Box::new(MemoryConnection {
            path: self.path.clone(),
            state: Arc::clone(&self.state),
            staged: Vec::new(),
        }))
    }
}

#[derive(Debug)]
enum StagedOp {
    Initialize(CatalogInfo),
    SetVersion(String),
    Upsert(KeyTuple, Entry),
    PutMetadata(KeyTuple, DatasetMetadata),
    Remove(KeyTuple),
}

struct MemoryConnection {
    path: String,
    state: Arc<RwLock<MemoryState>>,
    staged: Vec<StagedOp>,
}

impl MemoryConnection {
    /// Committed info with this connection's staged changes applied.
    async fn info_view(&self) -> Option<CatalogInfo> {
        let mut info = self.state.read().await.info.clone();
        for op in &self.staged {
            match op {
                StagedOp::Initialize(new) => info = Some(new.clone()),
                StagedOp::SetVersion(version) => {
                    if let Some(current) = info.as_mut() {
                        current.version = version.clone();
                    }
                }
                _ => {}
            }
        }
        info
    }

    /// One entry as seen by this connection.
    async fn entry_view(&self, keys: &KeyTuple) -> Option<Entry> {
        let mut entry = self.state.read().await.datasets.get(keys).cloned();
        for op in &self.staged {
            apply_to_entry(&mut entry, keys, op);
        }
        entry
    }

    /// All entries as seen by this connection.
    async fn datasets_view(&self) -> BTreeMap<KeyTuple, Entry> {
        let mut datasets = self.state.read().await.datasets.clone();
        for op in &self.staged {
            apply_to_map(&mut datasets, op);
        }
        datasets
    }
}

fn apply_to_entry(entry: &mut Option<Entry>, keys: &KeyTuple, op: &StagedOp) {
    match op {
        StagedOp::Upsert(k, new) if k == keys => *entry = Some(new.clone()),
        StagedOp::PutMetadata(k, metadata) if k == keys => {
            if let Some(entry) = entry.as_mut() {
                entry.metadata = Some(metadata.clone());
            }
        }
        StagedOp::Remove(k) if k == keys => *entry = None,
        _ => {}
    }
}

fn apply_to_map(datasets: &mut BTreeMap<KeyTuple, Entry>, op: &StagedOp) {
    match op {
        StagedOp::Upsert(keys, entry) => {
            datasets.insert(keys.clone(), entry.clone());
        }
        StagedOp::PutMetadata(keys, metadata) => {
            if let Some(entry) = datasets.get_mut(keys) {
                entry.metadata = Some(metadata.clone());
            }
        }
        StagedOp::Remove(keys) => {
            datasets.remove(keys);
        }
        StagedOp::Initialize(_) | StagedOp::SetVersion(_) => {}
    }
}

#[async_trait]
impl StoreConnection for MemoryConnection {
    async fn read_info(&mut self) -> Result<Option<CatalogInfo>> {
        Ok(self.info_view().await)
    }

    async fn initialize(&mut self, schema: &KeySchema, version: &str) -> Result<()> {
        self.staged.push(StagedOp::Initialize(CatalogInfo {
            version: version.to_string(),
            schema: schema.clone(),
        }));
        Ok(())
    }

    async fn write_version(&mut self, version: &str) -> Result<()> {
        self.staged.push(StagedOp::SetVersion(version.to_string()));
        Ok(())
    }

    async fn datasets(
        &mut self,
        schema: &KeySchema,
        filter: &KeyFilter,
        page: Page,
    ) -> Result<Vec<(KeyTuple, String)>> {
        let datasets = self.datasets_view().await;
        let matching = datasets
            .into_iter()
            .filter(|(keys, _)| filter.matches(schema, keys))
            .map(|(keys, entry)| (keys, entry.path));
        Ok(page.apply(matching).collect())
    }

    async fn dataset_path(
        &mut self,
        _schema: &KeySchema,
        keys: &KeyTuple,
    ) -> Result<Option<String>> {
        Ok(self.entry_view(keys).await.map(|entry| entry.path))
    }

    async fn metadata(
        &mut self,
        _schema: &KeySchema,
        keys: &KeyTuple,
    ) -> Result<Option<DatasetMetadata>> {
        Ok(self.entry_view(keys).await.and_then(|entry| entry.metadata))
    }

    async fn upsert(
        &mut self,
        _schema: &KeySchema,
        keys: &KeyTuple,
        path: &str,
        metadata: Option<&DatasetMetadata>,
    ) -> Result<()> {
        self.staged.push(StagedOp::Upsert(
            keys.clone(),
            Entry {
                path: path.to_string(),
                metadata: metadata.cloned(),
            },
        ));
        Ok(())
    }

    async fn put_metadata(
        &mut self,
        _schema: &KeySchema,
        keys: &KeyTuple,
        metadata: &DatasetMetadata,
    ) -> Result<()> {
        self.staged
            .push(StagedOp::PutMetadata(keys.clone(), metadata.clone()));
        Ok(())
    }

    async fn remove(&mut self, _schema: &KeySchema, keys: &KeyTuple) -> Result<bool> {
        let existed = self.entry_view(keys).await.is_some();
        self.staged.push(StagedOp::Remove(keys.clone()));
        Ok(existed)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let this = *self;
        let mut state = this.state.write().await;
        for op in &this.staged {
            if let StagedOp::Initialize(_) = op {
                if state.info.is_some() {
                    return Err(CatalogError::AlreadyInitialized(this.path.clone()));
                }
            }
        }

        let count = this.staged.len();
        for op in this.staged {
            match op {
                StagedOp::Initialize(info) => state.info = Some(info),
                StagedOp::SetVersion(version) => {
                    if let Some(info) = state.info.as_mut() {
                        info.version = version;
                    }
                }
                other => apply_to_map(&mut state.datasets, &other),
            }
        }
        debug!(operations = count, "Committed in-memory transaction");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        debug!(operations = self.staged.len(), "Discarded in-memory transaction");
        Ok(())
    }
}
