//! File-backed snapshot store: a local persistent cache of the last-known
//! catalog state, kept as one JSON document.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use super::store::{ProductSnapshot, SnapshotStore, StockKey, StoreError};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    /// product id -> variant id -> level
    #[serde(default)]
    stock: BTreeMap<String, BTreeMap<String, i64>>,
    #[serde(default)]
    products: BTreeMap<String, ProductSnapshot>,
}

impl Document {
    fn stock(&self, key: &StockKey) -> Option<i64> {
        self.stock.get(&key.product_id)?.get(&key.variant_id).copied()
    }

    fn put_stock(&mut self, key: &StockKey, quantity: i64) -> Option<i64> {
        self.stock
            .entry(key.product_id.clone())
            .or_default()
            .insert(key.variant_id.clone(), quantity)
    }

    fn restore_stock(&mut self, key: &StockKey, previous: Option<i64>) {
        if let Some(previous) = previous {
            self.put_stock(key, previous);
            return;
        }
        if let Some(variants) = self.stock.get_mut(&key.product_id) {
            variants.remove(&key.variant_id);
            if variants.is_empty() {
                self.stock.remove(&key.product_id);
            }
        }
    }

    fn stock_len(&self) -> usize {
        self.stock.values().map(BTreeMap::len).sum()
    }
}

/// When changes reach the file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// Rewrite the file on every change. Each rewrite is a full document, so
    /// this suits small catalogs.
    #[default]
    Immediate,
    /// Keep changes in memory until `flush`. The sync engine flushes after
    /// every batch, so a large first sync costs one rewrite per batch.
    Deferred,
}

#[derive(Debug, Default)]
struct State {
    doc: Document,
    dirty: bool,
}

/// Snapshot store persisted to a JSON file.
///
/// The whole document is held in memory behind an async mutex, so writes are
/// serialized. The file is rewritten through a temporary sibling and a
/// rename, leaving either the old or the new document on disk.
#[derive(Clone)]
pub struct FileSnapshotStore {
    path: Arc<PathBuf>,
    mode: WriteMode,
    state: Arc<Mutex<State>>,
}

impl FileSnapshotStore {
    /// Open the store at `path`, starting empty if the file does not exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with_mode(path, WriteMode::Immediate).await
    }

    pub async fn open_with_mode(
        path: impl AsRef<Path>,
        mode: WriteMode,
    ) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let doc: Document = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => Document::default(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Document::default(),
            Err(err) => return Err(err.into()),
        };
        debug!(path = %path.display(), records = doc.stock_len(), ?mode, "Opened snapshot file");

        Ok(Self {
            path: Arc::new(path),
            mode,
            state: Arc::new(Mutex::new(State { doc, dirty: false })),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    async fn persist(&self, doc: &Document) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(doc)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, self.path.as_ref()).await?;
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn get_stock(&self, key: &StockKey) -> Result<Option<i64>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.doc.stock(key))
    }

    async fn set_stock(&self, key: &StockKey, quantity: i64) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let previous = state.doc.put_stock(key, quantity);
        if previous == Some(quantity) {
            return Ok(());
        }
        if self.mode == WriteMode::Deferred {
            state.dirty = true;
            return Ok(());
        }
        if let Err(err) = self.persist(&state.doc).await {
            // keep memory in step with what is on disk
            state.doc.restore_stock(key, previous);
            return Err(err);
        }
        Ok(())
    }

    async fn get_product_snapshot(
        &self,
        product_id: &str,
    ) -> Result<Option<ProductSnapshot>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.doc.products.get(product_id).cloned())
    }

    async fn set_product_snapshot(
        &self,
        product_id: &str,
        snapshot: ProductSnapshot,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.doc.products.get(product_id) == Some(&snapshot) {
            return Ok(());
        }
        let previous = state.doc.products.insert(product_id.to_string(), snapshot);
        if self.mode == WriteMode::Deferred {
            state.dirty = true;
            return Ok(());
        }
        if let Err(err) = self.persist(&state.doc).await {
            match previous {
                Some(previous) => state.doc.products.insert(product_id.to_string(), previous),
                None => state.doc.products.remove(product_id),
            };
            return Err(err);
        }
        Ok(())
    }

    /// Write pending changes. On failure they stay pending for the next call.
    async fn flush(&self) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if !state.dirty {
            return Ok(());
        }
        self.persist(&state.doc).await?;
        state.dirty = false;
        debug!(path = %self.path.display(), records = state.doc.stock_len(), "Flushed snapshot file");
        Ok(())
    }
}
