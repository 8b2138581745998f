//! Remote canvas store abstraction
//!
//! [`CanvasStore`] is the authoritative, remote side of the canvas data. The
//! HTTP implementation lives in `nbuddy-remote`; [`MemoryCanvasStore`] keeps
//! everything in process and can simulate an unreachable server.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::{Block, BlockId, Canvas};
use crate::error::{Error, Result};

/// Remote store of canvases and their text blocks, bound to one user
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CanvasStore: Send + Sync {
    /// List the user's canvases
    async fn list_canvases(&self) -> Result<Vec<Canvas>>;

    /// Create a canvas
    async fn create_canvas(&self, canvas: &Canvas) -> Result<()>;

    /// Replace a canvas record (title, edit time, blocks)
    async fn update_canvas(&self, canvas: &Canvas) -> Result<()>;

    /// Delete a canvas
    async fn delete_canvas(&self, canvas_id: &str) -> Result<()>;

    /// List the text blocks of a canvas
    async fn list_blocks(&self, canvas_id: &str) -> Result<Vec<Block>>;

    /// Save (insert or replace) a batch of blocks
    async fn save_blocks(&self, canvas_id: &str, blocks: &[Block]) -> Result<()>;

    /// Delete one block
    async fn delete_block(&self, canvas_id: &str, block_id: &BlockId) -> Result<()>;
}

/// In-process [`CanvasStore`].
///
/// Block saves apply last-write-wins on `updated_at`: a save carrying an older
/// timestamp than the stored block is ignored.
#[derive(Debug, Default)]
pub struct MemoryCanvasStore {
    canvases: RwLock<HashMap<String, Canvas>>,
    blocks: RwLock<HashMap<String, HashMap<BlockId, Block>>>,
    offline: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryCanvasStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with a network error (or succeed again)
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of successful write calls so far
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Blocks stored for a canvas, in order
    pub async fn stored_blocks(&self, canvas_id: &str) -> Vec<Block> {
        let blocks = self.blocks.read().await;
        let mut list: Vec<Block> = blocks
            .get(canvas_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default();
        list.sort_by_key(|b| b.order);
        list
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::network("store is offline"));
        }
        Ok(())
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CanvasStore for MemoryCanvasStore {
    async fn list_canvases(&self) -> Result<Vec<Canvas>> {
        self.check_online()?;
        let mut list: Vec<Canvas> = self.canvases.read().await.values().cloned().collect();
        list.sort_by(|a, b| b.edited_at.cmp(&a.edited_at));
        Ok(list)
    }

    async fn create_canvas(&self, canvas: &Canvas) -> Result<()> {
        self.check_online()?;
        self.canvases
            .write()
            .await
            .insert(canvas.id.clone(), canvas.clone());
        self.record_write();
        Ok(())
    }

    async fn update_canvas(&self, canvas: &Canvas) -> Result<()> {
        self.check_online()?;
        let mut canvases = self.canvases.write().await;
        let existing = canvases
            .get_mut(&canvas.id)
            .ok_or_else(|| Error::CanvasNotFound(canvas.id.clone()))?;
        *existing = canvas.clone();
        self.record_write();
        Ok(())
    }

    async fn delete_canvas(&self, canvas_id: &str) -> Result<()> {
        self.check_online()?;
        self.canvases.write().await.remove(canvas_id);
        self.blocks.write().await.remove(canvas_id);
        self.record_write();
        Ok(())
    }

    async fn list_blocks(&self, canvas_id: &str) -> Result<Vec<Block>> {
        self.check_online()?;
        Ok(self.stored_blocks(canvas_id).await)
    }

    async fn save_blocks(&self, canvas_id: &str, blocks: &[Block]) -> Result<()> {
        self.check_online()?;
        let mut all = self.blocks.write().await;
        let stored = all.entry(canvas_id.to_string()).or_default();
        for block in blocks {
            match stored.get(&block.id) {
                Some(current) if current.updated_at > block.updated_at => {}
                _ => {
                    stored.insert(block.id.clone(), block.clone());
                }
            }
        }
        self.record_write();
        Ok(())
    }

    async fn delete_block(&self, canvas_id: &str, block_id: &BlockId) -> Result<()> {
        self.check_online()?;
        if let Some(stored) = self.blocks.write().await.get_mut(canvas_id) {
            stored.remove(block_id);
        }
        self.record_write();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_memory_store_canvas_crud() {
        let store = MemoryCanvasStore::new();
        let mut canvas = Canvas::new("One").with_id("c1");
        store.create_canvas(&canvas).await.unwrap();

        canvas.title = "Renamed".into();
        store.update_canvas(&canvas).await.unwrap();
        let listed = store.list_canvases().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "Renamed");

        store.delete_canvas("c1").await.unwrap();
        assert!(store.list_canvases().await.unwrap().is_empty());
        assert_eq!(store.write_count(), 3);
    }

    #[tokio::test]
    async fn test_update_missing_canvas() {
        let store = MemoryCanvasStore::new();
        let err = store.update_canvas(&Canvas::new("x")).await.unwrap_err();
        assert_eq!(err.code(), "canvas_not_found");
    }

    #[tokio::test]
    async fn test_stale_block_write_is_ignored() {
        let store = MemoryCanvasStore::new();
        let fresh = Block::with_id("b", "fresh");
        let mut stale = fresh.clone();
        stale.content = "stale".into();
        stale.updated_at = fresh.updated_at - Duration::seconds(5);

        store.save_blocks("c", &[fresh]).await.unwrap();
        store.save_blocks("c", &[stale]).await.unwrap();

        let blocks = store.list_blocks("c").await.unwrap();
        assert_eq!(blocks[0].content, "fresh");
    }

    #[tokio::test]
    async fn test_offline_store_fails() {
        let store = MemoryCanvasStore::new();
        store.set_offline(true);
        let err = store.list_canvases().await.unwrap_err();
        assert_eq!(err.code(), "network_error");
        assert_eq!(store.write_count(), 0);

        store.set_offline(false);
        assert!(store.list_canvases().await.is_ok());
    }
}
