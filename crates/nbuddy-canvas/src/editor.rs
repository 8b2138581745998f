//! Canvas editor
//!
//! Binds one open canvas to its block list, the local mirror and an autosave
//! worker. Every mutation is applied in memory first, then written to the
//! mirror and staged for the remote store. The in-memory list stays
//! authoritative for the session: a failed mirror or remote write never
//! undoes an edit.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::autosave::{AutosaveHandle, AutosaveTask, SyncStatus};
use crate::blocks::{BlockList, Direction, ListChange};
use crate::document::{Block, BlockId, Canvas};
use crate::error::{Error, Result};
use crate::mirror::LocalMirror;
use crate::store::CanvasStore;
use crate::toc::TocEntry;

/// Editing session for one canvas
pub struct CanvasEditor {
    canvas_id: String,
    title: String,
    edited_at: DateTime<Utc>,
    blocks: BlockList,
    mirror: LocalMirror,
    autosave: AutosaveHandle,
}

impl CanvasEditor {
    /// Open an editor on a loaded canvas.
    ///
    /// Spawns the autosave worker, so this must run inside a Tokio runtime.
    #[must_use]
    pub fn open(
        canvas: Canvas,
        mirror: LocalMirror,
        store: Arc<dyn CanvasStore>,
        debounce: Duration,
    ) -> Self {
        let autosave = AutosaveTask::spawn(canvas.id.clone(), store, debounce);
        debug!(canvas_id = %canvas.id, blocks = canvas.blocks.len(), "Opened canvas editor");
        Self {
            canvas_id: canvas.id,
            title: canvas.title,
            edited_at: canvas.edited_at,
            blocks: BlockList::from_blocks(canvas.blocks),
            mirror,
            autosave,
        }
    }

    /// Canvas ID
    #[must_use]
    pub fn canvas_id(&self) -> &str {
        &self.canvas_id
    }

    /// Canvas title
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Blocks in sequence order
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        self.blocks.blocks()
    }

    /// Get a block by ID
    #[must_use]
    pub fn block(&self, id: &BlockId) -> Option<&Block> {
        self.blocks.get(id)
    }

    /// Table of contents of the current sequence
    #[must_use]
    pub fn toc(&self) -> Vec<TocEntry> {
        self.blocks.toc()
    }

    /// Current persistence status
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        self.autosave.status()
    }

    /// Subscribe to persistence status changes
    #[must_use]
    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.autosave.subscribe()
    }

    /// Snapshot of the canvas as currently edited
    #[must_use]
    pub fn snapshot(&self) -> Canvas {
        Canvas {
            id: self.canvas_id.clone(),
            title: self.title.clone(),
            edited_at: self.edited_at,
            blocks: self.blocks.blocks().to_vec(),
        }
    }

    /// Insert a block at `position` (end when `None`), returning its id
    pub fn insert(&mut self, position: Option<usize>, content: impl Into<String>) -> Result<BlockId> {
        let change = self.blocks.insert(position, content);
        let id = change
            .inserted
            .first()
            .cloned()
            .ok_or_else(|| Error::validation("nothing inserted"))?;
        self.commit(&change)?;
        Ok(id)
    }

    /// Insert several blocks as one contiguous run
    pub fn insert_many(
        &mut self,
        position: Option<usize>,
        contents: Vec<String>,
    ) -> Result<Vec<BlockId>> {
        let change = self.blocks.insert_many(position, contents);
        self.commit(&change)?;
        Ok(change.inserted)
    }

    /// Replace a block's content
    pub fn update(&mut self, id: &BlockId, content: impl Into<String>) -> Result<()> {
        let change = self.blocks.update(id, content)?;
        self.commit(&change)
    }

    /// Swap a block with its neighbour. Returns false at the boundaries.
    pub fn move_block(&mut self, id: &BlockId, direction: Direction) -> Result<bool> {
        let change = self.blocks.move_block(id, direction)?;
        if change.is_empty() {
            return Ok(false);
        }
        self.commit(&change)?;
        Ok(true)
    }

    /// Delete a block
    pub fn delete(&mut self, id: &BlockId) -> Result<()> {
        let change = self.blocks.delete(id)?;
        self.commit(&change)
    }

    /// Write pending changes to the remote store now
    pub async fn flush(&self) -> Result<()> {
        self.autosave.flush().await
    }

    /// Close the editor, discarding changes not yet written remotely.
    ///
    /// Call [`flush`](Self::flush) first to keep them.
    pub async fn close(self) {
        debug!(canvas_id = %self.canvas_id, "Closing canvas editor");
        self.autosave.shutdown().await;
    }

    fn commit(&mut self, change: &ListChange) -> Result<()> {
        if change.is_empty() {
            return Ok(());
        }
        self.edited_at = Utc::now();

        let created: Vec<Block> = change
            .inserted
            .iter()
            .filter_map(|id| self.blocks.get(id).cloned())
            .collect();
        let modified: Vec<Block> = change
            .modified
            .iter()
            .filter_map(|id| self.blocks.get(id).cloned())
            .collect();
        self.autosave.stage_new(created);
        self.autosave.stage(modified);
        for id in &change.removed {
            self.autosave.remove(id.clone());
        }

        self.mirror.upsert(&self.snapshot()).map_err(|e| {
            warn!(canvas_id = %self.canvas_id, error = %e, "Mirror write failed");
            e
        })
    }
}

impl std::fmt::Debug for CanvasEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanvasEditor")
            .field("canvas_id", &self.canvas_id)
            .field("blocks", &self.blocks.len())
            .finish()
    }
}
