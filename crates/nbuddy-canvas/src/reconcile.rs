//! Canvas fetch and reconciliation
//!
//! Reads go to the remote store first. When the store answers, its data
//! replaces the local mirror (remote wins). When it fails for any reason the
//! mirror is served instead. Writes go to the mirror first; the remote
//! outcome is reported alongside the result.
//!
//! A canvas whose remote create failed is marked unsynced in the mirror. It
//! survives remote list refreshes until [`CanvasSync::publish_canvas`]
//! succeeds, the remote list starts reporting it, or it is deleted.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::blocks::BlockList;
use crate::document::Canvas;
use crate::error::{Error, Result};
use crate::mirror::LocalMirror;
use crate::store::CanvasStore;

/// Where a result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Fresh from the remote store
    Remote,
    /// Served from, or only recorded in, the local mirror
    Mirror,
}

/// Result of a reconciled operation
#[derive(Debug)]
pub struct Synced<T> {
    /// The value handed to the UI
    pub value: T,
    /// Where the value came from
    pub source: Source,
    /// Remote failure that caused the fallback, if any
    pub remote_error: Option<Error>,
}

impl<T> Synced<T> {
    fn remote(value: T) -> Self {
        Self {
            value,
            source: Source::Remote,
            remote_error: None,
        }
    }

    fn fallback(value: T, error: Error) -> Self {
        Self {
            value,
            source: Source::Mirror,
            remote_error: Some(error),
        }
    }

    /// True if the remote store was reached
    #[must_use]
    pub fn is_remote(&self) -> bool {
        self.source == Source::Remote
    }
}

/// Network-then-cache access to canvases
#[derive(Clone)]
pub struct CanvasSync {
    store: Arc<dyn CanvasStore>,
    mirror: LocalMirror,
}

impl CanvasSync {
    /// Create a reconciler over a remote store and a local mirror
    #[must_use]
    pub fn new(store: Arc<dyn CanvasStore>, mirror: LocalMirror) -> Self {
        Self { store, mirror }
    }

    /// The remote store
    #[must_use]
    pub fn store(&self) -> Arc<dyn CanvasStore> {
        Arc::clone(&self.store)
    }

    /// The local mirror
    #[must_use]
    pub fn mirror(&self) -> &LocalMirror {
        &self.mirror
    }

    /// Load the canvas list.
    ///
    /// Fails only when the remote store and the mirror both fail.
    pub async fn load_canvases(&self) -> Result<Synced<Vec<Canvas>>> {
        match self.store.list_canvases().await {
            Ok(mut canvases) => {
                info!(count = canvases.len(), "Loaded canvases from remote store");
                match self.keep_unsynced(&mut canvases) {
                    Ok(()) => {
                        if let Err(e) = self.mirror.save_all(&canvases) {
                            warn!(error = %e, "Failed to refresh local mirror");
                        }
                    }
                    Err(e) => warn!(error = %e, "Unsynced canvases unreadable; mirror left as is"),
                }
                Ok(Synced::remote(canvases))
            }
            Err(e) => {
                warn!(error = %e, "Canvas list fetch failed; using local mirror");
                let canvases = self.mirror.load_all()?;
                Ok(Synced::fallback(canvases, e))
            }
        }
    }

    /// Load one canvas with its blocks.
    ///
    /// Canvas metadata comes from the mirror (refreshed by
    /// [`load_canvases`](Self::load_canvases)); blocks come from the remote
    /// store when it answers.
    pub async fn open_canvas(&self, canvas_id: &str) -> Result<Synced<Canvas>> {
        let cached = self.mirror.get(canvas_id)?;

        match self.store.list_blocks(canvas_id).await {
            Ok(blocks) => {
                let mut canvas =
                    cached.unwrap_or_else(|| Canvas::new("Untitled").with_id(canvas_id));
                canvas.blocks = BlockList::from_blocks(blocks).into_blocks();
                debug!(canvas_id, blocks = canvas.blocks.len(), "Loaded canvas blocks");
                if let Err(e) = self.mirror.upsert(&canvas) {
                    warn!(error = %e, "Failed to refresh local mirror");
                }
                Ok(Synced::remote(canvas))
            }
            Err(e) => {
                warn!(canvas_id, error = %e, "Block fetch failed; using local mirror");
                let mut canvas =
                    cached.ok_or_else(|| Error::CanvasNotFound(canvas_id.to_string()))?;
                canvas.blocks = BlockList::from_blocks(canvas.blocks).into_blocks();
                Ok(Synced::fallback(canvas, e))
            }
        }
    }

    /// Create a canvas with a placeholder heading block
    pub async fn create_canvas(&self, title: &str) -> Result<Synced<Canvas>> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::validation("Canvas title cannot be empty."));
        }

        let canvas = Canvas::new(title).with_placeholder_block();
        self.mirror.upsert(&canvas)?;
        info!(canvas_id = %canvas.id, "Created canvas");

        let remote = async {
            self.store.create_canvas(&canvas).await?;
            self.store.save_blocks(&canvas.id, &canvas.blocks).await
        };
        Ok(match remote.await {
            Ok(()) => Synced::remote(canvas),
            Err(e) => {
                warn!(canvas_id = %canvas.id, error = %e, "Remote canvas create failed");
                self.mirror.mark_unsynced(&canvas.id)?;
                Synced::fallback(canvas, e)
            }
        })
    }

    /// Send a canvas that only exists in the mirror to the remote store
    pub async fn publish_canvas(&self, canvas_id: &str) -> Result<Synced<Canvas>> {
        let canvas = self
            .mirror
            .get(canvas_id)?
            .ok_or_else(|| Error::CanvasNotFound(canvas_id.to_string()))?;

        let remote = async {
            self.store.create_canvas(&canvas).await?;
            self.store.save_blocks(&canvas.id, &canvas.blocks).await
        };
        Ok(match remote.await {
            Ok(()) => {
                self.mirror.clear_unsynced(canvas_id)?;
                info!(canvas_id, "Published local canvas");
                Synced::remote(canvas)
            }
            Err(e) => {
                warn!(canvas_id, error = %e, "Remote canvas create failed");
                Synced::fallback(canvas, e)
            }
        })
    }

    /// Canvas ids that exist only in the mirror
    pub fn unsynced_canvases(&self) -> Result<Vec<String>> {
        self.mirror.unsynced()
    }

    /// Append mirror-only canvases missing from a remote listing and drop
    /// unsynced marks the remote now knows about
    fn keep_unsynced(&self, remote: &mut Vec<Canvas>) -> Result<()> {
        for id in self.mirror.unsynced()? {
            if remote.iter().any(|c| c.id == id) {
                self.mirror.clear_unsynced(&id)?;
                continue;
            }
            match self.mirror.get(&id)? {
                Some(local) => {
                    debug!(canvas_id = %id, "Keeping unsynced canvas");
                    remote.push(local);
                }
                None => self.mirror.clear_unsynced(&id)?,
            }
        }
        Ok(())
    }

    /// Rename a canvas
    pub async fn rename_canvas(&self, canvas_id: &str, title: &str) -> Result<Synced<Canvas>> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::validation("Canvas title cannot be empty."));
        }

        let mut canvas = self
            .mirror
            .get(canvas_id)?
            .ok_or_else(|| Error::CanvasNotFound(canvas_id.to_string()))?;
        canvas.title = title.to_string();
        canvas.touch();
        self.mirror.upsert(&canvas)?;

        Ok(match self.store.update_canvas(&canvas).await {
            Ok(()) => Synced::remote(canvas),
            Err(e) => {
                warn!(canvas_id, error = %e, "Remote canvas rename failed");
                Synced::fallback(canvas, e)
            }
        })
    }

    /// Delete a canvas. Returns whether the mirror held it.
    pub async fn delete_canvas(&self, canvas_id: &str) -> Result<Synced<bool>> {
        let existed = self.mirror.remove(canvas_id)?;
        self.mirror.clear_unsynced(canvas_id)?;
        info!(canvas_id, "Deleted canvas");

        Ok(match self.store.delete_canvas(canvas_id).await {
            Ok(()) => Synced::remote(existed),
            Err(e) => {
                warn!(canvas_id, error = %e, "Remote canvas delete failed");
                Synced::fallback(existed, e)
            }
        })
    }
}
