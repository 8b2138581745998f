//! Debounced persistence
//!
//! Each open canvas owns one autosave worker. Edits are staged on the worker
//! through an unbounded channel, so staging never blocks the caller. Every
//! staged change pushes the deadline back by the debounce window; once the
//! window elapses with no further changes the worker issues one batched save
//! followed by any queued deletions.
//!
//! The worker performs writes one at a time, so writes from a single editing
//! session always reach the store in the order they were issued. A failed
//! write is reported through [`SyncStatus::Failed`] and is not retried; its
//! changes stay pending until the next flush or edit.
//!
//! ## Usage
//!
//! ```ignore
//! let handle = AutosaveTask::spawn("canvas-id", store, Duration::from_millis(2000));
//! handle.stage(vec![edited_block]);
//! // ... more edits within the window are coalesced ...
//! handle.flush().await?; // optional: write now
//! handle.cancel();       // drop anything still pending
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::document::{Block, BlockId};
use crate::error::{Error, Result};
use crate::store::CanvasStore;

/// Idle window observed in the web editor
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(2000);

/// Persistence state of an open canvas
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    /// Nothing written yet and nothing pending
    Idle,
    /// Changes are waiting for the debounce window to elapse
    Pending,
    /// A write is in flight
    Saving,
    /// Last write succeeded
    Saved {
        /// When the write completed
        at: DateTime<Utc>,
    },
    /// Last write failed; local edits are kept but not yet durable
    Failed {
        /// User-facing message
        message: String,
    },
}

impl SyncStatus {
    /// True if local edits may not be durable yet
    #[must_use]
    pub fn has_unsaved_changes(&self) -> bool {
        matches!(self, Self::Pending | Self::Saving | Self::Failed { .. })
    }
}

enum Command {
    Stage(Vec<Block>),
    StageNew(Vec<Block>),
    Remove(BlockId),
    Flush(oneshot::Sender<Result<()>>),
}

/// Changes accumulated during one debounce window
#[derive(Debug, Default)]
struct PendingChanges {
    upserts: HashMap<BlockId, Block>,
    deletions: Vec<BlockId>,
    /// Blocks created in this session that the store has not accepted yet
    local_only: HashSet<BlockId>,
}

impl PendingChanges {
    fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletions.is_empty()
    }

    fn stage(&mut self, blocks: Vec<Block>) {
        for block in blocks {
            self.deletions.retain(|id| id != &block.id);
            self.upserts.insert(block.id.clone(), block);
        }
    }

    fn stage_new(&mut self, blocks: Vec<Block>) {
        self.local_only.extend(blocks.iter().map(|b| b.id.clone()));
        self.stage(blocks);
    }

    fn remove(&mut self, id: BlockId) {
        self.upserts.remove(&id);
        if self.local_only.remove(&id) {
            return;
        }
        if !self.deletions.contains(&id) {
            self.deletions.push(id);
        }
    }

    /// Mark blocks as accepted by the store
    fn saved(&mut self, blocks: &[Block]) {
        for block in blocks {
            self.local_only.remove(&block.id);
        }
    }

    /// Put back changes from a failed write. Anything staged or removed
    /// since the batch was taken is newer and wins.
    fn restore(&mut self, blocks: Vec<Block>, deletions: Vec<BlockId>) {
        for block in blocks {
            if !self.upserts.contains_key(&block.id) && !self.deletions.contains(&block.id) {
                self.upserts.insert(block.id.clone(), block);
            }
        }
        for id in deletions {
            if !self.upserts.contains_key(&id) && !self.deletions.contains(&id) {
                self.deletions.push(id);
            }
        }
    }

    fn take(&mut self) -> (Vec<Block>, Vec<BlockId>) {
        let mut blocks: Vec<Block> = std::mem::take(&mut self.upserts).into_values().collect();
        blocks.sort_by_key(|b| b.order);
        (blocks, std::mem::take(&mut self.deletions))
    }
}

/// Spawner for autosave workers
pub struct AutosaveTask;

impl AutosaveTask {
    /// Spawn a worker for one canvas on the current Tokio runtime
    #[must_use]
    pub fn spawn(
        canvas_id: impl Into<String>,
        store: Arc<dyn CanvasStore>,
        debounce: Duration,
    ) -> AutosaveHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(SyncStatus::Idle);
        let cancel = CancellationToken::new();

        let worker = Worker {
            canvas_id: canvas_id.into(),
            store,
            debounce,
            pending: PendingChanges::default(),
            status: status_tx,
        };
        let join = tokio::spawn(worker.run(rx, cancel.clone()));

        AutosaveHandle {
            tx,
            status: status_rx,
            cancel,
            join: Some(join),
        }
    }
}

/// Handle to a running autosave worker.
///
/// Dropping the handle cancels the worker and discards pending changes.
pub struct AutosaveHandle {
    tx: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<SyncStatus>,
    cancel: CancellationToken,
    join: Option<JoinHandle<()>>,
}

impl AutosaveHandle {
    /// Stage blocks for the next write, restarting the debounce window
    pub fn stage(&self, blocks: Vec<Block>) {
        if blocks.is_empty() {
            return;
        }
        if self.tx.send(Command::Stage(blocks)).is_err() {
            warn!("Autosave worker stopped; staged blocks dropped");
        }
    }

    /// Stage blocks created in this session. Deleting one of them before it
    /// has been saved cancels its write instead of queueing a remote delete.
    pub fn stage_new(&self, blocks: Vec<Block>) {
        if blocks.is_empty() {
            return;
        }
        if self.tx.send(Command::StageNew(blocks)).is_err() {
            warn!("Autosave worker stopped; staged blocks dropped");
        }
    }

    /// Queue a block deletion, restarting the debounce window
    pub fn remove(&self, id: BlockId) {
        if self.tx.send(Command::Remove(id)).is_err() {
            warn!("Autosave worker stopped; deletion dropped");
        }
    }

    /// Write pending changes now and wait for the outcome
    pub async fn flush(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Command::Flush(reply_tx))
            .map_err(|_| Error::AutosaveStopped)?;
        reply_rx.await.map_err(|_| Error::AutosaveStopped)?
    }

    /// Current status
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    /// Subscribe to status changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status.clone()
    }

    /// Cancel the worker. Pending changes are discarded; a write already in
    /// flight is allowed to finish.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// True once the worker has been cancelled
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancel and wait for the worker to exit
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }
}

impl Drop for AutosaveHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct Worker {
    canvas_id: String,
    store: Arc<dyn CanvasStore>,
    debounce: Duration,
    pending: PendingChanges,
    status: watch::Sender<SyncStatus>,
}

impl Worker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>, cancel: CancellationToken) {
        debug!(canvas_id = %self.canvas_id, "Autosave worker started");
        let mut deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    if !self.pending.is_empty() {
                        info!(canvas_id = %self.canvas_id, "Autosave cancelled with unsaved changes");
                    }
                    break;
                }

                cmd = rx.recv() => match cmd {
                    Some(Command::Stage(blocks)) => {
                        self.pending.stage(blocks);
                        deadline = Some(Instant::now() + self.debounce);
                        self.set_status(SyncStatus::Pending);
                    }
                    Some(Command::StageNew(blocks)) => {
                        self.pending.stage_new(blocks);
                        deadline = Some(Instant::now() + self.debounce);
                        self.set_status(SyncStatus::Pending);
                    }
                    Some(Command::Remove(id)) => {
                        self.pending.remove(id);
                        deadline = Some(Instant::now() + self.debounce);
                        self.set_status(SyncStatus::Pending);
                    }
                    Some(Command::Flush(reply)) => {
                        deadline = None;
                        let result = self.flush().await;
                        let _ = reply.send(result);
                    }
                    None => break,
                },

                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    deadline = None;
                    // Failure is already reported through the status channel.
                    let _ = self.flush().await;
                }
            }
        }

        debug!(canvas_id = %self.canvas_id, "Autosave worker stopped");
    }

    async fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            if *self.status.borrow() == SyncStatus::Pending {
                self.set_status(SyncStatus::Saved { at: Utc::now() });
            }
            return Ok(());
        }

        let (blocks, deletions) = self.pending.take();
        self.set_status(SyncStatus::Saving);
        debug!(
            canvas_id = %self.canvas_id,
            blocks = blocks.len(),
            deletions = deletions.len(),
            "Flushing canvas changes"
        );

        let result = self.write(blocks, deletions).await;
        match &result {
            Ok(()) => self.set_status(SyncStatus::Saved { at: Utc::now() }),
            Err(e) => {
                warn!(canvas_id = %self.canvas_id, error = %e, "Autosave write failed");
                self.set_status(SyncStatus::Failed {
                    message: e.user_message(),
                });
            }
        }
        result
    }

    /// Write one batch. On failure everything not yet accepted by the store
    /// goes back into the pending set for the next flush or edit.
    async fn write(&mut self, blocks: Vec<Block>, deletions: Vec<BlockId>) -> Result<()> {
        if !blocks.is_empty() {
            if let Err(e) = self.store.save_blocks(&self.canvas_id, &blocks).await {
                self.pending.restore(blocks, deletions);
                return Err(e);
            }
            self.pending.saved(&blocks);
        }

        for (index, id) in deletions.iter().enumerate() {
            if let Err(e) = self.store.delete_block(&self.canvas_id, id).await {
                self.pending.restore(Vec::new(), deletions[index..].to_vec());
                return Err(e);
            }
        }
        Ok(())
    }

    fn set_status(&self, status: SyncStatus) {
        self.status.send_replace(status);
    }
}
