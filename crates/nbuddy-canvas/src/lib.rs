//! Notebook Buddy Canvas - canvas documents and their synchronization
//!
//! This crate provides the client-side core of Notebook Buddy:
//! - Document: Canvas and block types
//! - Blocks: Ordered block-list state manager (insert, move, update, delete)
//! - Toc: Table of contents derived from heading lines
//! - Mirror: Local key-value mirror of the user's canvases
//! - Store: Remote canvas store abstraction
//! - Reconcile: Network-then-cache loading and canvas CRUD
//! - Autosave: Debounced, cancellable persistence of edits
//! - Editor: Editing session binding all of the above for one canvas
//! - Generate: AI generation adapter producing new blocks
//! - Error: Error types for canvas operations
//!
//! ## Usage
//!
//! ```ignore
//! use nbuddy_canvas::{CanvasEditor, CanvasSync, LocalMirror, MemoryCanvasStore, Direction};
//! use std::{sync::Arc, time::Duration};
//!
//! let store = Arc::new(MemoryCanvasStore::new());
//! let sync = CanvasSync::new(store.clone(), LocalMirror::in_memory());
//!
//! let canvas = sync.create_canvas("Biology").await?.value;
//! let mut editor = CanvasEditor::open(canvas, sync.mirror().clone(), store, Duration::from_secs(2));
//! let id = editor.insert(None, "## Cells")?;
//! editor.move_block(&id, Direction::Up)?;
//! editor.flush().await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod autosave;
pub mod blocks;
pub mod document;
pub mod editor;
pub mod error;
pub mod generate;
pub mod mirror;
pub mod reconcile;
pub mod store;
pub mod toc;

// Re-export main types
pub use autosave::{AutosaveHandle, AutosaveTask, SyncStatus, DEFAULT_DEBOUNCE};
pub use blocks::{BlockList, Direction, ListChange};
pub use document::{Block, BlockId, Canvas, CanvasSummary};
pub use editor::CanvasEditor;
pub use error::{Error, Result};
pub use generate::{
    segments_to_contents, split_markdown, BlockGenerator, GeneratedContent, GenerationService,
    Segment, UploadFile, UploadedFile, MAX_UPLOAD_BYTES,
};
pub use mirror::{FileStore, KeyValueStore, LocalMirror, MemoryStore, MIRROR_KEY, UNSYNCED_KEY};
pub use reconcile::{CanvasSync, Source, Synced};
pub use store::{CanvasStore, MemoryCanvasStore};
pub use toc::{derive_toc, TocEntry};
