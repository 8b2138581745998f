//! Notebook Buddy - client core for canvas notebooks
//!
//! Wires the canvas core (`nbuddy-canvas`) to the HTTP backend
//! (`nbuddy-remote`) from layered configuration:
//! - Config: Embedded defaults, config files and `NBUDDY_*` environment overrides
//! - Logging: tracing subscriber setup
//! - Workspace: Store, mirror, sync and generator for one user
//!
//! ## Usage
//!
//! ```ignore
//! let config = notebook_buddy::load_config()?;
//! let _guard = notebook_buddy::init_logging(&config.logging)?;
//!
//! let workspace = notebook_buddy::Workspace::connect(&config, "user-1")?;
//! let canvases = workspace.sync().load_canvases().await?;
//! let mut editor = workspace.open_editor(&canvases.value[0].id).await?;
//! editor.insert(None, "## New section")?;
//! editor.close().await;
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod logging;
pub mod workspace;

pub use config::{load_config, parse_config, AppConfig};
pub use logging::init_logging;
pub use workspace::Workspace;

pub use nbuddy_canvas as canvas;
pub use nbuddy_remote as remote;
