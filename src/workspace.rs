//! Client wiring for one signed-in user

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use nbuddy_canvas::{
    BlockGenerator, CanvasEditor, CanvasStore, CanvasSync, FileStore, LocalMirror,
};
use nbuddy_remote::{HttpCanvasStore, HttpGenerationClient, SearchHit, DEFAULT_TOP_K};

use crate::config::AppConfig;

/// Everything a UI needs to list, open and edit a user's canvases
#[derive(Clone)]
pub struct Workspace {
    user_id: String,
    store: Arc<HttpCanvasStore>,
    sync: CanvasSync,
    generator: BlockGenerator,
    debounce: Duration,
}

impl Workspace {
    /// Build the clients and open the file-backed mirror
    pub fn connect(config: &AppConfig, user_id: &str) -> Result<Self> {
        let dir = config.mirror.resolve_dir();
        let files = FileStore::open(dir.clone())
            .with_context(|| format!("Failed to open local mirror at {}", dir.display()))?;
        Self::with_mirror(config, user_id, LocalMirror::new(Arc::new(files)))
    }

    /// Build the clients around an existing mirror
    pub fn with_mirror(config: &AppConfig, user_id: &str, mirror: LocalMirror) -> Result<Self> {
        let store = Arc::new(
            HttpCanvasStore::new(&config.api.client_config(), user_id)
                .context("Failed to create canvas store client")?,
        );
        let generation = HttpGenerationClient::new(
            &config.generation.client_config(&config.api),
            Some(user_id.to_string()),
        )
        .context("Failed to create generation client")?;

        let generator = BlockGenerator::new(Arc::new(generation))
            .with_max_upload_bytes(config.generation.max_upload_bytes);
        let sync = CanvasSync::new(store.clone() as Arc<dyn CanvasStore>, mirror);

        info!(user_id, base_url = %config.api.base_url, "Workspace ready");

        Ok(Self {
            user_id: user_id.to_string(),
            store,
            sync,
            generator,
            debounce: config.autosave.debounce(),
        })
    }

    /// User the clients act for
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Canvas listing and CRUD
    #[must_use]
    pub fn sync(&self) -> &CanvasSync {
        &self.sync
    }

    /// AI generation adapter
    #[must_use]
    pub fn generator(&self) -> &BlockGenerator {
        &self.generator
    }

    /// Load a canvas and start an editing session on it
    pub async fn open_editor(&self, canvas_id: &str) -> nbuddy_canvas::Result<CanvasEditor> {
        let canvas = self.sync.open_canvas(canvas_id).await?.value;
        Ok(CanvasEditor::open(
            canvas,
            self.sync.mirror().clone(),
            self.sync.store(),
            self.debounce,
        ))
    }

    /// Search the blocks of one canvas
    pub async fn search(&self, canvas_id: &str, query: &str) -> nbuddy_canvas::Result<Vec<SearchHit>> {
        Ok(self
            .store
            .search_blocks(canvas_id, query, DEFAULT_TOP_K)
            .await?)
    }
}
