//! AI generation adapter
//!
//! Uploads a document to the generation service, asks it to produce notes
//! and turns the answer into new canvas blocks. Input is validated before any
//! network call. A failed or malformed response leaves the canvas untouched:
//! blocks are only inserted once the whole answer has been mapped.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::document::BlockId;
use crate::editor::CanvasEditor;
use crate::error::{Error, Result};
use crate::toc::parse_heading;

/// Upload size limit accepted by the backend (10 MB)
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// A file selected by the user for generation
#[derive(Debug, Clone)]
pub struct UploadFile {
    /// Original file name, including extension
    pub file_name: String,
    /// File contents
    pub bytes: Vec<u8>,
}

impl UploadFile {
    /// Create from in-memory contents
    #[must_use]
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Read a file from disk
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::validation("File name is not valid UTF-8."))?
            .to_string();
        let bytes = tokio::fs::read(path).await?;
        Ok(Self { file_name, bytes })
    }

    /// Size in bytes
    #[must_use]
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Reference to a file accepted by the upload endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    /// Server-side path of the stored file
    pub path: String,
}

/// One titled section produced by the generation service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Section title, usually already a markdown heading
    #[serde(default)]
    pub title: String,
    /// Section body in markdown
    #[serde(default)]
    pub content: String,
}

/// Answer of the generation service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedContent {
    /// Structured list of titled segments
    Segments(Vec<Segment>),
    /// One markdown document, split at headings
    Markdown(String),
}

/// External generation service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Upload a file for later generation
    async fn upload(&self, file: &UploadFile) -> Result<UploadedFile>;

    /// Generate content from an uploaded file
    async fn generate(&self, file: &UploadedFile, instructions: &str) -> Result<GeneratedContent>;
}

/// Turns generation output into canvas blocks
#[derive(Clone)]
pub struct BlockGenerator {
    service: Arc<dyn GenerationService>,
    max_upload_bytes: u64,
}

impl BlockGenerator {
    /// Create with the default upload limit
    #[must_use]
    pub fn new(service: Arc<dyn GenerationService>) -> Self {
        Self {
            service,
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }

    /// Override the upload limit
    #[must_use]
    pub fn with_max_upload_bytes(mut self, limit: u64) -> Self {
        self.max_upload_bytes = limit;
        self
    }

    /// Check a file before any network call
    pub fn validate(&self, file: &UploadFile) -> Result<()> {
        if file.file_name.trim().is_empty() {
            return Err(Error::validation("Please choose a file."));
        }
        if file.bytes.is_empty() {
            return Err(Error::validation("The selected file is empty."));
        }
        if !file.file_name.to_lowercase().ends_with(".pdf") {
            return Err(Error::validation("Only PDF files are supported."));
        }
        if file.size() > self.max_upload_bytes {
            return Err(Error::FileTooLarge {
                size: file.size(),
                limit: self.max_upload_bytes,
            });
        }
        Ok(())
    }

    /// Upload, generate and map the answer to block contents
    pub async fn generate_contents(
        &self,
        file: &UploadFile,
        instructions: &str,
    ) -> Result<Vec<String>> {
        self.validate(file)?;

        let uploaded = self.service.upload(file).await?;
        info!(path = %uploaded.path, "Uploaded file for generation");

        let generated = self.service.generate(&uploaded, instructions.trim()).await?;
        let contents = match generated {
            GeneratedContent::Segments(segments) => segments_to_contents(&segments),
            GeneratedContent::Markdown(markdown) => split_markdown(&markdown),
        };

        if contents.is_empty() {
            warn!("Generation returned no usable content");
            return Err(Error::malformed("generation returned no content"));
        }
        Ok(contents)
    }

    /// Generate blocks and splice them into an open canvas.
    ///
    /// `position` is where the first new block goes (end when `None`).
    pub async fn generate_into(
        &self,
        editor: &mut CanvasEditor,
        position: Option<usize>,
        file: &UploadFile,
        instructions: &str,
    ) -> Result<Vec<BlockId>> {
        let contents = self.generate_contents(file, instructions).await?;
        let ids = editor.insert_many(position, contents)?;
        info!(canvas_id = editor.canvas_id(), blocks = ids.len(), "Inserted generated blocks");
        Ok(ids)
    }
}

/// Map titled segments to block contents.
///
/// A title that is not already a heading becomes a level-2 heading. Segments
/// with neither title nor content are dropped.
#[must_use]
pub fn segments_to_contents(segments: &[Segment]) -> Vec<String> {
    segments
        .iter()
        .filter_map(|segment| {
            let title = segment.title.trim();
            let content = segment.content.trim();
            let heading = match title {
                "" => None,
                t if t.starts_with('#') => Some(t.to_string()),
                t => Some(format!("## {t}")),
            };
            match (heading, content.is_empty()) {
                (None, true) => None,
                (None, false) => Some(content.to_string()),
                (Some(h), true) => Some(h),
                (Some(h), false) => Some(format!("{h}\n\n{content}")),
            }
        })
        .collect()
}

/// Split a markdown document into blocks at level 1-3 headings.
///
/// Text before the first heading forms its own block. Headings inside fenced
/// code blocks do not split. Blank chunks are dropped.
#[must_use]
pub fn split_markdown(markdown: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut in_fence = false;

    for line in markdown.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
        }
        if !in_fence && parse_heading(line).is_some() && !current.is_empty() {
            chunks.push(current.join("\n"));
            current.clear();
        }
        current.push(line);
    }
    if !current.is_empty() {
        chunks.push(current.join("\n"));
    }

    chunks
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}
