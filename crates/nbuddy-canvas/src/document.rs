//! Canvas Document Types
//!
//! A canvas is a user document made of ordered markdown blocks. The wire form
//! uses camelCase field names (`editedAt`, `updatedAt`) to match the backend.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Identifier of a block, unique within its canvas.
///
/// Generated client-side. Older clients produced numeric ids, so the wire
/// form accepts either a JSON string or a JSON number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    /// Generate a fresh random id
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the id as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for BlockId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<u64> for BlockId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for BlockId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Self(s),
            Raw::Number(n) => Self(n.to_string()),
        })
    }
}

/// One ordered, independently editable markdown unit within a canvas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Unique block ID
    pub id: BlockId,

    /// Markdown content
    #[serde(default)]
    pub content: String,

    /// Zero-based position within the canvas
    #[serde(default)]
    pub order: usize,

    /// When the block was last changed locally (content or position)
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Block {
    /// Create a new block with a fresh id
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self::with_id(BlockId::generate(), content)
    }

    /// Create a block with a specific id
    #[must_use]
    pub fn with_id(id: impl Into<BlockId>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            order: 0,
            updated_at: Utc::now(),
        }
    }

    /// Set the order index
    #[must_use]
    pub fn at(mut self, order: usize) -> Self {
        self.order = order;
        self
    }
}

/// A user document composed of an ordered list of blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Canvas {
    /// Unique identifier
    pub id: String,

    /// Canvas title
    pub title: String,

    /// When the canvas was last edited
    #[serde(default = "Utc::now")]
    pub edited_at: DateTime<Utc>,

    /// Ordered list of blocks
    #[serde(default)]
    pub blocks: Vec<Block>,
}

impl Canvas {
    /// Create a new empty canvas
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            edited_at: Utc::now(),
            blocks: Vec::new(),
        }
    }

    /// Create with a specific ID
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Seed the canvas with a single heading block carrying the title
    #[must_use]
    pub fn with_placeholder_block(mut self) -> Self {
        let heading = format!("# {}", self.title);
        self.blocks = vec![Block::new(heading)];
        self
    }

    /// Mark the canvas as edited now
    pub fn touch(&mut self) {
        self.edited_at = Utc::now();
    }

    /// Get a block by ID
    #[must_use]
    pub fn get_block(&self, block_id: &BlockId) -> Option<&Block> {
        self.blocks.iter().find(|b| &b.id == block_id)
    }

    /// Summary used by canvas listings
    #[must_use]
    pub fn summary(&self) -> CanvasSummary {
        CanvasSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            edited_at: self.edited_at,
            block_count: self.blocks.len(),
        }
    }
}

/// Summary of a canvas for listing
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasSummary {
    /// Canvas ID
    pub id: String,
    /// Canvas title
    pub title: String,
    /// When the canvas was last edited
    pub edited_at: DateTime<Utc>,
    /// Number of blocks
    pub block_count: usize,
}
