//! HTTP canvas store
//!
//! Canvas records live under `/projects`; their text blocks are stored as
//! records of the `notecrafts` text store, one namespace per canvas.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use nbuddy_canvas::{Block, BlockId, Canvas, CanvasStore};

use crate::client::{parse_timestamp, ApiConfig, HttpClient};
use crate::error::{Error, Result};

/// Default number of search hits
pub const DEFAULT_TOP_K: usize = 10;

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Serialize)]
struct CanvasRequest<'a> {
    #[serde(rename = "userId")]
    user_id: &'a str,
    canvas: &'a Canvas,
}

/// Canvas as stored by the backend. Older records use `projectId`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectRecord {
    #[serde(alias = "projectId")]
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    edited_at: Option<String>,
    #[serde(default)]
    blocks: Vec<Block>,
}

impl From<ProjectRecord> for Canvas {
    fn from(record: ProjectRecord) -> Self {
        Canvas {
            id: record.id,
            title: record
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "Untitled".to_string()),
            edited_at: record
                .edited_at
                .as_deref()
                .and_then(parse_timestamp)
                .unwrap_or_else(Utc::now),
            blocks: record.blocks,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    canvas_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    order: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TextRecord {
    #[serde(alias = "_id")]
    id: BlockId,
    #[serde(default)]
    content: String,
    #[serde(default)]
    metadata: RecordMetadata,
}

impl TextRecord {
    fn from_block(canvas_id: &str, block: &Block) -> Self {
        Self {
            id: block.id.clone(),
            content: block.content.clone(),
            metadata: RecordMetadata {
                canvas_id: Some(canvas_id.to_string()),
                order: Some(block.order),
                updated_at: Some(block.updated_at.to_rfc3339()),
            },
        }
    }

    fn into_block(self, fallback_order: usize) -> Block {
        Block {
            id: self.id,
            content: self.content,
            order: self.metadata.order.unwrap_or(fallback_order),
            updated_at: self
                .metadata
                .updated_at
                .as_deref()
                .and_then(parse_timestamp)
                .unwrap_or_else(Utc::now),
        }
    }
}

#[derive(Debug, Serialize)]
struct SaveTextRequest<'a> {
    records: Vec<TextRecord>,
    namespace: &'a str,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    text_query: &'a str,
    top_k: usize,
    namespace: &'a str,
}

/// One text search result
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchHit {
    /// Matching block
    #[serde(alias = "_id")]
    pub id: BlockId,
    /// Relevance score, higher is better
    #[serde(default, alias = "_score")]
    pub score: f32,
}

// ============================================================================
// Store Implementation
// ============================================================================

/// [`CanvasStore`] backed by the Notebook Buddy HTTP API
#[derive(Debug, Clone)]
pub struct HttpCanvasStore {
    http: HttpClient,
    user_id: String,
}

impl HttpCanvasStore {
    /// Create a store acting for one user
    pub fn new(config: &ApiConfig, user_id: impl Into<String>) -> Result<Self> {
        let user_id = user_id.into();
        if user_id.trim().is_empty() {
            return Err(Error::NotConfigured("user id is empty".to_string()));
        }
        let http = HttpClient::new(config, Some(user_id.clone()))?;
        Ok(Self { http, user_id })
    }

    /// User this store acts for
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Full-text search over a canvas's blocks
    #[instrument(skip(self), fields(base_url = %self.http.base_url()))]
    pub async fn search_blocks(
        &self,
        canvas_id: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let request = self
            .http
            .request(Method::POST, "notecrafts/search-texts")
            .json(&SearchRequest {
                text_query: query,
                top_k: top_k.max(1),
                namespace: canvas_id,
            });
        let hits: Vec<SearchHit> = self.http.fetch(request).await?;
        debug!(hits = hits.len(), "Search completed");
        Ok(hits)
    }

    async fn list_canvases_inner(&self) -> Result<Vec<Canvas>> {
        let path = format!("projects/{}", self.user_id);
        let records: Vec<ProjectRecord> =
            self.http.fetch(self.http.request(Method::GET, &path)).await?;
        Ok(records.into_iter().map(Canvas::from).collect())
    }

    async fn write_canvas(&self, method: Method, path: &str, canvas: &Canvas) -> Result<()> {
        let request = self.http.request(method, path).json(&CanvasRequest {
            user_id: &self.user_id,
            canvas,
        });
        self.http.execute(request).await
    }

    async fn list_blocks_inner(&self, canvas_id: &str) -> Result<Vec<Block>> {
        let request = self
            .http
            .request(Method::GET, "notecrafts/list-texts")
            .query(&[("namespace", canvas_id)]);
        let records: Vec<TextRecord> = self.http.fetch(request).await?;
        Ok(records
            .into_iter()
            .enumerate()
            .map(|(index, record)| record.into_block(index))
            .collect())
    }

    async fn save_blocks_inner(&self, canvas_id: &str, blocks: &[Block]) -> Result<()> {
        let records = blocks
            .iter()
            .map(|b| TextRecord::from_block(canvas_id, b))
            .collect();
        let request = self
            .http
            .request(Method::POST, "notecrafts/save-text")
            .json(&SaveTextRequest {
                records,
                namespace: canvas_id,
            });
        self.http.execute(request).await
    }

    async fn delete_block_inner(&self, canvas_id: &str, block_id: &BlockId) -> Result<()> {
        let path = format!("notecrafts/delete-text/{block_id}");
        let request = self
            .http
            .request(Method::DELETE, &path)
            .query(&[("namespace", canvas_id)]);
        self.http.execute(request).await
    }
}

#[async_trait]
impl CanvasStore for HttpCanvasStore {
    #[instrument(skip(self), fields(user_id = %self.user_id))]
    async fn list_canvases(&self) -> nbuddy_canvas::Result<Vec<Canvas>> {
        Ok(self.list_canvases_inner().await?)
    }

    #[instrument(skip(self, canvas), fields(canvas_id = %canvas.id))]
    async fn create_canvas(&self, canvas: &Canvas) -> nbuddy_canvas::Result<()> {
        Ok(self
            .write_canvas(Method::POST, "projects/create", canvas)
            .await?)
    }

    #[instrument(skip(self, canvas), fields(canvas_id = %canvas.id))]
    async fn update_canvas(&self, canvas: &Canvas) -> nbuddy_canvas::Result<()> {
        let path = format!("projects/{}", canvas.id);
        Ok(self.write_canvas(Method::PUT, &path, canvas).await?)
    }

    #[instrument(skip(self))]
    async fn delete_canvas(&self, canvas_id: &str) -> nbuddy_canvas::Result<()> {
        let path = format!("projects/{canvas_id}");
        Ok(self
            .http
            .execute(self.http.request(Method::DELETE, &path))
            .await?)
    }

    #[instrument(skip(self))]
    async fn list_blocks(&self, canvas_id: &str) -> nbuddy_canvas::Result<Vec<Block>> {
        Ok(self.list_blocks_inner(canvas_id).await?)
    }

    #[instrument(skip(self, blocks), fields(blocks = blocks.len()))]
    async fn save_blocks(&self, canvas_id: &str, blocks: &[Block]) -> nbuddy_canvas::Result<()> {
        if blocks.is_empty() {
            return Ok(());
        }
        Ok(self.save_blocks_inner(canvas_id, blocks).await?)
    }

    #[instrument(skip(self))]
    async fn delete_block(&self, canvas_id: &str, block_id: &BlockId) -> nbuddy_canvas::Result<()> {
        Ok(self.delete_block_inner(canvas_id, block_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn store(server: &MockServer) -> HttpCanvasStore {
        HttpCanvasStore::new(&ApiConfig::new(server.base_url()), "user-1").unwrap()
    }

    #[tokio::test]
    async fn test_list_canvases() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/projects/user-1")
                    .header("X-User-ID", "user-1");
                then.status(200).json_body(json!({
                    "status": "success",
                    "data": [
                        {"id": "c1", "title": "Biology", "editedAt": "2025-02-10T23:29:37.000Z", "blocks": []},
                        {"projectId": "c2", "title": "", "blocks": [{"id": 17, "content": "x", "order": 0}]}
                    ]
                }));
            })
            .await;

        let canvases = store(&server).list_canvases().await.unwrap();
        mock.assert_async().await;
        assert_eq!(canvases.len(), 2);
        assert_eq!(canvases[0].title, "Biology");
        assert_eq!(canvases[1].id, "c2");
        assert_eq!(canvases[1].title, "Untitled");
        assert_eq!(canvases[1].blocks[0].id.as_str(), "17");
    }

    #[tokio::test]
    async fn test_non_success_status_is_http_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/projects/user-1");
                then.status(500).json_body(json!({
                    "detail": "Failed to fetch projects: boom\nTraceback (most recent call last)"
                }));
            })
            .await;

        let err = store(&server).list_canvases().await.unwrap_err();
        match err {
            nbuddy_canvas::Error::Http { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "Failed to fetch projects: boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_payload() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/projects/user-1");
                then.status(200)
                    .json_body(json!({"status": "success", "data": {"not": "a list"}}));
            })
            .await;

        let err = store(&server).list_canvases().await.unwrap_err();
        assert_eq!(err.code(), "malformed_response");
    }

    #[tokio::test]
    async fn test_error_status_in_envelope() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/notecrafts/list-texts");
                then.status(200)
                    .json_body(json!({"status": "error", "message": "index not found"}));
            })
            .await;

        let err = store(&server).list_blocks("c1").await.unwrap_err();
        assert_eq!(err.code(), "malformed_response");
    }

    #[tokio::test]
    async fn test_list_blocks_reads_records() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/notecrafts/list-texts")
                    .query_param("namespace", "c1");
                then.status(200).json_body(json!({
                    "status": "success",
                    "records": [
                        {"id": "b2", "content": "second", "metadata": {"order": 1, "userId": "user-1"}},
                        {"id": "b1", "content": "first", "metadata": {"order": 0, "updatedAt": "2025-02-10T10:00:00Z"}},
                        {"id": "b3", "content": "legacy"}
                    ]
                }));
            })
            .await;

        let blocks = store(&server).list_blocks("c1").await.unwrap();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].order, 1);
        assert_eq!(blocks[1].order, 0);
        assert_eq!(blocks[2].order, 2);
        assert_eq!(
            blocks[1].updated_at,
            parse_timestamp("2025-02-10T10:00:00Z").unwrap()
        );
    }

    #[tokio::test]
    async fn test_save_blocks_sends_one_batch() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/notecrafts/save-text")
                    .header("X-User-ID", "user-1")
                    .json_body_partial(r#"{"namespace": "c1"}"#)
                    .body_contains("\"canvasId\":\"c1\"")
                    .body_contains("\"content\":\"hello\"")
                    .body_contains("\"content\":\"world\"");
                then.status(200).json_body(json!({
                    "status": "success",
                    "message": "Text saved to vector store successfully"
                }));
            })
            .await;

        let blocks = vec![
            Block::with_id("b1", "hello").at(0),
            Block::with_id("b2", "world").at(1),
        ];
        store(&server).save_blocks("c1", &blocks).await.unwrap();
        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_empty_save_skips_request() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/notecrafts/save-text");
                then.status(200).json_body(json!({"status": "success"}));
            })
            .await;

        store(&server).save_blocks("c1", &[]).await.unwrap();
        mock.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn test_delete_block() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(DELETE)
                    .path("/notecrafts/delete-text/b9")
                    .query_param("namespace", "c1");
                then.status(200).json_body(json!({"status": "success"}));
            })
            .await;

        store(&server)
            .delete_block("c1", &BlockId::from("b9"))
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_update_delete_canvas() {
        let server = MockServer::start_async().await;
        let create = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/projects/create")
                    .json_body_partial(r#"{"userId": "user-1", "canvas": {"id": "c1", "title": "Physics"}}"#);
                then.status(200)
                    .json_body(json!({"status": "success", "data": {"project": {}}}));
            })
            .await;
        let update = server
            .mock_async(|when, then| {
                when.method(PUT).path("/projects/c1");
                then.status(200).json_body(json!({"status": "success"}));
            })
            .await;
        let delete = server
            .mock_async(|when, then| {
                when.method(DELETE).path("/projects/c1");
                then.status(200).json_body(json!({"status": "success"}));
            })
            .await;

        let store = store(&server);
        let canvas = Canvas::new("Physics").with_id("c1");
        store.create_canvas(&canvas).await.unwrap();
        store.update_canvas(&canvas).await.unwrap();
        store.delete_canvas("c1").await.unwrap();

        create.assert_async().await;
        update.assert_async().await;
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn test_search_blocks() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/notecrafts/search-texts")
                    .json_body(json!({"text_query": "cells", "top_k": 5, "namespace": "c1"}));
                then.status(200).json_body(json!({
                    "status": "success",
                    "results": [{"_id": "b1", "_score": 0.92}, {"id": "b4", "score": 0.4}]
                }));
            })
            .await;

        let hits = store(&server).search_blocks("c1", " cells ", 5).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id.as_str(), "b1");
        assert!(hits[0].score > hits[1].score);

        assert!(store(&server).search_blocks("c1", "  ", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let config = ApiConfig::new("http://127.0.0.1:9").with_timeout(std::time::Duration::from_secs(2));
        let store = HttpCanvasStore::new(&config, "user-1").unwrap();
        let err = store.list_canvases().await.unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_empty_user_rejected() {
        let err = HttpCanvasStore::new(&ApiConfig::default(), " ").unwrap_err();
        assert!(matches!(err, Error::NotConfigured(_)));
    }
}
