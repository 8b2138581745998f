//! HTTP generation client
//!
//! Uploads go to `/upload` as multipart form data; generation is requested
//! from `/generate-text-blocks` with the server-side path of the upload.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use nbuddy_canvas::{GeneratedContent, GenerationService, Segment, UploadFile, UploadedFile};

use crate::client::{ApiConfig, HttpClient};
use crate::error::{Error, Result};

/// Default generation timeout. Generation runs a model over the whole
/// document and is much slower than canvas requests.
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    file_path: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    file_path: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    instructions: &'a str,
}

/// Interpret the generation payload.
///
/// The service answers with `{blocks: [...]}`, a bare list of segments, or
/// one markdown string.
fn parse_generated(data: Value) -> Result<GeneratedContent> {
    let segments = match data {
        Value::String(markdown) => return Ok(GeneratedContent::Markdown(markdown)),
        Value::Object(mut map) => match map.remove("blocks") {
            Some(Value::String(markdown)) => return Ok(GeneratedContent::Markdown(markdown)),
            Some(blocks) => blocks,
            None => {
                return Err(Error::InvalidResponse(
                    "generation payload has no blocks".to_string(),
                ))
            }
        },
        list @ Value::Array(_) => list,
        other => {
            return Err(Error::InvalidResponse(format!(
                "unexpected generation payload: {other}"
            )))
        }
    };

    let segments: Vec<Segment> = serde_json::from_value(segments)
        .map_err(|e| Error::InvalidResponse(format!("invalid segments: {e}")))?;
    Ok(GeneratedContent::Segments(segments))
}

/// [`GenerationService`] backed by the Notebook Buddy HTTP API
#[derive(Debug, Clone)]
pub struct HttpGenerationClient {
    http: HttpClient,
}

impl HttpGenerationClient {
    /// Create a client. The user id is optional for generation.
    pub fn new(config: &ApiConfig, user_id: Option<String>) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new(config, user_id)?,
        })
    }

    async fn upload_inner(&self, file: &UploadFile) -> Result<UploadedFile> {
        let part = Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str("application/pdf")
            .map_err(|e| Error::Network(e.to_string()))?;
        let form = Form::new().part("file", part);

        let request = self.http.request(Method::POST, "upload").multipart(form);
        let response: UploadResponse = self.http.send_json(request).await?;

        match (response.status.as_deref(), response.file_path) {
            (None | Some("success"), Some(path)) if !path.trim().is_empty() => {
                debug!(path = %path, "Upload stored");
                Ok(UploadedFile { path })
            }
            (None | Some("success"), _) => Err(Error::InvalidResponse(
                "upload response has no file path".to_string(),
            )),
            (Some(status), _) => Err(Error::InvalidResponse(format!(
                "upload status {status}: {}",
                response.message.unwrap_or_default()
            ))),
        }
    }

    async fn generate_inner(
        &self,
        file: &UploadedFile,
        instructions: &str,
    ) -> Result<GeneratedContent> {
        let request = self
            .http
            .request(Method::POST, "generate-text-blocks")
            .json(&GenerateRequest {
                file_path: &file.path,
                instructions,
            });
        let data: Value = self.http.fetch(request).await?;
        parse_generated(data)
    }
}

#[async_trait]
impl GenerationService for HttpGenerationClient {
    #[instrument(skip(self, file), fields(file_name = %file.file_name, size = file.size()))]
    async fn upload(&self, file: &UploadFile) -> nbuddy_canvas::Result<UploadedFile> {
        Ok(self.upload_inner(file).await?)
    }

    #[instrument(skip(self, instructions), fields(path = %file.path))]
    async fn generate(
        &self,
        file: &UploadedFile,
        instructions: &str,
    ) -> nbuddy_canvas::Result<GeneratedContent> {
        Ok(self.generate_inner(file, instructions).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer) -> HttpGenerationClient {
        HttpGenerationClient::new(&ApiConfig::new(server.base_url()), Some("user-1".into()))
            .unwrap()
    }

    #[test]
    fn test_parse_generated_shapes() {
        let parsed = parse_generated(json!({"blocks": [{"title": "# A", "content": "x"}]})).unwrap();
        assert_eq!(
            parsed,
            GeneratedContent::Segments(vec![Segment {
                title: "# A".into(),
                content: "x".into()
            }])
        );

        let parsed = parse_generated(json!([{"title": "B"}])).unwrap();
        assert!(matches!(parsed, GeneratedContent::Segments(s) if s[0].content.is_empty()));

        let parsed = parse_generated(json!("# Notes\nbody")).unwrap();
        assert_eq!(parsed, GeneratedContent::Markdown("# Notes\nbody".into()));

        assert!(parse_generated(json!({"text": "no blocks"})).is_err());
        assert!(parse_generated(json!(42)).is_err());
        assert!(parse_generated(json!({"blocks": [1, 2]})).is_err());
    }

    #[tokio::test]
    async fn test_upload_sends_multipart() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/upload")
                    .header_exists("content-type")
                    .body_contains("name=\"file\"")
                    .body_contains("filename=\"notes.pdf\"");
                then.status(200).json_body(json!({
                    "status": "success",
                    "filePath": "uploads/notes.pdf"
                }));
            })
            .await;

        let file = UploadFile::new("notes.pdf", b"%PDF-1.4".to_vec());
        let uploaded = client(&server).upload(&file).await.unwrap();
        mock.assert_async().await;
        assert_eq!(uploaded.path, "uploads/notes.pdf");
    }

    #[tokio::test]
    async fn test_upload_rejected_by_server() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/upload");
                then.status(400)
                    .json_body(json!({"detail": "Only PDF files are allowed"}));
            })
            .await;

        let file = UploadFile::new("notes.pdf", b"%PDF-1.4".to_vec());
        let err = client(&server).upload(&file).await.unwrap_err();
        assert_eq!(err.code(), "http_error");
        assert!(err.to_string().contains("Only PDF files are allowed"));
    }

    #[tokio::test]
    async fn test_generate_segments() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/generate-text-blocks")
                    .json_body(json!({"file_path": "uploads/notes.pdf", "instructions": "summarize"}));
                then.status(200).json_body(json!({
                    "status": "success",
                    "data": {"blocks": [
                        {"title": "# Intro", "content": "hello"},
                        {"title": "Details", "content": "more"}
                    ]}
                }));
            })
            .await;

        let uploaded = UploadedFile {
            path: "uploads/notes.pdf".into(),
        };
        let content = client(&server).generate(&uploaded, "summarize").await.unwrap();
        mock.assert_async().await;
        match content {
            GeneratedContent::Segments(segments) => {
                assert_eq!(segments.len(), 2);
                assert_eq!(segments[1].title, "Details");
            }
            other => panic!("unexpected content: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_generate_without_instructions_omits_field() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/generate-text-blocks")
                    .json_body(json!({"file_path": "a.pdf"}));
                then.status(200)
                    .json_body(json!({"status": "success", "data": "# Title\ntext"}));
            })
            .await;

        let uploaded = UploadedFile {
            path: "a.pdf".into(),
        };
        let content = client(&server).generate(&uploaded, "").await.unwrap();
        assert_eq!(content, GeneratedContent::Markdown("# Title\ntext".into()));
    }

    #[tokio::test]
    async fn test_generate_garbage_is_malformed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/generate-text-blocks");
                then.status(200).body("<html>oops</html>");
            })
            .await;

        let uploaded = UploadedFile {
            path: "a.pdf".into(),
        };
        let err = client(&server).generate(&uploaded, "").await.unwrap_err();
        assert_eq!(err.code(), "malformed_response");
    }
}
