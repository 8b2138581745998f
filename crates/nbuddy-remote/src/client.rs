//! Shared HTTP plumbing
//!
//! Both backends answer with a `{status, data, message}` envelope (text-block
//! endpoints use `records` instead of `data`) and report failures either in
//! that envelope or as a FastAPI `{detail}` body with a non-success status.

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Header carrying the authenticated user id
pub const USER_ID_HEADER: &str = "X-User-ID";

/// Default base URL of the backend
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for a backend
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL, e.g. `http://localhost:8000/api`
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ApiConfig {
    /// Create a configuration for a base URL
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Set the timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Response envelope
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    status: Option<String>,
    #[serde(alias = "records", alias = "results")]
    data: Option<T>,
    message: Option<String>,
}

impl<T> Envelope<T> {
    /// Check the status field and return the payload, if any
    fn into_data(self) -> Result<Option<T>> {
        match self.status.as_deref() {
            None | Some("success") => Ok(self.data),
            Some(other) => Err(Error::InvalidResponse(format!(
                "status {other}: {}",
                sanitize_detail(self.message.as_deref().unwrap_or("no message"))
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(alias = "message")]
    detail: serde_json::Value,
}

/// Trim server error detail before it reaches logs or the UI.
///
/// The backend includes Python tracebacks and file paths in some error
/// messages.
pub(crate) fn sanitize_detail(detail: &str) -> String {
    let cut = ["Traceback", "Stack trace", "\n"]
        .iter()
        .filter_map(|marker| detail.find(marker))
        .min()
        .unwrap_or(detail.len());
    let detail = detail[..cut].trim();

    let lower = detail.to_lowercase();
    if lower.contains("/home/") || lower.contains("/var/") || lower.contains("\\users\\") {
        return "internal server error".to_string();
    }
    if detail.chars().count() > 200 {
        let short: String = detail.chars().take(200).collect();
        return format!("{short}...");
    }
    detail.to_string()
}

/// Parse a timestamp as written by either the browser (RFC 3339) or the
/// Python backend (`isoformat()` without offset, taken as UTC)
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

/// reqwest client bound to one backend
#[derive(Debug, Clone)]
pub(crate) struct HttpClient {
    client: Client,
    base_url: String,
    timeout: Duration,
    user_id: Option<String>,
}

impl HttpClient {
    pub(crate) fn new(config: &ApiConfig, user_id: Option<String>) -> Result<Self> {
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(Error::NotConfigured("base URL is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            timeout: config.timeout,
            user_id,
        })
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let builder = self.client.request(method, url);
        match &self.user_id {
            Some(user_id) => builder.header(USER_ID_HEADER, user_id),
            None => builder,
        }
    }

    /// Send a request and decode the raw JSON body
    pub(crate) async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let timeout_ms = self.timeout.as_millis() as u64;
        let response = request
            .send()
            .await
            .map_err(|e| Error::from_reqwest(&e, timeout_ms))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::from_reqwest(&e, timeout_ms))?;
        debug!(status = status.as_u16(), bytes = body.len(), "Received response");

        if !status.is_success() {
            let message = match serde_json::from_str::<ErrorBody>(&body) {
                Ok(ErrorBody {
                    detail: serde_json::Value::String(s),
                }) => sanitize_detail(&s),
                Ok(ErrorBody { detail }) => sanitize_detail(&detail.to_string()),
                Err(_) => status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string(),
            };
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| Error::InvalidResponse(e.to_string()))
    }

    /// Send a request and unwrap the envelope payload
    pub(crate) async fn send_envelope<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<Option<T>> {
        let envelope: Envelope<T> = self.send_json(request).await?;
        envelope.into_data()
    }

    /// Send a request whose envelope must carry a payload
    pub(crate) async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        self.send_envelope(request)
            .await?
            .ok_or_else(|| Error::InvalidResponse("response has no data".to_string()))
    }

    /// Send a request whose envelope payload is ignored
    pub(crate) async fn execute(&self, request: RequestBuilder) -> Result<()> {
        self.send_envelope::<serde_json::Value>(request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_cuts_traceback() {
        let detail = "Unexpected error: boom\nStack trace: File \"/srv/app.py\", line 3";
        assert_eq!(sanitize_detail(detail), "Unexpected error: boom");
    }

    #[test]
    fn test_sanitize_hides_paths_and_truncates() {
        assert_eq!(
            sanitize_detail("cannot open /home/app/uploads/x.pdf"),
            "internal server error"
        );
        let long = "x".repeat(500);
        assert_eq!(sanitize_detail(&long).chars().count(), 203);
    }

    #[test]
    fn test_envelope_status() {
        let ok: Envelope<Vec<u32>> =
            serde_json::from_str(r#"{"status":"success","data":[1,2]}"#).unwrap();
        assert_eq!(ok.into_data().unwrap(), Some(vec![1, 2]));

        let records: Envelope<Vec<u32>> =
            serde_json::from_str(r#"{"status":"success","records":[3]}"#).unwrap();
        assert_eq!(records.into_data().unwrap(), Some(vec![3]));

        let failed: Envelope<Vec<u32>> =
            serde_json::from_str(r#"{"status":"error","message":"index missing"}"#).unwrap();
        let err = failed.into_data().unwrap_err();
        assert!(err.to_string().contains("index missing"));
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2025-02-10T23:29:37.120Z").is_some());
        assert!(parse_timestamp("2025-02-10T23:29:37-05:00").is_some());
        assert!(parse_timestamp("2025-02-10T23:29:37.123456").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_empty_base_url_rejected() {
        let err = HttpClient::new(&ApiConfig::new("  "), None).unwrap_err();
        assert!(matches!(err, Error::NotConfigured(_)));
    }
}
