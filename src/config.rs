//! Configuration
//!
//! Loaded from embedded defaults, optional files and the environment.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use nbuddy_canvas::MAX_UPLOAD_BYTES;
use nbuddy_remote::{ApiConfig, DEFAULT_BASE_URL};

/// Embedded default configuration (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Environment variable prefix, e.g. `NBUDDY_API__BASE_URL`
pub const ENV_PREFIX: &str = "NBUDDY";

/// Environment variable selecting `config/{env}.toml`
pub const ENV_SELECTOR: &str = "NBUDDY_ENV";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiSection,
    #[serde(default)]
    pub generation: GenerationSection,
    #[serde(default)]
    pub autosave: AutosaveSection,
    #[serde(default)]
    pub mirror: MirrorSection,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Canvas store backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_timeout")]
    pub timeout_secs: u64,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_api_timeout(),
        }
    }
}

impl ApiSection {
    /// Client settings for the canvas store
    #[must_use]
    pub fn client_config(&self) -> ApiConfig {
        ApiConfig::new(self.base_url.clone()).with_timeout(Duration::from_secs(self.timeout_secs))
    }
}

/// AI generation service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSection {
    /// Separate base URL; the canvas store URL is used when unset
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

impl Default for GenerationSection {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: default_generation_timeout(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl GenerationSection {
    /// Client settings for the generation service
    #[must_use]
    pub fn client_config(&self, api: &ApiSection) -> ApiConfig {
        let base_url = self
            .base_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| api.base_url.clone());
        ApiConfig::new(base_url).with_timeout(Duration::from_secs(self.timeout_secs))
    }
}

/// Debounced persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutosaveSection {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for AutosaveSection {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl AutosaveSection {
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Local mirror location
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MirrorSection {
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl MirrorSection {
    /// Configured directory, or `<data dir>/notebook-buddy`
    #[must_use]
    pub fn resolve_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("notebook-buddy")
        })
    }
}

/// Logging output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
    /// Write daily-rotated log files here instead of stderr
    #[serde(default)]
    pub file_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
            file_dir: None,
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_api_timeout() -> u64 {
    30
}

fn default_generation_timeout() -> u64 {
    120
}

fn default_max_upload_bytes() -> u64 {
    MAX_UPLOAD_BYTES
}

fn default_debounce_ms() -> u64 {
    2000
}

fn default_filter() -> String {
    "notebook_buddy=info,nbuddy_canvas=info,nbuddy_remote=info".to_string()
}

/// Load configuration from files and environment
pub fn load_config() -> Result<AppConfig> {
    let _ = dotenvy::dotenv();

    let config = Config::builder()
        // 1. Embedded defaults
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        // 2. Optional overrides
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            File::with_name(&format!(
                "config/{}",
                std::env::var(ENV_SELECTOR).unwrap_or_else(|_| "development".to_string())
            ))
            .required(false),
        )
        .add_source(File::with_name("config/local").required(false))
        // 3. Environment variables (NBUDDY_API__BASE_URL)
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}

/// Parse configuration from embedded defaults plus one TOML overlay
pub fn parse_config(overlay: &str) -> Result<AppConfig> {
    Config::builder()
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        .add_source(File::from_str(overlay, FileFormat::Toml))
        .build()
        .context("Failed to build configuration")?
        .try_deserialize()
        .context("Failed to deserialize configuration")
}
