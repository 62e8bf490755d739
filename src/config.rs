//! Application configuration.
//!
//! Settings are read from `config.toml` in the application storage folder or
//! from an explicit file (TOML or JSON, picked by extension). Every field has
//! a default, so an empty or missing file yields a working configuration as
//! long as an API key can be found.

use std::path::{Path, PathBuf};
use std::time::Duration;

use llmapi::{LLMClient, LLMProvider};
use serde::{Deserialize, Serialize};

use crate::constants::{
    API_KEY_ENV, API_KEY_FILE, CONFIG_FILE, DEFAULT_IMAGE_EXTENSIONS, DEFAULT_MAX_TOKENS,
    DEFAULT_MODEL, DEFAULT_REQUEST_TIMEOUT_SECS,
};
use crate::error::ConfigError;
use crate::services::response_parser::SectionLabels;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub provider: String,
    pub model: String,
    /// Overrides the provider's default endpoint.
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
    /// Accepted image extensions, compared case-insensitively.
    pub extensions: Vec<String>,
    pub labels: SectionLabels,
    /// Keep the source image when the annotated copy goes to another folder.
    pub keep_originals: bool,
    pub csv_file_name: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: DEFAULT_MODEL.to_string(),
            endpoint: None,
            api_key: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            extensions: DEFAULT_IMAGE_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            labels: SectionLabels::default(),
            keep_originals: false,
            csv_file_name: None,
        }
    }
}

impl AppConfig {
    pub fn provider(&self) -> Result<LLMProvider, ConfigError> {
        self.provider.parse().map_err(ConfigError::Invalid)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Extensions normalized to lowercase without a leading dot.
    pub fn normalized_extensions(&self) -> Vec<String> {
        self.extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.provider()?;
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model cannot be empty".into()));
        }
        if self.normalized_extensions().is_empty() {
            return Err(ConfigError::Invalid(
                "at least one image extension is required".into(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be positive".into(),
            ));
        }
        self.labels.validate().map_err(ConfigError::Invalid)
    }

    /// Looks for the key in the environment, then in this config, then in the
    /// key file kept in `storage_dir`.
    pub fn resolve_api_key(&self, storage_dir: &Path) -> Result<String, ConfigError> {
        if let Some(key) = std::env::var(API_KEY_ENV)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
        {
            return Ok(key);
        }

        if let Some(key) = self
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            return Ok(key.to_string());
        }

        let key_path = storage_dir.join(API_KEY_FILE);
        match std::fs::read_to_string(&key_path) {
            Ok(contents) => parse_key_record(&contents)
                .map(|record| record.key)
                .ok_or(ConfigError::MissingApiKey),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(ConfigError::MissingApiKey)
            }
            Err(source) => Err(ConfigError::Read {
                path: key_path,
                source,
            }),
        }
    }

    pub fn build_llm_client(&self, api_key: &str) -> Result<LLMClient, ConfigError> {
        let provider = self.provider()?;
        let endpoint = self
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(provider.default_endpoint());

        Ok(
            LLMClient::new(provider, api_key, endpoint, self.model.trim())
                .with_max_tokens(self.max_tokens)
                .with_timeout(self.request_timeout()),
        )
    }
}

/// A saved key line: `"<date>; <key>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRecord {
    pub saved_at: String,
    pub key: String,
}

pub fn parse_key_record(contents: &str) -> Option<KeyRecord> {
    let line = contents.lines().find(|line| !line.trim().is_empty())?;
    let (saved_at, key) = match line.split_once(';') {
        Some((date, key)) => (date.trim(), key.trim()),
        None => ("", line.trim()),
    };
    if key.is_empty() {
        return None;
    }
    Some(KeyRecord {
        saved_at: saved_at.to_string(),
        key: key.to_string(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    pub fn from_extension(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load_from_file(path: &Path) -> Result<AppConfig, ConfigError> {
        let format = ConfigFormat::from_extension(path)
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.display().to_string()))?;

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::load_from_string(&content, format)
    }

    pub fn load_from_string(content: &str, format: ConfigFormat) -> Result<AppConfig, ConfigError> {
        let config: AppConfig = match format {
            ConfigFormat::Toml => {
                toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?
            }
            ConfigFormat::Json => {
                serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Explicit path when given, otherwise `config.toml` in storage if present,
    /// otherwise defaults.
    pub fn load(explicit: Option<&Path>, storage_dir: &Path) -> Result<AppConfig, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_from_file(path);
        }

        let default_path: PathBuf = storage_dir.join(CONFIG_FILE);
        if default_path.is_file() {
            log::debug!("Loading configuration from {}", default_path.display());
            return Self::load_from_file(&default_path);
        }

        Ok(AppConfig::default())
    }
}
