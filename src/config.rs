//! Service configuration loaded from TOML, with the API key from the environment.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::geocode::{GeminiConfig, DEFAULT_MODEL, DEFAULT_REGION_HINT};

/// Environment variables checked for the geocoder key, in order
pub const API_KEY_VARS: &[&str] = &["GEOPROTEC_API_KEY", "API_KEY"];

/// Default upload limit, above axum's 2 MB body default
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub listen: String,
    /// GeoJSON file used as the initial area instead of the built-in one
    pub area_file: Option<PathBuf>,
    /// Enforce ring closure and coordinate ranges on uploads
    pub strict: bool,
    /// Largest accepted area upload, in bytes
    pub max_upload_bytes: usize,
    pub geocoder: GeocoderConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GeocoderConfig {
    pub model: String,
    pub endpoint: Option<String>,
    pub region_hint: String,
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:3000".to_string(),
            area_file: None,
            strict: false,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            geocoder: GeocoderConfig::default(),
        }
    }
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            endpoint: None,
            region_hint: DEFAULT_REGION_HINT.to_string(),
            timeout_secs: 30,
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }
}

impl GeocoderConfig {
    /// Gateway settings for the given key
    pub fn gemini(&self, api_key: &str) -> GeminiConfig {
        let mut config = GeminiConfig::new(api_key);
        config.model = self.model.clone();
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        config.region_hint = self.region_hint.clone();
        config.timeout = Duration::from_secs(self.timeout_secs);
        config
    }
}

/// First non-blank key among [`API_KEY_VARS`]
pub fn api_key_from_env() -> Option<String> {
    API_KEY_VARS
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}
