//! Server configuration

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to listen on
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path prefix the chain routes are mounted under
    #[serde(default = "default_path")]
    pub path: String,

    /// API title reported in the OpenAPI document
    #[serde(default = "default_title")]
    pub title: String,

    /// API version reported in the OpenAPI document
    #[serde(default = "default_version")]
    pub version: String,

    /// API description reported in the OpenAPI document
    #[serde(default = "default_description")]
    pub description: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            path: default_path(),
            title: default_title(),
            version: default_version(),
            description: default_description(),
        }
    }
}

impl ServerConfig {
    /// Load server configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Parse server configuration from TOML; missing keys take defaults
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let mut config: ServerConfig = toml::from_str(content)?;
        config.path = normalize_path(&config.path);
        Ok(config)
    }

    /// Set the route prefix, normalized to a leading `/` and no trailing `/`
    pub fn with_path(mut self, path: &str) -> Self {
        self.path = normalize_path(path);
        self
    }
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    format!("/{}", trimmed)
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_path() -> String {
    "/chain".to_string()
}

fn default_title() -> String {
    "SimpleTranslator".to_string()
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_description() -> String {
    "A simple API server using LangChain's Runnable interfaces".to_string()
}
