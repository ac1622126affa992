//! Model provider configuration
//!
//! Loaded once at startup from the process environment:
//! - `OPENAI_API_KEY` - API key (required)
//! - `OPENAI_API_BASE` - API base URL (default: `https://api.openai.com/v1`)
//! - `OPENAI_ORGANIZATION` - Organization header (optional)
//!
//! The binary loads `.env` before calling [`ProviderConfig::from_env`].

use super::{Error, Result};
use std::fmt;

/// Default OpenAI API base URL
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Model the translation chain talks to unless overridden
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Sampling temperature sent with every request
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

const API_KEY_VAR: &str = "OPENAI_API_KEY";
const API_BASE_VAR: &str = "OPENAI_API_BASE";
const ORGANIZATION_VAR: &str = "OPENAI_ORGANIZATION";

/// Configuration for the OpenAI-compatible completion endpoint
#[derive(Clone)]
pub struct ProviderConfig {
    /// API base URL
    pub api_base: String,

    /// API key
    pub api_key: String,

    /// Organization sent as `OpenAI-Organization`
    pub organization: Option<String>,

    /// Model identifier
    pub model: String,

    /// Sampling temperature (omitted from requests when `None`)
    pub temperature: Option<f32>,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_base", &self.api_base)
            .field("api_key", &"<redacted>")
            .field("organization", &self.organization)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl ProviderConfig {
    /// Create an OpenAI config with default model and temperature
    pub fn openai(api_base: String, api_key: String) -> Self {
        ProviderConfig {
            api_base,
            api_key,
            organization: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: Some(DEFAULT_TEMPERATURE),
        }
    }

    /// Load configuration from the process environment.
    ///
    /// Fails when `OPENAI_API_KEY` is missing or empty, so a misconfigured
    /// process stops before it starts serving.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(API_KEY_VAR)
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| Error::Config(format!("{} is not set", API_KEY_VAR)))?;

        let api_base = lookup(API_BASE_VAR)
            .filter(|base| !base.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let organization = lookup(ORGANIZATION_VAR).filter(|org| !org.trim().is_empty());

        tracing::debug!("Loaded provider config: api_base={}", api_base);

        Ok(ProviderConfig {
            api_base,
            api_key,
            organization,
            model: DEFAULT_MODEL.to_string(),
            temperature: Some(DEFAULT_TEMPERATURE),
        })
    }

    /// Override the model identifier
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Get the API key
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Get the API base URL
    pub fn api_base(&self) -> &str {
        &self.api_base
    }
}
