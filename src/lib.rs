//! Prompt-to-LLM translation chain
//!
//! A fixed three-stage pipeline (prompt template, chat model, string output
//! parser) that translates text into a requested language, plus an optional
//! HTTP surface (`serve` feature) that binds it to `/chain/*` routes.
mod chain;
mod client;
mod config;
mod message;
mod prompt;

#[cfg(test)]
mod mock_server;

#[cfg(feature = "serve")]
pub mod serve;

use thiserror::Error;

/// Result type for simple-translator operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for simple-translator operations
#[derive(Debug, Error)]
pub enum Error {
    /// API error
    #[error("API error: {0}")]
    Api(String),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Prompt template error (malformed template or missing variable)
    #[error("Template error: {0}")]
    Template(String),
}

pub use chain::{parse_output, TranslationChain, TranslationInput, SYSTEM_TEMPLATE, USER_TEMPLATE};
pub use client::{create_client, ChatCompletion, Client, OpenAIClient, StreamEvent};
pub use config::{ProviderConfig, DEFAULT_API_BASE, DEFAULT_MODEL, DEFAULT_TEMPERATURE};
pub use message::{Message, MessageRole, Usage};
pub use prompt::{ChatPromptTemplate, Variables};
