//! Translation chain: prompt template, chat model, string output parser

use super::{
    client::{create_client, ChatCompletion, Client},
    config::ProviderConfig,
    prompt::{ChatPromptTemplate, Variables},
    Error, MessageRole, Result,
};
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;

/// System message template
pub const SYSTEM_TEMPLATE: &str = "Translate the following into {language}:";

/// User message template
pub const USER_TEMPLATE: &str = "{text}";

/// Input accepted by the translation chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationInput {
    /// Target language, used verbatim
    pub language: String,

    /// Text to translate, sent as the user message unchanged
    pub text: String,
}

impl TranslationInput {
    /// Create a new input
    pub fn new(language: impl Into<String>, text: impl Into<String>) -> Self {
        TranslationInput {
            language: language.into(),
            text: text.into(),
        }
    }

    /// Template variables for this input
    pub fn variables(&self) -> Variables {
        let mut variables = Variables::new();
        variables.insert("language".to_string(), self.language.clone());
        variables.insert("text".to_string(), self.text.clone());
        variables
    }
}

/// Extract the plain text of a completion.
///
/// Empty content is passed through unchanged.
pub fn parse_output(completion: ChatCompletion) -> String {
    completion.message.content
}

/// The translation pipeline.
///
/// Holds only immutable state, so one instance behind an `Arc` serves any
/// number of concurrent invocations.
pub struct TranslationChain {
    prompt: ChatPromptTemplate,
    client: Arc<dyn Client>,
    model: String,
}

impl TranslationChain {
    /// Build the chain against the configured OpenAI endpoint
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let model = config.model.clone();
        let client = create_client(config)?;
        Self::with_client(client, model)
    }

    /// Build the chain around an existing client
    pub fn with_client(client: Arc<dyn Client>, model: impl Into<String>) -> Result<Self> {
        let prompt = ChatPromptTemplate::from_messages([
            (MessageRole::System, SYSTEM_TEMPLATE),
            (MessageRole::User, USER_TEMPLATE),
        ])?;

        Ok(TranslationChain {
            prompt,
            client,
            model: model.into(),
        })
    }

    /// Prompt template used by the chain
    pub fn prompt(&self) -> &ChatPromptTemplate {
        &self.prompt
    }

    /// Model identifier sent with every request
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Completion endpoint base URL
    pub fn api_base(&self) -> &str {
        self.client.api_base()
    }

    /// Translate one input with a single model call
    pub async fn invoke(&self, input: &TranslationInput) -> Result<String> {
        let messages = self.prompt.format_messages(&input.variables())?;
        let completion = self.client.chat(&messages, &self.model).await?;
        if let Some(usage) = &completion.usage {
            tracing::debug!(
                "Completion usage: prompt={} completion={} total={}",
                usage.prompt_tokens,
                usage.completion_tokens,
                usage.total_tokens
            );
        }
        Ok(parse_output(completion))
    }

    /// Translate several inputs concurrently.
    ///
    /// Outputs keep input order; the first failure fails the batch.
    pub async fn batch(&self, inputs: &[TranslationInput]) -> Result<Vec<String>> {
        futures::future::try_join_all(inputs.iter().map(|input| self.invoke(input))).await
    }

    /// Translate one input, yielding text chunks as the model produces them
    pub fn stream(&self, input: &TranslationInput) -> Pin<Box<dyn Stream<Item = Result<String>> + Send>> {
        let messages = match self.prompt.format_messages(&input.variables()) {
            Ok(messages) => messages,
            Err(e) => return Box::pin(stream::once(async move { Err::<String, Error>(e) })),
        };

        let events = self.client.chat_stream(&messages, &self.model);
        Box::pin(events.filter_map(|event| async move {
            match event {
                Ok(event) if event.done => {
                    if let Some(usage) = &event.usage {
                        tracing::debug!("Stream usage: total={}", usage.total_tokens);
                    }
                    None
                }
                Ok(event) if event.delta.is_empty() => None,
                Ok(event) => Some(Ok(event.delta)),
                Err(e) => Some(Err(e)),
            }
        }))
    }

    /// JSON schema of the chain input
    pub fn input_schema(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        for name in self.prompt.input_variables() {
            properties.insert(
                name.to_string(),
                serde_json::json!({"title": title_case(name), "type": "string"}),
            );
        }
        let required: Vec<&str> = self.prompt.input_variables().collect();

        serde_json::json!({
            "title": "PromptInput",
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// JSON schema of the chain output
    pub fn output_schema(&self) -> serde_json::Value {
        serde_json::json!({"title": "StrOutputParserOutput", "type": "string"})
    }
}

fn title_case(name: &str) -> String {
    name.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
