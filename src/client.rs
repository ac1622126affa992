//! OpenAI-compatible chat completion client

use super::{config::ProviderConfig, message::Message, Error, Result, Usage};
use futures::stream::Stream;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;

/// Build the shared HTTP client.
///
/// No request timeout is set; calls wait as long as the upstream does.
fn build_http_client() -> std::result::Result<HttpClient, reqwest::Error> {
    HttpClient::builder().build()
}

// ---------------------------------------------------------------------------
// SSE buffer utility
// ---------------------------------------------------------------------------

/// Parsed SSE line types
#[derive(Debug, PartialEq)]
enum SseLine {
    /// `data: [DONE]`, the stream terminator
    Done,
    /// `data: <json>` payload
    Data(String),
    /// Empty, comment or non-data line
    Skip,
    /// Line was not valid UTF-8
    Invalid,
}

/// Accumulates bytes from an HTTP response and yields complete SSE lines.
struct SseBuffer {
    buf: Vec<u8>,
}

impl SseBuffer {
    fn new() -> Self {
        Self { buf: Vec::with_capacity(4096) }
    }

    fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Extract the next complete line (terminated by `\n`) from the buffer.
    /// Returns `None` when no complete line is available yet.
    ///
    /// Lines are decoded only once complete, so multi-byte characters split
    /// across chunk boundaries survive intact.
    fn next_line(&mut self) -> Option<SseLine> {
        let pos = self.buf.iter().position(|&b| b == b'\n')?;
        let raw: Vec<u8> = self.buf.drain(..=pos).collect();
        let line = match std::str::from_utf8(&raw) {
            Ok(s) => s.trim(),
            Err(_) => return Some(SseLine::Invalid),
        };

        if line == "data: [DONE]" {
            return Some(SseLine::Done);
        }

        match line.strip_prefix("data:") {
            Some(json_str) => Some(SseLine::Data(json_str.trim_start().to_string())),
            None => Some(SseLine::Skip),
        }
    }
}

/// Structured result of a non-streaming chat completion
#[derive(Debug, Clone, PartialEq)]
pub struct ChatCompletion {
    /// Assistant message of the first choice
    pub message: Message,

    /// Token usage, when the endpoint reports it
    pub usage: Option<Usage>,
}

/// Streaming event from the LLM
#[derive(Debug, Clone)]
pub struct StreamEvent {
    /// Text delta for this event
    pub delta: String,

    /// Whether this is the final event
    pub done: bool,

    /// Token usage (only available in the final event)
    pub usage: Option<Usage>,
}

/// Trait for LLM clients
#[async_trait::async_trait]
pub trait Client: Send + Sync {
    /// Send a chat completion request (non-streaming)
    async fn chat(&self, messages: &[Message], model: &str) -> Result<ChatCompletion>;

    /// Send a chat completion request with streaming
    fn chat_stream(
        &self,
        messages: &[Message],
        model: &str,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

    /// Get the API base URL
    fn api_base(&self) -> &str;
}

/// Create an LLM client for the provider configuration.
///
/// Returns a shared trait object so the chain can be handed a mock in tests.
pub fn create_client(config: ProviderConfig) -> Result<Arc<dyn Client>> {
    Ok(Arc::new(OpenAIClient::new(config)?))
}

/// OpenAI client implementation
pub struct OpenAIClient {
    config: ProviderConfig,
    http_client: HttpClient,
}

impl OpenAIClient {
    /// Create a new OpenAI client
    ///
    /// Fails with [`Error::Config`] when the API key is empty.
    pub fn new(config: ProviderConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(Error::Config("OpenAI API key is empty".to_string()));
        }
        Ok(OpenAIClient {
            http_client: build_http_client()?,
            config,
        })
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        )
    }

    fn request(&self, messages: &[Message], model: &str, stream: bool) -> ChatRequest {
        ChatRequest {
            model: model.to_string(),
            messages: messages.to_vec(),
            temperature: self.config.temperature,
            stream,
        }
    }

    fn post(&self, url: &str, request: &ChatRequest) -> reqwest::RequestBuilder {
        let mut builder = self
            .http_client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(request);
        if let Some(org) = &self.config.organization {
            builder = builder.header("OpenAI-Organization", org);
        }
        builder
    }
}

#[async_trait::async_trait]
impl Client for OpenAIClient {
    async fn chat(&self, messages: &[Message], model: &str) -> Result<ChatCompletion> {
        let url = self.completions_url();
        let request = self.request(messages, model, false);

        tracing::debug!("POST {} (model: {}, messages: {})", url, model, messages.len());

        let response = self.post(&url, &request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(Error::Api(format!(
                "OpenAI API error ({}): {}",
                status, body
            )));
        }

        let response: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| Error::Api(format!("Failed to parse OpenAI response: {}. Body: {}", e, body)))?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::Api("No choices in OpenAI response".to_string()))?;

        let usage = response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ChatCompletion {
            message: Message::assistant(choice.message.content.unwrap_or_default()),
            usage,
        })
    }

    fn chat_stream(
        &self,
        messages: &[Message],
        model: &str,
    ) -> Pin<Box<dyn futures::Stream<Item = Result<StreamEvent>> + Send>> {
        let url = self.completions_url();
        let request_builder = self.post(&url, &self.request(messages, model, true));

        Box::pin(async_stream::stream! {
            let response = match request_builder.send().await {
                Ok(r) => r,
                Err(e) => {
                    yield Err(Error::from(e));
                    return;
                }
            };

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                yield Err(Error::Api(format!("OpenAI API error ({}): {}", status, body)));
                return;
            }

            let mut stream = response.bytes_stream();

            use futures::StreamExt;
            let mut sse = SseBuffer::new();
            let mut usage: Option<Usage> = None;

            while let Some(chunk_result) = stream.next().await {
                let chunk = match chunk_result {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(Error::from(e));
                        return;
                    }
                };

                sse.extend(&chunk);

                while let Some(sse_line) = sse.next_line() {
                    match sse_line {
                        SseLine::Done => {
                            yield Ok(StreamEvent { delta: String::new(), done: true, usage: usage.clone() });
                            return;
                        }
                        SseLine::Data(json_str) => {
                            match serde_json::from_str::<ChatStreamChunk>(&json_str) {
                                Ok(chunk) => {
                                    if let Some(err) = chunk.error {
                                        yield Err(Error::Api(format!("OpenAI stream error: {}", err)));
                                        return;
                                    }

                                    if let Some(ref u) = chunk.usage {
                                        usage = Some(Usage {
                                            prompt_tokens: u.prompt_tokens,
                                            completion_tokens: u.completion_tokens,
                                            total_tokens: u.total_tokens,
                                        });
                                    }

                                    if let Some(choice) = chunk.choices.first() {
                                        let delta_text = choice.delta.content.clone().unwrap_or_default();
                                        if !delta_text.is_empty() {
                                            yield Ok(StreamEvent { delta: delta_text, done: false, usage: None });
                                        }
                                    }
                                }
                                Err(e) => {
                                    tracing::warn!("Failed to parse SSE chunk: {}", e);
                                }
                            }
                        }
                        SseLine::Invalid => {
                            tracing::warn!("Skipping SSE line with invalid UTF-8");
                        }
                        SseLine::Skip => {}
                    }
                }
            }

            yield Err(Error::Api("OpenAI stream ended without [DONE]".to_string()));
        })
    }

    fn api_base(&self) -> &str {
        &self.config.api_base
    }
}

// OpenAI wire types
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatStreamChunk {
    #[serde(default)]
    choices: Vec<ChatStreamChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChatStreamChoice {
    delta: ChatStreamDelta,
}

#[derive(Debug, Deserialize)]
struct ChatStreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_server::OpenAIMockServer;
    use futures::StreamExt;
    use wiremock::{
        matchers::{body_partial_json, header, method, path},
        Mock, ResponseTemplate,
    };

    fn client_for(mock: &OpenAIMockServer) -> Arc<dyn Client> {
        create_client(ProviderConfig::openai(mock.base_url(), "test-key".to_string())).unwrap()
    }

    #[test]
    fn test_sse_buffer_splits_lines() {
        let mut sse = SseBuffer::new();
        sse.extend(b"data: {\"a\":1}\n\nda");
        assert_eq!(sse.next_line(), Some(SseLine::Data("{\"a\":1}".to_string())));
        assert_eq!(sse.next_line(), Some(SseLine::Skip));
        assert_eq!(sse.next_line(), None);
        sse.extend(b"ta: [DONE]\n");
        assert_eq!(sse.next_line(), Some(SseLine::Done));
    }

    #[test]
    fn test_sse_buffer_keeps_split_utf8() {
        let line = "data: \"héllo\"\n".as_bytes();
        let split = line.iter().position(|&b| b == 0xC3).unwrap() + 1;
        let mut sse = SseBuffer::new();
        sse.extend(&line[..split]);
        assert_eq!(sse.next_line(), None);
        sse.extend(&line[split..]);
        assert_eq!(sse.next_line(), Some(SseLine::Data("\"héllo\"".to_string())));
    }

    #[tokio::test]
    async fn test_chat_returns_first_choice() {
        let mock = OpenAIMockServer::start().await;
        mock.mock_chat_completion("Bonjour", 20).await;

        let client = client_for(&mock);
        let completion = client
            .chat(&[Message::user("Hello")], "gpt-3.5-turbo")
            .await
            .unwrap();

        assert_eq!(completion.message, Message::assistant("Bonjour"));
        assert_eq!(completion.usage.unwrap().total_tokens, 20);
    }

    #[tokio::test]
    async fn test_chat_sends_model_and_auth() {
        let mock = OpenAIMockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-3.5-turbo",
                "stream": false,
                "messages": [{"role": "user", "content": "Hello"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                OpenAIMockServer::completion_body("ok"),
            ))
            .expect(1)
            .mount(mock.server())
            .await;

        let client = client_for(&mock);
        let completion = client.chat(&[Message::user("Hello")], "gpt-3.5-turbo").await.unwrap();
        assert_eq!(completion.message.content, "ok");
    }

    #[tokio::test]
    async fn test_null_content_is_empty_string() {
        let mock = OpenAIMockServer::start().await;
        mock.mock_raw(
            200,
            serde_json::json!({
                "choices": [{"index": 0, "message": {"role": "assistant", "content": null}}]
            }),
        )
        .await;

        let completion = client_for(&mock)
            .chat(&[Message::user("Hello")], "gpt-3.5-turbo")
            .await
            .unwrap();
        assert_eq!(completion.message.content, "");
        assert!(completion.usage.is_none());
    }

    #[tokio::test]
    async fn test_no_choices_is_api_error() {
        let mock = OpenAIMockServer::start().await;
        mock.mock_raw(200, serde_json::json!({"choices": []})).await;

        let result = client_for(&mock).chat(&[Message::user("Hello")], "gpt-3.5-turbo").await;
        assert!(matches!(result, Err(Error::Api(_))));
    }

    #[tokio::test]
    async fn test_rate_limit_is_not_retried() {
        let mock = OpenAIMockServer::start().await;
        mock.mock_error(429, "rate limited").await;

        let result = client_for(&mock).chat(&[Message::user("Hello")], "gpt-3.5-turbo").await;
        match result {
            Err(Error::Api(msg)) => assert!(msg.contains("429")),
            other => panic!("expected API error, got {:?}", other),
        }
        assert_eq!(mock.received_count().await, 1);
    }

    #[tokio::test]
    async fn test_chat_stream_concatenates_deltas() {
        let mock = OpenAIMockServer::start().await;
        mock.mock_chat_streaming(vec!["Bon", "jour"]).await;

        let client = client_for(&mock);
        let mut stream = client.chat_stream(&[Message::user("Hello")], "gpt-3.5-turbo");

        let mut full_response = String::new();
        while let Some(event) = stream.next().await {
            let event = event.unwrap();
            full_response.push_str(&event.delta);
            if event.done {
                break;
            }
        }

        assert_eq!(full_response, "Bonjour");
    }

    #[tokio::test]
    async fn test_chat_stream_error_status() {
        let mock = OpenAIMockServer::start().await;
        mock.mock_error(500, "boom").await;

        let client = client_for(&mock);
        let mut stream = client.chat_stream(&[Message::user("Hello")], "gpt-3.5-turbo");
        let first = stream.next().await.unwrap();
        assert!(matches!(first, Err(Error::Api(_))));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_chat_stream_error_frame_is_error() {
        let mock = OpenAIMockServer::start().await;
        mock.mock_sse_body(concat!(
            "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Bon\"}}]}\n\n",
            "data: {\"error\":{\"message\":\"server overloaded\"}}\n\n",
        ))
        .await;

        let client = client_for(&mock);
        let events: Vec<Result<StreamEvent>> = client
            .chat_stream(&[Message::user("Hello")], "gpt-3.5-turbo")
            .collect()
            .await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].as_ref().unwrap().delta, "Bon");
        match &events[1] {
            Err(Error::Api(msg)) => assert!(msg.contains("server overloaded")),
            other => panic!("expected API error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_chat_stream_without_done_is_error() {
        let mock = OpenAIMockServer::start().await;
        mock.mock_sse_body("data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Bon\"}}]}\n\n")
            .await;

        let client = client_for(&mock);
        let events: Vec<Result<StreamEvent>> = client
            .chat_stream(&[Message::user("Hello")], "gpt-3.5-turbo")
            .collect()
            .await;

        assert!(events.iter().all(|event| !matches!(event, Ok(e) if e.done)));
        assert!(matches!(events.last(), Some(Err(Error::Api(_)))));
    }

    #[test]
    fn test_empty_api_key_rejected() {
        for key in ["", "   "] {
            let result = OpenAIClient::new(ProviderConfig::openai(
                "http://unused".to_string(),
                key.to_string(),
            ));
            assert!(matches!(result, Err(Error::Config(_))));
        }
    }
}
