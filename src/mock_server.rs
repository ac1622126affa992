//! Mock OpenAI server for testing the chain offline
//!
//! Wraps a wiremock server with canned chat-completion responses, so tests
//! run without a real API key.

use wiremock::{
    matchers::{method, path},
    Mock, MockServer, Request, Respond, ResponseTemplate,
};

/// OpenAI mock server for testing
pub struct OpenAIMockServer {
    server: MockServer,
}

impl OpenAIMockServer {
    /// Create a new OpenAI mock server
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        Self { server }
    }

    /// Get the base URL of this mock server
    pub fn base_url(&self) -> String {
        self.server.uri()
    }

    /// Underlying wiremock server, for custom mounts
    pub fn server(&self) -> &MockServer {
        &self.server
    }

    /// Number of requests the server has seen
    pub async fn received_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or_default()
    }

    /// Bodies of all requests the server has seen, parsed as JSON
    pub async fn received_bodies(&self) -> Vec<serde_json::Value> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter_map(|request| serde_json::from_slice(&request.body).ok())
            .collect()
    }

    /// Non-streaming chat completion body with the given content
    pub fn completion_body(content: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-mock",
            "object": "chat.completion",
            "created": 1234567890,
            "model": "gpt-3.5-turbo",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": content
                },
                "finish_reason": "stop"
            }],
            "usage": {
                "prompt_tokens": 10,
                "completion_tokens": 10,
                "total_tokens": 20
            }
        })
    }

    /// Setup a mock response for non-streaming chat completion
    pub async fn mock_chat_completion(&self, content: &str, total_tokens: u32) {
        let mut body = Self::completion_body(content);
        body["usage"]["completion_tokens"] = serde_json::json!(total_tokens.saturating_sub(10));
        body["usage"]["total_tokens"] = serde_json::json!(total_tokens);
        self.mock_raw(200, body).await;
    }

    /// Respond to every completion with an arbitrary status and JSON body
    pub async fn mock_raw(&self, status: u16, body: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Respond to every completion with an error status
    pub async fn mock_error(&self, status: u16, message: &str) {
        self.mock_raw(
            status,
            serde_json::json!({"error": {"message": message, "type": "mock_error"}}),
        )
        .await;
    }

    /// Reply with the content of the last message in each request
    pub async fn mock_echo(&self) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(EchoResponder { fail_on: None })
            .mount(&self.server)
            .await;
    }

    /// Echo like [`mock_echo`](Self::mock_echo), but answer 500 for
    /// requests whose last message is `text`
    pub async fn mock_echo_failing_on(&self, text: &str) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(EchoResponder {
                fail_on: Some(text.to_string()),
            })
            .mount(&self.server)
            .await;
    }

    /// Respond to every completion with a verbatim SSE body
    pub async fn mock_sse_body(&self, body: &str) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(&self.server)
            .await;
    }

    /// Setup a mock response for streaming chat completion (SSE)
    pub async fn mock_chat_streaming(&self, chunks: Vec<&str>) {
        let mut sse_response = String::new();

        for (i, chunk) in chunks.iter().enumerate() {
            let finish_reason = if i == chunks.len() - 1 {
                serde_json::json!("stop")
            } else {
                serde_json::Value::Null
            };

            let chunk_json = serde_json::json!({
                "id": "chatcmpl-mock",
                "object": "chat.completion.chunk",
                "created": 1234567890,
                "model": "gpt-3.5-turbo",
                "choices": [{
                    "index": 0,
                    "delta": {
                        "content": chunk
                    },
                    "finish_reason": finish_reason
                }]
            });

            sse_response.push_str(&format!("data: {}\n\n", chunk_json));
        }

        sse_response.push_str("data: [DONE]\n\n");

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse_response),
            )
            .mount(&self.server)
            .await;
    }
}

/// Echoes the last request message back as the assistant reply
struct EchoResponder {
    fail_on: Option<String>,
}

impl Respond for EchoResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value = match serde_json::from_slice(&request.body) {
            Ok(body) => body,
            Err(_) => return ResponseTemplate::new(400),
        };
        let content = body["messages"]
            .as_array()
            .and_then(|messages| messages.last())
            .and_then(|message| message["content"].as_str())
            .unwrap_or_default()
            .to_string();
        if self.fail_on.as_deref() == Some(content.as_str()) {
            return ResponseTemplate::new(500)
                .set_body_json(serde_json::json!({"error": {"message": "mock failure"}}));
        }
        ResponseTemplate::new(200).set_body_json(OpenAIMockServer::completion_body(&content))
    }
}
