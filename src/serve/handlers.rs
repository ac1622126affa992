//! HTTP request handlers for the chain routes

use super::config::ServerConfig;
use crate::{TranslationChain, TranslationInput};
use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, Sse},
    Json,
};
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use serde_json::Value;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// State shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub chain: Arc<TranslationChain>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(chain: TranslationChain, config: ServerConfig) -> Self {
        Self {
            chain: Arc::new(chain),
            config: Arc::new(config),
        }
    }
}

/// Body of `invoke` and `stream` requests. Unknown keys such as `config`
/// and `kwargs` are accepted and ignored.
#[derive(Debug, Deserialize)]
pub struct InvokeRequest {
    pub input: TranslationInput,
}

/// Body of `batch` requests
#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub inputs: Vec<TranslationInput>,
}

/// Run the chain once
pub async fn invoke_handler(
    State(state): State<AppState>,
    Json(request): Json<InvokeRequest>,
) -> Result<Json<Value>, StatusCode> {
    let run_id = Uuid::new_v4();
    info!("Invoke {} (language: {})", run_id, request.input.language);

    let output = state.chain.invoke(&request.input).await.map_err(|e| {
        error!("Invoke {} failed: {}", run_id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(json!({
        "output": output,
        "metadata": {
            "run_id": run_id,
            "feedback_tokens": []
        }
    })))
}

/// Run the chain over several inputs
pub async fn batch_handler(
    State(state): State<AppState>,
    Json(request): Json<BatchRequest>,
) -> Result<Json<Value>, StatusCode> {
    let run_ids: Vec<Uuid> = request.inputs.iter().map(|_| Uuid::new_v4()).collect();
    info!("Batch of {} inputs", request.inputs.len());

    let outputs = state.chain.batch(&request.inputs).await.map_err(|e| {
        error!("Batch failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(json!({
        "output": outputs,
        "metadata": {
            "run_ids": run_ids
        }
    })))
}

/// Run the chain and stream output chunks as server-sent events.
///
/// Emits one `metadata` event, a `data` event per chunk and a final `end`
/// event. A failure emits an `error` event and closes the stream.
pub async fn stream_handler(
    State(state): State<AppState>,
    Json(request): Json<InvokeRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let run_id = Uuid::new_v4();
    info!("Stream {} (language: {})", run_id, request.input.language);

    let mut chunks = state.chain.stream(&request.input);

    let events = async_stream::stream! {
        yield Ok::<Event, Infallible>(
            Event::default().event("metadata").data(json!({"run_id": run_id}).to_string()),
        );

        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(text) => {
                    yield Ok(Event::default().event("data").data(Value::String(text).to_string()));
                }
                Err(e) => {
                    error!("Stream {} failed: {}", run_id, e);
                    yield Ok(Event::default().event("error").data(
                        json!({"status_code": 500, "message": "Internal Server Error"}).to_string(),
                    ));
                    return;
                }
            }
        }

        yield Ok(Event::default().event("end"));
    };

    Sse::new(events)
}

/// JSON schema of the chain input
pub async fn input_schema_handler(State(state): State<AppState>) -> Json<Value> {
    Json(state.chain.input_schema())
}

/// JSON schema of the chain output
pub async fn output_schema_handler(State(state): State<AppState>) -> Json<Value> {
    Json(state.chain.output_schema())
}

/// Minimal OpenAPI document describing the chain routes
pub async fn openapi_handler(State(state): State<AppState>) -> Json<Value> {
    let config = &state.config;
    let prefix = config.path.trim_end_matches('/');
    let input_schema = state.chain.input_schema();
    let output_schema = state.chain.output_schema();

    let invoke_body = json!({
        "type": "object",
        "properties": {"input": input_schema},
        "required": ["input"]
    });
    let batch_body = json!({
        "type": "object",
        "properties": {"inputs": {"type": "array", "items": input_schema}},
        "required": ["inputs"]
    });

    let operation = |summary: &str, body: &Value, response: Value| {
        json!({
            "post": {
                "summary": summary,
                "requestBody": {
                    "required": true,
                    "content": {"application/json": {"schema": body}}
                },
                "responses": {"200": response}
            }
        })
    };

    let mut paths = serde_json::Map::new();
    paths.insert(
        format!("{}/invoke", prefix),
        operation(
            "Invoke the chain",
            &invoke_body,
            json!({"content": {"application/json": {"schema": {
                "type": "object",
                "properties": {"output": output_schema}
            }}}}),
        ),
    );
    paths.insert(
        format!("{}/batch", prefix),
        operation(
            "Invoke the chain over a batch of inputs",
            &batch_body,
            json!({"content": {"application/json": {"schema": {
                "type": "object",
                "properties": {"output": {"type": "array", "items": output_schema}}
            }}}}),
        ),
    );
    paths.insert(
        format!("{}/stream", prefix),
        operation(
            "Stream the chain output",
            &invoke_body,
            json!({"content": {"text/event-stream": {}}}),
        ),
    );
    for route in ["input_schema", "output_schema"] {
        paths.insert(
            format!("{}/{}", prefix, route),
            json!({"get": {"summary": route, "responses": {"200": {"description": "JSON schema"}}}}),
        );
    }

    Json(json!({
        "openapi": "3.1.0",
        "info": {
            "title": config.title,
            "version": config.version,
            "description": config.description
        },
        "paths": paths
    }))
}
