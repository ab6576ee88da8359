//! HTTP server for the chat endpoint.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/chat` | Answer a question as a streamed `text/plain` body |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Request
//!
//! ```json
//! { "message": "What did you build last year?", "history": [{"role": "user", "content": "..."}] }
//! ```
//!
//! # Error Contract
//!
//! | Status | Body |
//! |--------|------|
//! | 400 | `{"error": "Message is required"}` |
//! | 500 | `{"error": "Configuration error", "message": "..."}` |
//! | 503 | `{"error": "...", "message": "...", "retryAfter": 60}` plus `Retry-After: 60` |
//! | 500 | `{"error": "...", "message": "...", "details": "..."}` |
//!
//! `details` is only present when `server.expose_error_details` is set.
//! Once a 200 stream has started, a failure aborts the body; bytes already
//! sent are not retracted.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures_util::StreamExt;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use folio_chat_core::history::sanitize_history;

use crate::config::{Config, Credentials};
use crate::error::ChatError;
use crate::generation::TextStream;
use crate::pipeline::{ChatPipeline, ChatRequest};

/// Shared application state passed to route handlers.
#[derive(Clone)]
pub struct AppState {
    /// `None` when provider credentials are missing; chat requests then fail
    /// with a configuration error.
    pipeline: Option<Arc<ChatPipeline>>,
    expose_details: bool,
}

impl AppState {
    pub fn new(pipeline: Option<ChatPipeline>, expose_details: bool) -> Self {
        Self {
            pipeline: pipeline.map(Arc::new),
            expose_details,
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/chat", post(handle_chat))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Starts the chat server on `[server].bind` and runs until the process is
/// terminated.
///
/// Missing credentials do not prevent startup.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pipeline = match Credentials::from_env(config) {
        Ok(credentials) => Some(ChatPipeline::connect(config, &credentials)?),
        Err(e) => {
            warn!(error = %e, "chat endpoint will report a configuration error");
            None
        }
    };

    let app = router(AppState::new(pipeline, config.server.expose_error_details));
    let bind_addr = &config.server.bind;

    println!("Chat server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(rename = "retryAfter", skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    body: ErrorBody,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self.body.retry_after {
            Some(secs) => (
                self.status,
                [(header::RETRY_AFTER, secs.to_string())],
                Json(self.body),
            )
                .into_response(),
            None => (self.status, Json(self.body)).into_response(),
        }
    }
}

fn bad_request(error: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        body: ErrorBody {
            error: error.into(),
            message: None,
            retry_after: None,
            details: None,
        },
    }
}

fn configuration_error() -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: ErrorBody {
            error: "Configuration error".to_string(),
            message: Some(
                "The AI assistant is not properly configured. Please contact the site administrator."
                    .to_string(),
            ),
            retry_after: None,
            details: None,
        },
    }
}

fn quota_error(retry_after_secs: u64) -> AppError {
    AppError {
        status: StatusCode::SERVICE_UNAVAILABLE,
        body: ErrorBody {
            error: "API quota temporarily exceeded".to_string(),
            message: Some(
                "The AI assistant is temporarily unavailable due to high usage. Please try again in a few minutes."
                    .to_string(),
            ),
            retry_after: Some(retry_after_secs),
            details: None,
        },
    }
}

fn internal_error(details: Option<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: ErrorBody {
            error: "An error occurred processing your request".to_string(),
            message: Some("Something went wrong. Please try again later.".to_string()),
            retry_after: None,
            details,
        },
    }
}

impl AppState {
    fn chat_error(&self, err: ChatError) -> AppError {
        match err {
            ChatError::Validation(msg) => bad_request(msg),
            ChatError::Configuration(msg) => {
                error!(error = %msg, "chat pipeline misconfigured");
                configuration_error()
            }
            ChatError::QuotaExhausted { retry_after_secs } => quota_error(retry_after_secs),
            other => {
                error!(error = %other, "chat request failed");
                internal_error(self.expose_details.then(|| other.to_string()))
            }
        }
    }
}

// ============ POST /api/chat ============

async fn handle_chat(State(state): State<AppState>, body: Bytes) -> Result<Response, AppError> {
    let payload: Value =
        serde_json::from_slice(&body).map_err(|_| bad_request("Invalid request body"))?;

    let message = payload
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| bad_request("Message is required"))?;

    let pipeline = state.pipeline.as_ref().ok_or_else(|| {
        state.chat_error(ChatError::Configuration(
            "provider credentials are not set".to_string(),
        ))
    })?;

    let request = ChatRequest {
        message: message.to_string(),
        history: sanitize_history(payload.get("history"), pipeline.settings().max_history),
    };

    let stream = pipeline
        .answer(&request)
        .await
        .map_err(|e| state.chat_error(e))?;

    Ok(stream_response(stream))
}

fn stream_response(stream: TextStream) -> Response {
    let body = stream.inspect(|item| {
        if let Err(e) = item {
            error!(error = %e, "answer stream aborted");
        }
    });

    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache, no-transform"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Body::from_stream(body),
    )
        .into_response()
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
