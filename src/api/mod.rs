use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;

use crate::error::RelayError;
use crate::protocol::openai::ChatCompletionRequest;
use crate::registry;
use crate::state::AppState;
use crate::upstream::{chat_completion, ChatOutcome};

/// Build the HTTP surface: model listing, chat completions, liveness.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/models", get(list_models))
        .route("/models/{url_idx}", get(list_endpoint_models))
        .route("/chat/completions", post(chat_completions))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": true }))
}

/// Aggregate listing across every enabled endpoint. Endpoint failures degrade
/// to zero models inside the resolver; this never hard-fails on one endpoint.
async fn list_models(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, RelayError> {
    if !state.config.gemini.enable {
        return Ok(Json(serde_json::json!({ "data": [], "object": "list" })));
    }

    let models = state.refresh_models().await?;
    Ok(Json(serde_json::json!({ "data": models, "object": "list" })))
}

/// Listing for one explicit endpoint; here a discovery failure does surface.
async fn list_endpoint_models(
    State(state): State<Arc<AppState>>,
    Path(url_idx): Path<usize>,
) -> Result<Json<serde_json::Value>, RelayError> {
    let endpoint = state
        .config
        .gemini
        .endpoints
        .get(url_idx)
        .ok_or_else(|| RelayError::Config(format!("no Gemini endpoint at index {url_idx}")))?;

    let client = state.listing_client()?;
    let models =
        registry::fetch_endpoint_models(&client, &endpoint.base_url, &endpoint.api_key).await?;
    Ok(Json(serde_json::json!({ "data": models, "object": "list" })))
}

async fn chat_completions(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatCompletionRequest>,
) -> Result<Response, RelayError> {
    match chat_completion(&state, request).await? {
        ChatOutcome::Completion(response) => Ok(Json(response).into_response()),
        ChatOutcome::Stream(frames) => Ok(sse_response(frames)),
    }
}

fn sse_response(frames: BoxStream<'static, Bytes>) -> Response {
    let body = axum::body::Body::from_stream(frames.map(Ok::<_, std::convert::Infallible>));
    let mut response = Response::new(body);
    let headers = response.headers_mut();
    headers.insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(
        http::header::CACHE_CONTROL,
        http::HeaderValue::from_static("no-cache"),
    );
    headers.insert(
        http::header::CONNECTION,
        http::HeaderValue::from_static("keep-alive"),
    );
    response
}
