use bytes::Bytes;
use futures_util::stream::BoxStream;

use crate::error::RelayError;
use crate::protocol::gemini::GeminiResponse;
use crate::protocol::openai::{ChatCompletionRequest, ChatCompletionResponse};
use crate::state::AppState;
use crate::stream::{transcode_byte_stream, StreamTranscoder};
use crate::translate::{decode_gemini_response, encode_gemini_request};

/// Outcome of a completion call: one translated response, or a live stream of
/// OpenAI SSE frames.
pub enum ChatOutcome {
    Completion(ChatCompletionResponse),
    Stream(BoxStream<'static, Bytes>),
}

impl std::fmt::Debug for ChatOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatOutcome::Completion(resp) => f.debug_tuple("Completion").field(resp).finish(),
            ChatOutcome::Stream(_) => f.debug_tuple("Stream").finish(),
        }
    }
}

/// Run one chat completion against the endpoint the requested model routes
/// to.
///
/// # Errors
///
/// Returns [`RelayError::Config`] when the Gemini API is disabled or the
/// model's endpoint index is out of range, [`RelayError::ModelNotFound`] for
/// unknown models, [`RelayError::Upstream`] on non-2xx provider responses,
/// and [`RelayError::Transport`] / [`RelayError::Translation`] on connection
/// and decoding failures.
pub async fn chat_completion(
    state: &AppState,
    request: ChatCompletionRequest,
) -> Result<ChatOutcome, RelayError> {
    let settings = &state.config.gemini;
    if !settings.enable {
        return Err(RelayError::Config("Gemini API is disabled".to_string()));
    }

    let target = state.resolve_model(&request.model).await?;
    let endpoint = settings.endpoints.get(target.url_idx).ok_or_else(|| {
        RelayError::Config(format!(
            "model '{}' routes to missing endpoint index {}",
            request.model, target.url_idx
        ))
    })?;

    let payload = encode_gemini_request(&request);
    let upstream_model = clean_model_id(&target.upstream_id);
    let stream = request.wants_stream();
    let url = build_generate_url(
        endpoint.trimmed_base_url(),
        upstream_model,
        &endpoint.api_key,
        stream,
    );

    tracing::debug!(
        model = %request.model,
        upstream_model,
        url_idx = target.url_idx,
        stream,
        "dispatching Gemini completion"
    );

    // Scoped per-call client: dropped on every exit path, including
    // cancellation, so per-call timeouts never leak across requests.
    let client = state.completion_client()?;
    let response = client
        .post(&url)
        .json(&payload)
        .send()
        .await
        .map_err(|err| RelayError::Transport(err.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(RelayError::Upstream {
            status: status.as_u16(),
            body,
        });
    }

    if stream {
        let transcoder = StreamTranscoder::new(&request.model);
        let frames = transcode_byte_stream(response.bytes_stream(), transcoder);
        Ok(ChatOutcome::Stream(Box::pin(frames)))
    } else {
        let gemini: GeminiResponse = response.json().await.map_err(|err| {
            RelayError::Translation(format!("failed to decode Gemini response: {err}"))
        })?;
        Ok(ChatOutcome::Completion(decode_gemini_response(
            &gemini,
            &request.model,
        )))
    }
}

/// Strip a leading `models/` path segment and any leading `/` from a
/// provider-side model id.
#[must_use]
pub fn clean_model_id(raw: &str) -> &str {
    let id = raw.strip_prefix("models/").unwrap_or(raw);
    id.strip_prefix('/').unwrap_or(id)
}

/// Build the generateContent / streamGenerateContent URL for one call.
#[must_use]
pub fn build_generate_url(base_url: &str, model_id: &str, api_key: &str, stream: bool) -> String {
    if stream {
        format!("{base_url}/models/{model_id}:streamGenerateContent?alt=sse&key={api_key}")
    } else {
        format!("{base_url}/models/{model_id}:generateContent?key={api_key}")
    }
}
