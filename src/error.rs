/// Error type shared by every module of the relay.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Model not found: {0}")]
    ModelNotFound(String),
    #[error("Gemini API error: status={status}, body={body}")]
    Upstream { status: u16, body: String },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Translation error: {0}")]
    Translation(String),
}

impl RelayError {
    /// HTTP status this error surfaces as.
    #[must_use]
    pub fn status_code(&self) -> http::StatusCode {
        match self {
            RelayError::Config(_) => http::StatusCode::BAD_REQUEST,
            RelayError::ModelNotFound(_) => http::StatusCode::NOT_FOUND,
            RelayError::Upstream { status, .. } => upstream_status_code(*status),
            RelayError::Transport(_) | RelayError::Translation(_) => {
                http::StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            RelayError::Config(_) | RelayError::ModelNotFound(_) => "invalid_request_error",
            RelayError::Upstream { status, .. } => match *status {
                401 => "authentication_error",
                403 => "permission_error",
                429 => "rate_limit_error",
                _ => "server_error",
            },
            RelayError::Transport(_) | RelayError::Translation(_) => "server_error",
        }
    }

    /// OpenAI-shaped error body: `{"error": {"message", "type"}}`.
    #[must_use]
    pub fn error_body(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "message": self.to_string(),
                "type": self.error_type(),
            }
        })
    }
}

/// Map an upstream HTTP status onto the status we answer with. Client-side
/// statuses are forwarded; anything else becomes a bad-gateway response.
fn upstream_status_code(status: u16) -> http::StatusCode {
    match status {
        400 => http::StatusCode::BAD_REQUEST,
        401 => http::StatusCode::UNAUTHORIZED,
        403 => http::StatusCode::FORBIDDEN,
        404 => http::StatusCode::NOT_FOUND,
        429 => http::StatusCode::TOO_MANY_REQUESTS,
        _ => http::StatusCode::BAD_GATEWAY,
    }
}

impl axum::response::IntoResponse for RelayError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        (status, axum::Json(self.error_body())).into_response()
    }
}
