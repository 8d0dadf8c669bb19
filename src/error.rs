use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),
}

// Serialize as a plain message, the same shape handlers use for errors
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Failures surfaced to the browser by proxy routes.
///
/// Upstream detail is logged where the error is raised and never ends up in
/// the response body.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Upstream returned unexpected body (HTTP {status})")]
    Upstream { status: StatusCode, body: String },

    #[error("Upstream unreachable: {0}")]
    Transport(String),

    #[error("Upstream response did not match schema: {0}")]
    Decode(String),

    #[error("Not found")]
    NotFound,

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("{0}")]
    BadRequest(String),
}

pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Unauthorized => StatusCode::UNAUTHORIZED,
            ProxyError::Upstream { .. } | ProxyError::Transport(_) | ProxyError::Decode(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ProxyError::NotFound => StatusCode::NOT_FOUND,
            ProxyError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ProxyError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn public_message(&self) -> String {
        match self {
            ProxyError::Upstream { .. } | ProxyError::Transport(_) | ProxyError::Decode(_) => {
                INTERNAL_ERROR_MESSAGE.to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Proxy request failed: {}", self);
        }
        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}
