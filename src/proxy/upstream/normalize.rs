// Upstream response normalization
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::de::{DeserializeOwned, IgnoredAny};

use crate::error::ProxyError;

const LOGGED_BODY_LIMIT: usize = 512;

/// What a single upstream round-trip amounted to.
#[derive(Debug, Clone)]
pub enum ProxyOutcome {
    /// JSON (or empty) body, any status. Non-2xx bodies carry the upstream's
    /// own error shape and are passed on unchanged.
    Success { status: StatusCode, body: Bytes },
    /// 401 on a request that carried an access token
    AuthExpired,
    /// Reachable upstream, body that is not JSON
    UpstreamError { status: StatusCode, body: String },
    TransportFailure(String),
}

impl ProxyOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProxyOutcome::Success { status, .. } if status.is_success())
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ProxyOutcome::Success { status, .. } | ProxyOutcome::UpstreamError { status, .. } => {
                Some(*status)
            }
            ProxyOutcome::AuthExpired => Some(StatusCode::UNAUTHORIZED),
            ProxyOutcome::TransportFailure(_) => None,
        }
    }

    /// Decode a successful body into its endpoint schema.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ProxyError> {
        match self {
            ProxyOutcome::Success { body, .. } => {
                serde_json::from_slice(body).map_err(|e| ProxyError::Decode(e.to_string()))
            }
            other => Err(ProxyError::Decode(format!(
                "expected a JSON body, got {:?}",
                other.status()
            ))),
        }
    }
}

impl IntoResponse for ProxyOutcome {
    fn into_response(self) -> Response {
        match self {
            ProxyOutcome::Success { status, body } if body.is_empty() => status.into_response(),
            ProxyOutcome::Success { status, body } => {
                (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
            }
            ProxyOutcome::AuthExpired => ProxyError::Unauthorized.into_response(),
            ProxyOutcome::UpstreamError { status, body } => {
                ProxyError::Upstream { status, body }.into_response()
            }
            ProxyOutcome::TransportFailure(cause) => ProxyError::Transport(cause).into_response(),
        }
    }
}

fn truncate_for_log(text: &str) -> String {
    if text.chars().count() <= LOGGED_BODY_LIMIT {
        text.to_string()
    } else {
        let head: String = text.chars().take(LOGGED_BODY_LIMIT).collect();
        format!("{}... (truncated)", head)
    }
}

fn is_json(response: &reqwest::Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase().contains("application/json"))
        .unwrap_or(false)
}

/// Classify a raw upstream response.
pub async fn normalize(response: reqwest::Response, token_supplied: bool) -> ProxyOutcome {
    let status = response.status();

    if status == StatusCode::UNAUTHORIZED && token_supplied {
        return ProxyOutcome::AuthExpired;
    }

    if status == StatusCode::NO_CONTENT {
        return ProxyOutcome::Success {
            status,
            body: Bytes::new(),
        };
    }

    if is_json(&response) {
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => return classify_transport(&e),
        };
        if body.is_empty() {
            return ProxyOutcome::Success { status, body };
        }
        return match serde_json::from_slice::<IgnoredAny>(&body) {
            Ok(_) => ProxyOutcome::Success { status, body },
            Err(e) => {
                let text = String::from_utf8_lossy(&body).into_owned();
                tracing::error!(
                    "Upstream declared JSON but sent invalid body (HTTP {}): {}: {}",
                    status,
                    e,
                    truncate_for_log(&text)
                );
                ProxyOutcome::UpstreamError { status, body: text }
            }
        };
    }

    match response.text().await {
        Ok(text) => {
            tracing::error!(
                "Upstream returned non-JSON body (HTTP {}): {}",
                status,
                truncate_for_log(&text)
            );
            ProxyOutcome::UpstreamError { status, body: text }
        }
        Err(e) => classify_transport(&e),
    }
}

pub fn classify_transport(error: &reqwest::Error) -> ProxyOutcome {
    let kind = if error.is_timeout() {
        "timeout"
    } else if error.is_connect() {
        "connect"
    } else {
        "transport"
    };
    tracing::error!("Upstream {} failure: {}", kind, error);
    ProxyOutcome::TransportFailure(format!("{}: {}", kind, error))
}
