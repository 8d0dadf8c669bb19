// Handlers module - browser-facing proxy routes

pub mod auth;
pub mod forward;
pub mod reorder;

use axum::{
    http::{header, HeaderMap},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use bytes::Bytes;
use serde_json::Value;

use crate::error::ProxyError;
use crate::models::CredentialScope;
use crate::proxy::credentials::CredentialStore;
use crate::proxy::server::AppState;
use crate::proxy::token_manager::{CredentialUpdate, Settlement};
use crate::proxy::upstream::ProxyRequest;

fn is_form_payload(content_type: &str) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    content_type.starts_with("multipart/form-data")
        || content_type.starts_with("application/x-www-form-urlencoded")
}

/// Attach the browser's body: nothing when empty, raw bytes for form
/// uploads, parsed JSON otherwise.
pub(crate) fn attach_body(
    request: ProxyRequest,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<ProxyRequest, ProxyError> {
    if body.is_empty() {
        return Ok(request);
    }

    if let Some(content_type) = headers.get(header::CONTENT_TYPE) {
        if content_type.to_str().map(is_form_payload).unwrap_or(false) {
            return Ok(request.form(body, content_type.clone()));
        }
    }

    let value: Value = serde_json::from_slice(&body)
        .map_err(|e| ProxyError::BadRequest(format!("Invalid JSON body: {}", e)))?;
    Ok(request.json(value))
}

/// Apply the settlement's cookie changes, then answer the browser.
pub(crate) fn settle(
    state: &AppState,
    scope: CredentialScope,
    jar: CookieJar,
    result: Result<Settlement, ProxyError>,
) -> Response {
    let settlement = match result {
        Ok(settlement) => settlement,
        Err(e) => return (jar, e).into_response(),
    };

    let mut store = CredentialStore::new(jar, &state.config.cookies);
    match &settlement.update {
        CredentialUpdate::Cleared => {
            store.clear(scope);
            let login = &state.token_manager.scope_config(scope).login_redirect;
            return (store.into_jar(), Redirect::to(login)).into_response();
        }
        CredentialUpdate::Rotated(tokens) => store.store(scope, tokens),
        CredentialUpdate::Unchanged => {}
    }

    (store.into_jar(), settlement.outcome).into_response()
}
