// Login / logout handlers for both credential scopes
use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Json, Response},
};
use axum_extra::extract::CookieJar;
use serde_json::json;

use super::attach_body;
use crate::error::ProxyError;
use crate::models::{CredentialScope, TokenPair};
use crate::proxy::credentials::{read_credentials, CredentialStore};
use crate::proxy::server::AppState;
use crate::proxy::upstream::{ProxyMethod, ProxyOutcome, ProxyRequest};

pub async fn handle_user_login(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    login(&state, CredentialScope::User, jar, &headers, body).await
}

pub async fn handle_admin_login(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    login(&state, CredentialScope::Admin, jar, &headers, body).await
}

pub async fn handle_user_logout(State(state): State<AppState>, jar: CookieJar) -> Response {
    logout(&state, CredentialScope::User, jar).await
}

pub async fn handle_admin_logout(State(state): State<AppState>, jar: CookieJar) -> Response {
    logout(&state, CredentialScope::Admin, jar).await
}

async fn request_login(
    state: &AppState,
    scope: CredentialScope,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<ProxyOutcome, ProxyError> {
    let login_path = &state.token_manager.scope_config(scope).login_path;
    let url = state.upstream.endpoint([login_path.as_str()], None)?;
    let request = attach_body(ProxyRequest::new(ProxyMethod::Post, url), headers, body)?;
    state.upstream.dispatch(&request, None).await
}

async fn login(
    state: &AppState,
    scope: CredentialScope,
    jar: CookieJar,
    headers: &HeaderMap,
    body: Bytes,
) -> Response {
    let outcome = match request_login(state, scope, headers, body).await {
        Ok(outcome) => outcome,
        Err(e) => return e.into_response(),
    };

    // Wrong password and friends: the upstream's JSON goes back as-is
    if !outcome.is_success() {
        tracing::info!(
            "{} login refused by upstream ({:?})",
            scope.as_str(),
            outcome.status()
        );
        return outcome.into_response();
    }

    let tokens = match outcome.decode::<TokenPair>().and_then(|tokens| {
        tokens
            .into_usable()
            .ok_or_else(|| ProxyError::Decode("empty access token".to_string()))
    }) {
        Ok(tokens) => tokens,
        Err(e) => return e.into_response(),
    };

    let mut store = CredentialStore::new(jar, &state.config.cookies);
    store.clear(scope);
    store.store(scope, &tokens);
    tracing::info!("{} login succeeded", scope.as_str());

    (store.into_jar(), Json(json!({ "isSuccess": true }))).into_response()
}

/// Always succeeds locally; the upstream call is best effort.
async fn logout(state: &AppState, scope: CredentialScope, jar: CookieJar) -> Response {
    let credentials = read_credentials(&jar, scope);

    if let Some(token) = credentials.access_token() {
        let logout_path = &state.token_manager.scope_config(scope).logout_path;
        let outcome = match state.upstream.endpoint([logout_path.as_str()], None) {
            Ok(url) => {
                state
                    .upstream
                    .dispatch(&ProxyRequest::new(ProxyMethod::Post, url), Some(token))
                    .await
            }
            Err(e) => Err(e),
        };
        match outcome {
            Ok(outcome) if outcome.is_success() => {}
            Ok(outcome) => tracing::warn!(
                "Upstream {} logout not acknowledged ({:?})",
                scope.as_str(),
                outcome.status()
            ),
            Err(e) => tracing::warn!("Upstream {} logout failed: {}", scope.as_str(), e),
        }
    }

    let mut store = CredentialStore::new(jar, &state.config.cookies);
    store.clear(scope);
    (store.into_jar(), Json(json!({ "isSuccess": true }))).into_response()
}
