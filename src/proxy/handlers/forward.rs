// Resource pass-through handlers
use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::{HeaderMap, Method},
    response::{IntoResponse, Response},
    Extension,
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;

use super::{attach_body, settle};
use crate::error::ProxyError;
use crate::models::SessionCredentials;
use crate::proxy::server::AppState;
use crate::proxy::upstream::{ProxyMethod, ProxyRequest};

#[derive(Debug, Deserialize)]
pub struct ResourcePath {
    pub resource: String,
    #[serde(default)]
    pub rest: Option<String>,
}

fn scoped_request(
    state: &AppState,
    credentials: &SessionCredentials,
    method: &Method,
    path: &ResourcePath,
    query: Option<&str>,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<ProxyRequest, ProxyError> {
    let scope_config = state.token_manager.scope_config(credentials.scope);
    if !scope_config.allows(&path.resource) {
        return Err(ProxyError::NotFound);
    }

    let method = ProxyMethod::try_from(method)?;
    let url = state.upstream.endpoint(
        [
            scope_config.upstream_prefix.as_str(),
            path.resource.as_str(),
            path.rest.as_deref().unwrap_or_default(),
        ],
        query,
    )?;
    attach_body(ProxyRequest::new(method, url), headers, body)
}

/// `/api/:resource[/*rest]` and the admin equivalent
pub async fn handle_forward(
    State(state): State<AppState>,
    Extension(credentials): Extension<SessionCredentials>,
    jar: CookieJar,
    method: Method,
    Path(path): Path<ResourcePath>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let result = match scoped_request(
        &state,
        &credentials,
        &method,
        &path,
        query.as_deref(),
        &headers,
        body,
    ) {
        Ok(request) => state.token_manager.execute(&credentials, &request).await,
        Err(e) => Err(e),
    };

    settle(&state, credentials.scope, jar, result)
}

/// `/api/public/*path`: no credentials are attached or required
pub async fn handle_public(
    State(state): State<AppState>,
    method: Method,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = ProxyMethod::try_from(&method).and_then(|method| {
        let url = state.upstream.endpoint(
            [state.config.public.upstream_prefix.as_str(), path.as_str()],
            query.as_deref(),
        )?;
        attach_body(ProxyRequest::new(method, url), &headers, body)
    });

    let outcome = match request {
        Ok(request) => state.upstream.dispatch(&request, None).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(outcome) => outcome.into_response(),
        Err(e) => e.into_response(),
    }
}
