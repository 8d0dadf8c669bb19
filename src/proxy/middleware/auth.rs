// Session credential middleware
use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;

use crate::error::ProxyError;
use crate::models::CredentialScope;
use crate::proxy::credentials::read_credentials;

/// Reads the scope's cookie pair once and hands it to the handler through
/// request extensions. Requests with neither token never reach a handler.
async fn require_session(scope: CredentialScope, mut request: Request, next: Next) -> Response {
    let jar = CookieJar::from_headers(request.headers());
    let credentials = read_credentials(&jar, scope);

    if credentials.is_empty() {
        tracing::info!(
            "Rejecting {} {}: no {} credentials",
            request.method(),
            request.uri().path(),
            scope.as_str()
        );
        return ProxyError::Unauthorized.into_response();
    }

    request.extensions_mut().insert(credentials);
    next.run(request).await
}

pub async fn require_user_session(request: Request, next: Next) -> Response {
    require_session(CredentialScope::User, request, next).await
}

pub async fn require_admin_session(request: Request, next: Next) -> Response {
    require_session(CredentialScope::Admin, request, next).await
}
