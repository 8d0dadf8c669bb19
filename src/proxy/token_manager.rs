use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::json;
use tokio::sync::OnceCell;

use crate::error::ProxyError;
use crate::models::{CredentialScope, SessionCredentials, TokenPair};
use crate::proxy::config::{ProxyConfig, ScopeConfig};
use crate::proxy::upstream::{ProxyMethod, ProxyOutcome, ProxyRequest, UpstreamClient};

/// Where one request stands with respect to its credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Authenticated(String),
    Refreshing,
    ReAuthRequired,
}

/// What the response must do to the credential cookies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialUpdate {
    Unchanged,
    Rotated(TokenPair),
    /// Both cookies go, browser is sent to the login entry point
    Cleared,
}

#[derive(Debug)]
pub struct Settlement {
    pub outcome: ProxyOutcome,
    pub update: CredentialUpdate,
}

impl Settlement {
    pub fn requires_reauth(&self) -> bool {
        self.update == CredentialUpdate::Cleared
    }
}

#[derive(Debug, Clone)]
pub enum ReissueError {
    /// Upstream answered non-2xx; the refresh token is no good
    Rejected(Option<StatusCode>),
    Transport(String),
    Decode(String),
}

/// Outcome of the one reissue a browser request is allowed. Every upstream
/// call made for that request shares the same slot.
pub type ReissueSlot = OnceCell<Result<TokenPair, ReissueError>>;

/// Runs protected calls and performs at most one token reissue per browser
/// request.
///
/// Separate browser requests holding the same stale token each reissue on
/// their own; the upstream reissue endpoint is assumed to tolerate that.
pub struct TokenManager {
    upstream: Arc<UpstreamClient>,
    user: ScopeConfig,
    admin: ScopeConfig,
}

impl TokenManager {
    pub fn new(upstream: Arc<UpstreamClient>, config: &ProxyConfig) -> Self {
        Self {
            upstream,
            user: config.user.clone(),
            admin: config.admin.clone(),
        }
    }

    pub fn scope_config(&self, scope: CredentialScope) -> &ScopeConfig {
        match scope {
            CredentialScope::User => &self.user,
            CredentialScope::Admin => &self.admin,
        }
    }

    /// Execute `request` under `credentials`.
    ///
    /// Authenticated -> Refreshing on an expired access token when a refresh
    /// token exists, Refreshing -> Authenticated on a successful reissue (the
    /// request is replayed once), anything else ends in ReAuthRequired.
    pub async fn execute(
        &self,
        credentials: &SessionCredentials,
        request: &ProxyRequest,
    ) -> Result<Settlement, ProxyError> {
        self.execute_shared(credentials, request, &ReissueSlot::new()).await
    }

    /// Same as [`execute`](Self::execute), for one of several upstream calls
    /// made on behalf of a single browser request. The first call that needs
    /// a reissue performs it; the others wait for and reuse its result.
    pub async fn execute_shared(
        &self,
        credentials: &SessionCredentials,
        request: &ProxyRequest,
        reissued: &ReissueSlot,
    ) -> Result<Settlement, ProxyError> {
        let mut state = match (credentials.access_token(), credentials.refresh_token()) {
            (Some(access), _) => SessionState::Authenticated(access.to_string()),
            (None, Some(_)) => SessionState::Refreshing,
            (None, None) => return Err(ProxyError::Unauthorized),
        };
        let mut rotated: Option<TokenPair> = None;

        loop {
            state = match state {
                SessionState::Authenticated(token) => {
                    let outcome = self.upstream.dispatch(request, Some(&token)).await?;
                    match outcome {
                        ProxyOutcome::AuthExpired
                            if rotated.is_none() && credentials.refresh_token().is_some() =>
                        {
                            tracing::info!(
                                "Access token expired ({} scope), reissuing",
                                credentials.scope.as_str()
                            );
                            SessionState::Refreshing
                        }
                        ProxyOutcome::AuthExpired => SessionState::ReAuthRequired,
                        outcome => {
                            let update = match rotated {
                                Some(pair) => CredentialUpdate::Rotated(pair),
                                None => CredentialUpdate::Unchanged,
                            };
                            return Ok(Settlement { outcome, update });
                        }
                    }
                }
                SessionState::Refreshing => {
                    // Only reachable with a refresh token and before any reissue
                    let refresh = credentials
                        .refresh_token()
                        .ok_or(ProxyError::Unauthorized)?;
                    let result = reissued
                        .get_or_init(|| self.reissue(credentials.scope, refresh))
                        .await
                        .clone();
                    match result {
                        Ok(pair) => {
                            if pair.refresh_token.is_none() {
                                tracing::debug!("Reissue kept the existing refresh token");
                            }
                            let access = pair.access_token.clone();
                            rotated = Some(pair);
                            SessionState::Authenticated(access)
                        }
                        Err(ReissueError::Rejected(status)) => {
                            tracing::warn!(
                                "Refresh token rejected ({} scope, status {:?})",
                                credentials.scope.as_str(),
                                status
                            );
                            SessionState::ReAuthRequired
                        }
                        Err(ReissueError::Transport(cause)) => {
                            return Err(ProxyError::Transport(cause))
                        }
                        Err(ReissueError::Decode(cause)) => return Err(ProxyError::Decode(cause)),
                    }
                }
                SessionState::ReAuthRequired => {
                    tracing::info!(
                        "Re-authentication required ({} scope)",
                        credentials.scope.as_str()
                    );
                    return Ok(Settlement {
                        outcome: ProxyOutcome::AuthExpired,
                        update: CredentialUpdate::Cleared,
                    });
                }
            };
        }
    }

    /// Exchange a refresh token for a new pair.
    pub async fn reissue(
        &self,
        scope: CredentialScope,
        refresh_token: &str,
    ) -> Result<TokenPair, ReissueError> {
        let scope_config = self.scope_config(scope);
        let url = self
            .upstream
            .endpoint([scope_config.reissue_path.as_str()], None)
            .map_err(|e| ReissueError::Transport(e.to_string()))?;
        let request = ProxyRequest::new(ProxyMethod::Post, url)
            .json(json!({ "refreshToken": refresh_token }));

        let outcome = self
            .upstream
            .dispatch(&request, None)
            .await
            .map_err(|e| ReissueError::Transport(e.to_string()))?;

        match outcome {
            ProxyOutcome::TransportFailure(cause) => Err(ReissueError::Transport(cause)),
            outcome if outcome.is_success() => {
                let pair = outcome.decode::<TokenPair>().map_err(|e| {
                    tracing::error!("Reissue response did not match schema: {}", e);
                    ReissueError::Decode(e.to_string())
                })?;
                pair.into_usable().ok_or_else(|| {
                    tracing::error!("Reissue response carried an empty access token");
                    ReissueError::Decode("empty access token".to_string())
                })
            }
            outcome => Err(ReissueError::Rejected(outcome.status())),
        }
    }
}
