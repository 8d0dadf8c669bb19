// Batch reorder: N independent PUTs, joined
use std::fmt;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use axum_extra::extract::CookieJar;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::settle;
use crate::error::ProxyError;
use crate::models::{SessionCredentials, TokenPair};
use crate::proxy::credentials::CredentialStore;
use crate::proxy::server::AppState;
use crate::proxy::token_manager::{CredentialUpdate, ReissueSlot, Settlement};
use crate::proxy::upstream::{ProxyMethod, ProxyOutcome, ProxyRequest};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    Number(i64),
    Text(String),
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemId::Number(n) => write!(f, "{}", n),
            ItemId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReorderItem {
    pub id: ItemId,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub items: Vec<ReorderItem>,
}

/// Joined result of a batch. No rollback: items that succeeded stay updated.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub failed: Vec<ItemId>,
    pub reauth_required: bool,
    pub rotated: Option<TokenPair>,
}

impl BatchReport {
    pub fn collect(results: Vec<(ItemId, Result<Settlement, ProxyError>)>) -> Self {
        let mut report = BatchReport::default();

        for (id, result) in results {
            match result {
                Ok(settlement) => {
                    match settlement.update {
                        CredentialUpdate::Cleared => report.reauth_required = true,
                        CredentialUpdate::Rotated(tokens) => report.rotated = Some(tokens),
                        CredentialUpdate::Unchanged => {}
                    }
                    if !settlement.outcome.is_success() {
                        tracing::warn!(
                            "Reorder of item {} failed (status {:?})",
                            id,
                            settlement.outcome.status()
                        );
                        report.failed.push(id);
                    }
                }
                Err(e) => {
                    tracing::warn!("Reorder of item {} failed: {}", id, e);
                    report.failed.push(id);
                }
            }
        }

        report
    }
}

fn parse_items(body: &[u8]) -> Result<Vec<ReorderItem>, ProxyError> {
    let request: ReorderRequest = serde_json::from_slice(body)
        .map_err(|e| ProxyError::BadRequest(format!("Invalid reorder body: {}", e)))?;
    if request.items.is_empty() {
        return Err(ProxyError::BadRequest("No items to reorder".to_string()));
    }
    Ok(request.items)
}

/// `POST /api/reorder/:resource` and the admin equivalent
pub async fn handle_reorder(
    State(state): State<AppState>,
    Extension(credentials): Extension<SessionCredentials>,
    jar: CookieJar,
    Path(resource): Path<String>,
    body: Bytes,
) -> Response {
    let scope = credentials.scope;
    let scope_config = state.token_manager.scope_config(scope);
    if !scope_config.allows(&resource) {
        return ProxyError::NotFound.into_response();
    }

    let items = match parse_items(&body) {
        Ok(items) => items,
        Err(e) => return e.into_response(),
    };

    let mut requests = Vec::with_capacity(items.len());
    for item in &items {
        let id = item.id.to_string();
        let url = match state.upstream.endpoint(
            [
                scope_config.upstream_prefix.as_str(),
                resource.as_str(),
                id.as_str(),
            ],
            None,
        ) {
            Ok(url) => url,
            Err(e) => return e.into_response(),
        };
        let body = match serde_json::to_value(item) {
            Ok(body) => body,
            Err(e) => return ProxyError::BadRequest(e.to_string()).into_response(),
        };
        requests.push((
            item.id.clone(),
            ProxyRequest::new(ProxyMethod::Put, url).json(body),
        ));
    }

    // Launch all, wait for all. A stale access token is reissued once for
    // the whole batch and every item replays with that pair.
    let reissued = ReissueSlot::new();
    let results = join_all(requests.iter().map(|(id, request)| {
        let token_manager = &state.token_manager;
        let credentials = &credentials;
        let reissued = &reissued;
        async move {
            let result = token_manager
                .execute_shared(credentials, request, reissued)
                .await;
            (id.clone(), result)
        }
    }))
    .await;

    let report = BatchReport::collect(results);

    if report.reauth_required {
        return settle(
            &state,
            scope,
            jar,
            Ok(Settlement {
                outcome: ProxyOutcome::AuthExpired,
                update: CredentialUpdate::Cleared,
            }),
        );
    }

    let mut store = CredentialStore::new(jar, &state.config.cookies);
    if let Some(tokens) = &report.rotated {
        store.store(scope, tokens);
    }

    if report.failed.is_empty() {
        (store.into_jar(), Json(json!({ "isSuccess": true }))).into_response()
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            store.into_jar(),
            Json(json!({ "isSuccess": false, "failed": report.failed })),
        )
            .into_response()
    }
}
