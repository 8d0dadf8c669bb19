// In-process stand-in for the upstream REST API
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use bytes::Bytes;
use serde_json::{json, Value};

use crate::proxy::config::ProxyConfig;

#[derive(Default)]
pub struct Hits {
    pub records: AtomicUsize,
    pub reissue: AtomicUsize,
    pub always_401: AtomicUsize,
    pub templates: AtomicUsize,
    pub login: AtomicUsize,
    pub logout: AtomicUsize,
    pub staff: AtomicUsize,
    pub other: AtomicUsize,
    seen_tokens: Mutex<Vec<String>>,
    // Refresh tokens are single use, as with rotating upstreams
    r1_spent: AtomicBool,
}

impl Hits {
    pub fn tokens(&self) -> Vec<String> {
        self.seen_tokens.lock().unwrap().clone()
    }

    pub fn total(&self) -> usize {
        [
            &self.records,
            &self.reissue,
            &self.always_401,
            &self.templates,
            &self.login,
            &self.logout,
            &self.staff,
            &self.other,
        ]
        .iter()
        .map(|c| c.load(Ordering::SeqCst))
        .sum()
    }

    fn bearer(&self, headers: &HeaderMap) -> Option<String> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_string)?;
        self.seen_tokens.lock().unwrap().push(token.clone());
        Some(token)
    }
}

pub struct MockUpstream {
    pub base_url: String,
    pub hits: Arc<Hits>,
}

fn expired() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "token expired" })),
    )
        .into_response()
}

async fn records(State(hits): State<Arc<Hits>>, headers: HeaderMap) -> Response {
    hits.records.fetch_add(1, Ordering::SeqCst);
    match hits.bearer(&headers).as_deref() {
        Some("abc") | Some("new1") => Json(json!({ "records": [] })).into_response(),
        _ => expired(),
    }
}

async fn delete_record(State(hits): State<Arc<Hits>>, headers: HeaderMap) -> Response {
    hits.records.fetch_add(1, Ordering::SeqCst);
    match hits.bearer(&headers) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => expired(),
    }
}

async fn always_401(State(hits): State<Arc<Hits>>, headers: HeaderMap) -> Response {
    hits.always_401.fetch_add(1, Ordering::SeqCst);
    hits.bearer(&headers);
    expired()
}

async fn broken(State(hits): State<Arc<Hits>>) -> Response {
    hits.other.fetch_add(1, Ordering::SeqCst);
    (
        StatusCode::BAD_GATEWAY,
        [(header::CONTENT_TYPE, "text/html")],
        "<html><body>502 Bad Gateway</body></html>",
    )
        .into_response()
}

async fn reissue(State(hits): State<Arc<Hits>>, Json(body): Json<Value>) -> Response {
    hits.reissue.fetch_add(1, Ordering::SeqCst);
    match body["refreshToken"].as_str() {
        Some("r1") if !hits.r1_spent.swap(true, Ordering::SeqCst) => {
            Json(json!({ "accessToken": "new1", "refreshToken": "r2" })).into_response()
        }
        Some("staff-r") => Json(json!({ "access_token": "staff-new" })).into_response(),
        Some("bad-shape") => Json(json!({ "token": "x" })).into_response(),
        Some("empty-access") => Json(json!({ "accessToken": "" })).into_response(),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "refresh token revoked" })),
        )
            .into_response(),
    }
}

async fn login(State(hits): State<Arc<Hits>>, Json(body): Json<Value>) -> Response {
    hits.login.fetch_add(1, Ordering::SeqCst);
    if body["password"] == "pw" {
        Json(json!({ "accessToken": "abc", "refreshToken": "r1", "name": "Kim" })).into_response()
    } else if body["password"] == "blank" {
        Json(json!({ "accessToken": "", "refreshToken": "r1" })).into_response()
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid credentials" })),
        )
            .into_response()
    }
}

async fn logout(State(hits): State<Arc<Hits>>, headers: HeaderMap) -> StatusCode {
    hits.logout.fetch_add(1, Ordering::SeqCst);
    hits.bearer(&headers);
    StatusCode::NO_CONTENT
}

async fn update_template(
    State(hits): State<Arc<Hits>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    hits.templates.fetch_add(1, Ordering::SeqCst);
    if !matches!(hits.bearer(&headers).as_deref(), Some("abc") | Some("new1")) {
        return expired();
    }
    if id == "2" {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "constraint violation" })),
        )
            .into_response();
    }
    Json(json!({ "id": id, "updated": body })).into_response()
}

async fn list_templates(State(hits): State<Arc<Hits>>, headers: HeaderMap) -> Response {
    hits.templates.fetch_add(1, Ordering::SeqCst);
    let authorized = hits.bearer(&headers).is_some();
    Json(json!({ "templates": ["classic"], "authorized": authorized })).into_response()
}

async fn upload(State(hits): State<Arc<Hits>>, headers: HeaderMap, body: Bytes) -> Response {
    hits.other.fetch_add(1, Ordering::SeqCst);
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    Json(json!({ "contentType": content_type, "size": body.len() })).into_response()
}

async fn staff(State(hits): State<Arc<Hits>>, headers: HeaderMap) -> Response {
    hits.staff.fetch_add(1, Ordering::SeqCst);
    match hits.bearer(&headers).as_deref() {
        Some("staff-a") | Some("staff-new") => Json(json!({ "staff": [] })).into_response(),
        _ => expired(),
    }
}

pub async fn spawn_upstream() -> MockUpstream {
    let hits = Arc::new(Hits::default());

    let app = Router::new()
        .route("/records", get(records))
        .route("/records/:id", get(records).delete(delete_record))
        .route("/always-401", get(always_401))
        .route("/broken", get(broken))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/reissue", post(reissue))
        .route("/admin/auth/reissue", post(reissue))
        .route("/admin/staff", get(staff))
        .route("/templates", get(list_templates))
        .route("/templates/:id", put(update_template))
        .route("/resumes/upload", post(upload))
        .with_state(hits.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockUpstream {
        base_url: format!("http://{}", addr),
        hits,
    }
}

pub fn test_config(base_url: &str) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.upstream_base_url = base_url.to_string();
    config.cookies.secure = false;
    config
}
