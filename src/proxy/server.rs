use crate::error::AppResult;
use crate::proxy::{ProxyConfig, TokenManager, UpstreamClient};
use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn,
    response::{IntoResponse, Json, Response},
    routing::{any, get, post},
    Router,
};
use std::sync::Arc;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

/// Axum application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProxyConfig>,
    pub upstream: Arc<UpstreamClient>,
    pub token_manager: Arc<TokenManager>,
}

impl AppState {
    pub fn new(config: ProxyConfig) -> AppResult<Self> {
        let upstream = Arc::new(UpstreamClient::new(&config)?);
        let token_manager = Arc::new(TokenManager::new(upstream.clone(), &config));
        Ok(Self {
            config: Arc::new(config),
            upstream,
            token_manager,
        })
    }
}

/// Build the gateway router
pub fn build_router(state: AppState) -> Router {
    use crate::proxy::handlers;
    use crate::proxy::middleware;

    // Logged-in app (user cookie pair)
    let user_routes = Router::new()
        .route("/api/reorder/:resource", post(handlers::reorder::handle_reorder))
        .route("/api/:resource", any(handlers::forward::handle_forward))
        .route("/api/:resource/*rest", any(handlers::forward::handle_forward))
        .route_layer(from_fn(middleware::require_user_session));

    // Admin console (admin cookie pair)
    let admin_routes = Router::new()
        .route(
            "/admin/api/reorder/:resource",
            post(handlers::reorder::handle_reorder),
        )
        .route("/admin/api/:resource", any(handlers::forward::handle_forward))
        .route(
            "/admin/api/:resource/*rest",
            any(handlers::forward::handle_forward),
        )
        .route_layer(from_fn(middleware::require_admin_session));

    // Public portal, session entry points, health
    let open_routes = Router::new()
        .route("/api/auth/login", post(handlers::auth::handle_user_login))
        .route("/api/auth/logout", post(handlers::auth::handle_user_logout))
        .route(
            "/admin/api/auth/login",
            post(handlers::auth::handle_admin_login),
        )
        .route(
            "/admin/api/auth/logout",
            post(handlers::auth::handle_admin_logout),
        )
        .route("/api/public/*path", any(handlers::forward::handle_public))
        .route("/healthz", get(health_check_handler));

    let cors = middleware::cors_layer(&state.config.allowed_origins);

    Router::new()
        .merge(open_routes)
        .merge(user_routes)
        .merge(admin_routes)
        .layer(DefaultBodyLimit::max(100 * 1024 * 1024))
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(middleware::request_logger))
        .layer(cors)
        .with_state(state)
}

/// Axum server instance
pub struct AxumServer {
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl AxumServer {
    /// Start Axum server
    pub async fn start(
        host: String,
        port: u16,
        state: AppState,
    ) -> Result<(Self, tokio::task::JoinHandle<()>), String> {
        let upstream = state.upstream.base_url().to_string();
        let app = build_router(state);

        // Bind address
        let addr = format!("{}:{}", host, port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| format!("Failed to bind address {}: {}", addr, e))?;

        tracing::info!("Gateway started at http://{} -> {}", addr, upstream);

        // Create shutdown channel
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        // Start server in new task
        let handle = tokio::spawn(async move {
            use hyper::server::conn::http1;
            use hyper_util::rt::TokioIo;
            use hyper_util::service::TowerToHyperService;

            loop {
                tokio::select! {
                    res = listener.accept() => {
                        match res {
                            Ok((stream, _)) => {
                                let io = TokioIo::new(stream);
                                let service = TowerToHyperService::new(app.clone());

                                // Each connection runs on its own task; a dropped
                                // browser does not cancel upstream calls in flight
                                tokio::task::spawn(async move {
                                    if let Err(err) = http1::Builder::new()
                                        .serve_connection(io, service)
                                        .await
                                    {
                                        debug!("Connection handling finished or errored: {:?}", err);
                                    }
                                });
                            }
                            Err(e) => {
                                error!("Failed to accept connection: {:?}", e);
                            }
                        }
                    }
                    _ = &mut shutdown_rx => {
                        tracing::info!("Gateway stopped listening");
                        break;
                    }
                }
            }
        });

        Ok((
            Self {
                shutdown_tx: Some(shutdown_tx),
            },
            handle,
        ))
    }

    /// Stop server
    pub fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Health check handler
async fn health_check_handler() -> Response {
    Json(serde_json::json!({
        "status": "ok"
    }))
    .into_response()
}
