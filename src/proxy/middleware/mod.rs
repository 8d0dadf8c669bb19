// Middleware module - Axum middleware

pub mod auth;
pub mod cors;
pub mod logging;

pub use auth::{require_admin_session, require_user_session};
pub use cors::cors_layer;
pub use logging::request_logger;
