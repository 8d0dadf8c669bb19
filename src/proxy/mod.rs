// proxy module - cookie-session API gateway

pub mod config;
pub mod credentials;
pub mod server;
pub mod token_manager;

pub mod handlers; // API endpoint handlers
pub mod middleware; // Axum middleware
pub mod upstream; // Upstream client and response normalization

#[cfg(test)]
pub(crate) mod test_support;

pub use config::ProxyConfig;
pub use credentials::CredentialStore;
pub use server::{AppState, AxumServer};
pub use token_manager::TokenManager;
pub use upstream::UpstreamClient;
