pub mod config;
pub mod session;

pub use config::{AppConfig, LoggingConfig};
pub use session::{CredentialScope, SessionCredentials, TokenPair};
