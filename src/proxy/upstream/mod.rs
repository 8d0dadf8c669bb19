pub mod client;
pub mod normalize;

pub use client::{ProxyMethod, ProxyRequest, RequestBody, UpstreamClient};
pub use normalize::ProxyOutcome;
