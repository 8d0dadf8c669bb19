use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use tracing::Instrument;

/// Per-request span with a generated id; logs method, path, status and
/// latency. Headers are not logged since they carry credentials.
pub async fn request_logger(request: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().simple().to_string();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let span = tracing::info_span!("request", id = %request_id);

    async move {
        let started = Instant::now();
        let response = next.run(request).await;
        let status = response.status();
        let elapsed = started.elapsed().as_millis();

        if status.is_server_error() {
            tracing::warn!("{} {} -> {} ({} ms)", method, path, status.as_u16(), elapsed);
        } else {
            tracing::info!("{} {} -> {} ({} ms)", method, path, status.as_u16(), elapsed);
        }
        response
    }
    .instrument(span)
    .await
}
