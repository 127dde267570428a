use axum::{extract::Request, middleware::Next, response::Response};
use log::*;
use std::time::Instant;

/// Logs method, path, status and handling time for every request.
///
/// For `/mcp/stream` the time covers opening the stream, not its lifetime.
pub(crate) async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let elapsed = started.elapsed();
    if status.is_server_error() {
        warn!("{method} {path} -> {} ({elapsed:?})", status.as_u16());
    } else {
        info!("{method} {path} -> {} ({elapsed:?})", status.as_u16());
    }

    response
}
