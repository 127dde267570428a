use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use service::AppState;

/// GET liveness probe
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "mcp-stream-hub",
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}

/// GET readiness probe with the current streaming status
pub async fn ready(State(app_state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ready",
            "connected_clients": app_state.streamer.connected_count(),
            "streaming_enabled": app_state.streamer.is_streaming_enabled(),
        })),
    )
}
