use crate::controller::ApiResponse;
use crate::error::Result;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use log::*;
use protocol::Message as ProtocolMessage;
use serde::Deserialize;
use serde_json::json;
use service::AppState;
use sse::message::MessageScope;

#[derive(Debug, Deserialize)]
pub struct PublishParams {
    /// Deliver only to this stream client instead of broadcasting.
    pub client_id: Option<String>,
}

/// POST a JSON-RPC message to be streamed to connected clients.
pub async fn publish(
    State(app_state): State<AppState>,
    Query(params): Query<PublishParams>,
    Json(message): Json<ProtocolMessage>,
) -> Result<impl IntoResponse> {
    message.validate()?;

    let scope = match params.client_id {
        Some(client_id) => MessageScope::Connection {
            connection_id: client_id.into(),
        },
        None => MessageScope::Broadcast,
    };
    debug!("Publishing message {:?} with scope {scope:?}", message.method);

    app_state.streamer.stream(&message, &scope).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::new(
            StatusCode::ACCEPTED.into(),
            json!({ "connected_clients": app_state.streamer.connected_count() }),
        )),
    ))
}
