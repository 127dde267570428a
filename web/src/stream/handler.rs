use async_stream::stream;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use log::*;
use service::AppState;
use sse::error::ErrorKind;
use sse::ChannelSink;
use std::convert::Infallible;
use tokio::sync::mpsc;

/// SSE handler that establishes a long-lived connection for streamed MCP messages.
///
/// The connection is served by the hub's acceptor on its own task; the
/// response stream turns each frame the acceptor writes into an SSE event.
/// When the client goes away the stream is dropped, the channel closes and
/// the acceptor unregisters the connection.
pub(crate) async fn sse_handler(
    State(app_state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, mut rx) = mpsc::channel(app_state.config.stream_channel_capacity());
    let client_gone = tx.clone();
    let acceptor = app_state.sse_acceptor.clone();

    tokio::spawn(async move {
        let disconnected = async move { client_gone.closed().await };
        match acceptor.accept(ChannelSink::new(tx), disconnected).await {
            Ok(connection_id) => debug!("SSE connection {connection_id} finished"),
            Err(e) if e.error_kind == ErrorKind::HubStopped => {
                info!("Refused SSE connection, stream hub is stopped")
            }
            Err(e) => error!("Failed to accept SSE connection: {e}"),
        }
    });

    let stream = stream! {
        while let Some(frame) = rx.recv().await {
            yield Ok::<_, Infallible>(Event::default()
                .event(frame.event_type())
                .data(frame.data_json()));
        }
        debug!("SSE response stream closed");
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
