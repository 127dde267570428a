use log::*;
use service::AppState;
use sse::Manager;
use std::sync::Arc;

mod controller;
pub mod error;
mod middleware;
pub mod router;
mod stream;

/// Bind the configured address, start the streaming hub and serve until ctrl-c.
///
/// On shutdown the hub is stopped first, which ends every open stream, so the
/// graceful drain of the listener does not wait on long-lived connections.
pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let server_url = format!(
        "{}:{}",
        app_state.config.interface(),
        app_state.config.port
    );
    let listener = tokio::net::TcpListener::bind(&server_url).await?;

    let manager = app_state.sse_manager.clone();
    manager.start();

    info!("Server starting... listening for connections on http://{server_url}");

    axum::serve(listener, router::define_routes(app_state))
        .with_graceful_shutdown(shutdown_signal(manager))
        .await
}

async fn shutdown_signal(manager: Arc<Manager>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }

    info!("Shutdown signal received, stopping stream hub");
    manager.stop().await;
}
