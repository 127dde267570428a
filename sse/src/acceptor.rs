use crate::connection::{Connection, ConnectionId};
use crate::error::Error;
use crate::message::{Event, EventType};
use crate::sink::Sink;
use crate::Manager;
use chrono::Utc;
use log::*;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;

/// Lifecycle glue between the HTTP front end and the [`Manager`].
///
/// For every accepted long-lived connection it registers a [`Connection`],
/// greets it with a `connected` event and then waits until either the client
/// goes away or the connection is closed by the hub, before unregistering it.
#[derive(Clone)]
pub struct Acceptor {
    manager: Arc<Manager>,
}

/// Unregisters the connection when dropped, so a cancelled serving task
/// still cleans up.
struct Registration {
    manager: Arc<Manager>,
    connection: Arc<Connection>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.connection.close();
        self.manager.unregister_connection(self.connection.id());
    }
}

impl Acceptor {
    pub fn new(manager: Arc<Manager>) -> Self {
        Self { manager }
    }

    /// Serve one connection until it ends and return its id.
    ///
    /// `disconnected` resolves when the front end observes that the client
    /// went away. Returns an error straight away if the hub has been stopped.
    pub async fn accept<S, F>(&self, sink: S, disconnected: F) -> Result<ConnectionId, Error>
    where
        S: Sink + 'static,
        F: Future<Output = ()>,
    {
        let connection = self.manager.register_connection(sink)?;
        let connection_id = connection.id().clone();
        let registration = Registration {
            manager: self.manager.clone(),
            connection: connection.clone(),
        };

        info!("SSE client connected: {connection_id}");

        self.manager
            .send_to(
                &connection_id,
                Event::Connected.event_type(),
                &json!({
                    "clientId": connection_id.as_str(),
                    "message": "Connected to MCP stream",
                    "protocolVersion": protocol::MCP_VERSION,
                }),
            )
            .await;

        tokio::select! {
            _ = disconnected => {
                info!("SSE client disconnected (client went away): {connection_id}");
            }
            _ = connection.closed() => {
                info!("SSE client disconnected (connection closed): {connection_id}");
            }
        }

        drop(registration);
        debug!(
            "SSE connection {connection_id} lasted {}s",
            (Utc::now() - connection.connected_at()).num_seconds()
        );
        Ok(connection_id)
    }
}
