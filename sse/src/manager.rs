use crate::connection::{Connection, ConnectionId, ConnectionRegistry};
use crate::error::Error;
use crate::heartbeat::{Heartbeat, DEFAULT_HEARTBEAT_INTERVAL};
use crate::message::Frame;
use crate::sink::Sink;
use crate::streamer::DeliveryTarget;
use async_trait::async_trait;
use log::*;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Tunables for a [`Manager`].
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub heartbeat_interval: Duration,
    /// Upper bound on a single write+flush. `None` waits indefinitely.
    pub write_timeout: Option<Duration>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            write_timeout: Some(DEFAULT_WRITE_TIMEOUT),
        }
    }
}

/// Owns the connection registry and the heartbeat loop for one hub instance.
pub struct Manager {
    registry: Arc<ConnectionRegistry>,
    heartbeat: Heartbeat,
}

impl Manager {
    pub fn new(settings: Settings) -> Self {
        Self {
            registry: Arc::new(ConnectionRegistry::with_write_timeout(
                settings.write_timeout,
            )),
            heartbeat: Heartbeat::new(settings.heartbeat_interval),
        }
    }

    /// Begin sending heartbeats and accept connections again after a `stop`.
    pub fn start(&self) {
        self.registry.reopen();
        self.heartbeat.start(self.registry.clone());
    }

    pub fn is_running(&self) -> bool {
        self.heartbeat.is_running()
    }

    /// Stop the heartbeat loop, then close and drop every connection.
    ///
    /// When this returns the registry is empty, no connection that was
    /// registered before the call will be written to again, and new
    /// registrations fail until the next `start`.
    pub async fn stop(&self) {
        self.heartbeat.stop().await;
        let closed = self.registry.close_all();
        info!("Stream manager stopped, closed {closed} connection(s)");
    }

    /// Register a new connection with a fresh id. Fails with
    /// [`ErrorKind::HubStopped`](crate::error::ErrorKind::HubStopped) once the
    /// hub has been stopped.
    pub fn register_connection(&self, sink: impl Sink + 'static) -> Result<Arc<Connection>, Error> {
        let connection = Arc::new(Connection::new(ConnectionId::new(), sink));
        self.registry.add(connection.clone())?;
        info!("Registered SSE connection {}", connection.id());
        Ok(connection)
    }

    /// Unregister a connection by ID
    pub fn unregister_connection(&self, connection_id: &ConnectionId) {
        if self.registry.remove(connection_id).is_some() {
            info!("Unregistered SSE connection {connection_id}");
        }
    }

    pub fn connection(&self, connection_id: &ConnectionId) -> Option<Arc<Connection>> {
        self.registry.get(connection_id)
    }

    pub fn connected_count(&self) -> usize {
        self.registry.count()
    }

    /// Broadcast a payload to every live connection.
    pub async fn broadcast(&self, event_type: &str, payload: &Value) {
        if self.registry.count() == 0 {
            return;
        }
        let frame = Frame::new(event_type, payload);
        let offered = self.registry.broadcast(&frame).await;
        debug!("Broadcast {event_type} event to {offered} connection(s)");
    }

    /// Send a payload to a single connection. An unknown id is logged and ignored.
    pub async fn send_to(&self, connection_id: &ConnectionId, event_type: &str, payload: &Value) {
        let frame = Frame::new(event_type, payload);
        if !self.registry.send_to(connection_id, &frame).await {
            warn!("Attempted to send {event_type} event to unknown connection {connection_id}");
        }
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

#[async_trait]
impl DeliveryTarget for Manager {
    async fn broadcast(&self, event_type: &str, payload: &Value) {
        Manager::broadcast(self, event_type, payload).await
    }

    async fn send_to(&self, connection_id: &ConnectionId, event_type: &str, payload: &Value) {
        Manager::send_to(self, connection_id, event_type, payload).await
    }

    fn connected_count(&self) -> usize {
        Manager::connected_count(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::tests::{FailingSink, RecordingSink, StalledSink};
    use crate::error::ErrorKind;
    use serde_json::json;

    #[tokio::test]
    async fn test_register_and_unregister() {
        let manager = Manager::default();
        let connection = manager.register_connection(RecordingSink::default()).unwrap();
        assert_eq!(manager.connected_count(), 1);
        assert!(manager.connection(connection.id()).is_some());

        manager.unregister_connection(connection.id());
        manager.unregister_connection(connection.id());
        assert_eq!(manager.connected_count(), 0);
    }

    #[tokio::test]
    async fn test_broadcast_with_no_connections_is_noop() {
        let manager = Manager::default();
        manager.broadcast("message-request", &json!({})).await;
        assert_eq!(manager.connected_count(), 0);
    }

    #[tokio::test]
    async fn test_send_to_targets_only_named_connection() {
        let manager = Manager::default();
        let target = RecordingSink::default();
        let other = RecordingSink::default();
        let connection = manager.register_connection(target.clone()).unwrap();
        manager.register_connection(other.clone()).unwrap();

        manager
            .send_to(connection.id(), "message-response", &json!({"ok": true}))
            .await;

        assert_eq!(target.event_types(), vec!["message-response".to_string()]);
        assert!(other.frames().is_empty());
    }

    #[tokio::test]
    async fn test_send_to_unknown_connection_delivers_nothing() {
        let manager = Manager::default();
        let sink = RecordingSink::default();
        manager.register_connection(sink.clone()).unwrap();

        manager
            .send_to(&ConnectionId::from("nonexistent"), "message-response", &json!({}))
            .await;

        assert!(sink.frames().is_empty());
    }

    #[tokio::test]
    async fn test_stop_drains_all_connections() {
        let manager = Manager::default();
        manager.start();
        let sinks: Vec<_> = (0..5).map(|_| RecordingSink::default()).collect();
        let connections: Vec<_> = sinks
            .iter()
            .map(|s| manager.register_connection(s.clone()).unwrap())
            .collect();

        manager.stop().await;

        assert_eq!(manager.connected_count(), 0);
        assert!(!manager.is_running());
        assert!(connections.iter().all(|c| c.is_closed()));

        // Held handles are closed, so direct delivery is a no-op too.
        connections[0]
            .deliver(&Frame::new("heartbeat", &json!({})), None)
            .await;
        manager.broadcast("message-notification", &json!({})).await;
        assert!(sinks.iter().all(|s| s.frames().is_empty()));
    }

    #[tokio::test]
    async fn test_register_after_stop_is_rejected_until_restart() {
        let manager = Manager::default();
        manager.start();
        manager.stop().await;

        let err = manager
            .register_connection(RecordingSink::default())
            .unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::HubStopped);
        assert_eq!(manager.connected_count(), 0);

        manager.start();
        manager.register_connection(RecordingSink::default()).unwrap();
        assert_eq!(manager.connected_count(), 1);
        manager.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_completes_with_stalled_client_and_no_write_timeout() {
        let manager = Manager::new(Settings {
            heartbeat_interval: Duration::from_secs(1),
            write_timeout: None,
        });
        let connection = manager.register_connection(StalledSink).unwrap();
        manager.start();
        tokio::time::sleep(Duration::from_millis(1500)).await;

        tokio::time::timeout(Duration::from_secs(3600), manager.stop())
            .await
            .expect("stop blocked behind a stalled client");

        assert!(connection.is_closed());
        assert_eq!(manager.connected_count(), 0);
    }

    #[tokio::test]
    async fn test_stop_without_start() {
        let manager = Manager::default();
        manager.register_connection(RecordingSink::default()).unwrap();
        manager.stop().await;
        assert_eq!(manager.connected_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_connection_stays_registered_until_removed() {
        let manager = Manager::default();
        let connection = manager.register_connection(FailingSink::default()).unwrap();

        manager.broadcast("message-request", &json!({})).await;

        assert!(connection.is_closed());
        assert_eq!(manager.connected_count(), 1);
        manager.unregister_connection(connection.id());
        assert_eq!(manager.connected_count(), 0);
    }
}
