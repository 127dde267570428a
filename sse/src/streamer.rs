use crate::connection::ConnectionId;
use crate::error::{Error, ErrorKind};
use crate::message::{to_payload, Envelope, Event, EventType, MessageScope};
use async_trait::async_trait;
use chrono::Utc;
use log::*;
use protocol::{method, Kind, Message as ProtocolMessage};
use serde_json::{json, Value};
use std::sync::Arc;

/// The delivery capability the [`Streamer`] needs from the hub.
#[async_trait]
pub trait DeliveryTarget: Send + Sync {
    async fn broadcast(&self, event_type: &str, payload: &Value);
    async fn send_to(&self, connection_id: &ConnectionId, event_type: &str, payload: &Value);
    fn connected_count(&self) -> usize;
}

/// Classifies protocol messages, wraps them in a timestamped envelope and
/// hands them to a [`DeliveryTarget`].
#[derive(Clone)]
pub struct Streamer {
    target: Arc<dyn DeliveryTarget>,
}

impl Streamer {
    pub fn new(target: Arc<dyn DeliveryTarget>) -> Self {
        Self { target }
    }

    /// Deliver a message according to its scope.
    pub async fn stream(&self, message: &ProtocolMessage, scope: &MessageScope) -> Result<(), Error> {
        match scope {
            MessageScope::Broadcast => self.stream_to_all(message).await,
            MessageScope::Connection { connection_id } => {
                self.stream_to_one(connection_id, message).await
            }
        }
    }

    /// Broadcast a message to every connected client.
    ///
    /// Malformed messages are rejected even when nobody is listening.
    pub async fn stream_to_all(&self, message: &ProtocolMessage) -> Result<(), Error> {
        let kind = classify(message)?;
        let event = Event::from(kind);

        let clients = self.target.connected_count();
        if clients == 0 {
            debug!("No connected clients to stream message to");
            return Ok(());
        }

        let payload = envelope(message, kind);
        self.target.broadcast(event.event_type(), &payload).await;

        debug!(
            "Streamed {} (method: {:?}, id: {:?}) to {clients} client(s)",
            event.event_type(),
            message.method,
            message.id,
        );
        Ok(())
    }

    /// Send a message to one client. A client that has gone away is not an error.
    pub async fn stream_to_one(
        &self,
        connection_id: &ConnectionId,
        message: &ProtocolMessage,
    ) -> Result<(), Error> {
        let kind = classify(message)?;
        let event = Event::from(kind);
        let payload = envelope(message, kind);
        self.target
            .send_to(connection_id, event.event_type(), &payload)
            .await;

        debug!(
            "Streamed {} (method: {:?}, id: {:?}) to client {connection_id}",
            event.event_type(),
            message.method,
            message.id,
        );
        Ok(())
    }

    pub async fn stream_notification(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<(), Error> {
        self.stream_to_all(&ProtocolMessage::notification(method, params))
            .await
    }

    /// Broadcast a `tools/progress` notification for a running tool.
    pub async fn stream_progress(&self, tool: &str, progress: Value) -> Result<(), Error> {
        self.stream_notification(
            method::TOOLS_PROGRESS,
            Some(json!({ "tool": tool, "progress": progress })),
        )
        .await
    }

    /// Broadcast a hub-level error that is not tied to any protocol message.
    pub async fn stream_error(&self, code: i64, message: &str, data: Option<Value>) -> Result<(), Error> {
        let payload = json!({
            "code": code,
            "message": message,
            "data": data,
        });
        self.target
            .broadcast(Event::Error.event_type(), &payload)
            .await;
        Ok(())
    }

    pub fn connected_count(&self) -> usize {
        self.target.connected_count()
    }

    pub fn is_streaming_enabled(&self) -> bool {
        self.connected_count() > 0
    }
}

fn classify(message: &ProtocolMessage) -> Result<Kind, Error> {
    match message.kind() {
        Some(kind) => Ok(kind),
        None => {
            error!(
                "Refusing to stream malformed message (method: {:?}, id: {:?})",
                message.method, message.id
            );
            Err(Error::new(ErrorKind::MalformedMessage))
        }
    }
}

fn envelope(message: &ProtocolMessage, kind: Kind) -> Value {
    to_payload(&Envelope {
        message,
        timestamp: Utc::now().timestamp(),
        message_type: kind.message_type(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::error_code;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Broadcast(String, Value),
        SendTo(String, String, Value),
    }

    /// Delivery target double that records calls without real connections.
    struct RecordingTarget {
        connected: usize,
        calls: Mutex<Vec<Call>>,
    }

    impl RecordingTarget {
        fn with_clients(connected: usize) -> Arc<Self> {
            Arc::new(Self {
                connected,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DeliveryTarget for RecordingTarget {
        async fn broadcast(&self, event_type: &str, payload: &Value) {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Broadcast(event_type.to_string(), payload.clone()));
        }

        async fn send_to(&self, connection_id: &ConnectionId, event_type: &str, payload: &Value) {
            self.calls.lock().unwrap().push(Call::SendTo(
                connection_id.to_string(),
                event_type.to_string(),
                payload.clone(),
            ));
        }

        fn connected_count(&self) -> usize {
            self.connected
        }
    }

    fn broadcast_of(target: &RecordingTarget) -> (String, Value) {
        match target.calls().as_slice() {
            [Call::Broadcast(event_type, payload)] => (event_type.clone(), payload.clone()),
            calls => panic!("expected one broadcast, got {calls:?}"),
        }
    }

    #[tokio::test]
    async fn test_classification_table() {
        let cases = vec![
            (ProtocolMessage::request(1, "tools/list", None), "message-request", "request"),
            (ProtocolMessage::response(1, json!({"tools": []})), "message-response", "response"),
            (
                ProtocolMessage::error_response(1, error_code::METHOD_NOT_FOUND, "nope", None),
                "message-error",
                "response",
            ),
            (ProtocolMessage::notification("initialized", None), "message-notification", "notification"),
        ];

        for (message, expected_event, expected_type) in cases {
            let target = RecordingTarget::with_clients(1);
            let streamer = Streamer::new(target.clone());

            streamer.stream_to_all(&message).await.unwrap();

            let (event_type, payload) = broadcast_of(&target);
            assert_eq!(event_type, expected_event);
            assert_eq!(payload["message_type"], expected_type);
            assert_eq!(payload["message"], serde_json::to_value(&message).unwrap());
            assert!(payload["timestamp"].as_i64().unwrap() > 0);
        }
    }

    #[tokio::test]
    async fn test_stream_to_all_without_clients_is_noop() {
        let target = RecordingTarget::with_clients(0);
        let streamer = Streamer::new(target.clone());

        streamer
            .stream_to_all(&ProtocolMessage::notification("ping", None))
            .await
            .unwrap();

        assert!(target.calls().is_empty());
        assert!(!streamer.is_streaming_enabled());
    }

    #[tokio::test]
    async fn test_malformed_message_is_rejected() {
        let target = RecordingTarget::with_clients(2);
        let streamer = Streamer::new(target.clone());
        let mut message = ProtocolMessage::response(1, json!(null));
        message.result = None;

        let err = streamer.stream_to_all(&message).await.unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::MalformedMessage);

        let err = streamer
            .stream_to_one(&ConnectionId::from("c1"), &message)
            .await
            .unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::MalformedMessage);

        assert!(target.calls().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_message_is_rejected_without_clients() {
        let target = RecordingTarget::with_clients(0);
        let streamer = Streamer::new(target);
        let mut message = ProtocolMessage::notification("x", None);
        message.method = None;

        assert!(streamer.stream_to_all(&message).await.is_err());
    }

    #[tokio::test]
    async fn test_stream_to_one_targets_connection() {
        let target = RecordingTarget::with_clients(0);
        let streamer = Streamer::new(target.clone());

        streamer
            .stream_to_one(&ConnectionId::from("client-7"), &ProtocolMessage::response("r1", json!(5)))
            .await
            .unwrap();

        match target.calls().as_slice() {
            [Call::SendTo(id, event_type, payload)] => {
                assert_eq!(id, "client-7");
                assert_eq!(event_type, "message-response");
                assert_eq!(payload["message"]["result"], 5);
            }
            calls => panic!("expected one send, got {calls:?}"),
        }
    }

    #[tokio::test]
    async fn test_stream_by_scope() {
        let target = RecordingTarget::with_clients(1);
        let streamer = Streamer::new(target.clone());
        let message = ProtocolMessage::notification("ping", None);

        streamer.stream(&message, &MessageScope::Broadcast).await.unwrap();
        streamer
            .stream(
                &message,
                &MessageScope::Connection {
                    connection_id: ConnectionId::from("c2"),
                },
            )
            .await
            .unwrap();

        let calls = target.calls();
        assert!(matches!(calls[0], Call::Broadcast(..)));
        assert!(matches!(&calls[1], Call::SendTo(id, ..) if id == "c2"));
    }

    #[tokio::test]
    async fn test_stream_progress_builds_notification() {
        let target = RecordingTarget::with_clients(3);
        let streamer = Streamer::new(target.clone());

        streamer.stream_progress("x", json!(50)).await.unwrap();

        let (event_type, payload) = broadcast_of(&target);
        assert_eq!(event_type, "message-notification");
        assert_eq!(payload["message_type"], "notification");
        assert_eq!(payload["message"]["method"], "tools/progress");
        assert_eq!(payload["message"]["params"], json!({"tool": "x", "progress": 50}));
    }

    #[tokio::test]
    async fn test_stream_error_bypasses_classification() {
        let target = RecordingTarget::with_clients(1);
        let streamer = Streamer::new(target.clone());

        streamer
            .stream_error(error_code::INTERNAL_ERROR, "upstream unavailable", Some(json!({"retry": true})))
            .await
            .unwrap();

        let (event_type, payload) = broadcast_of(&target);
        assert_eq!(event_type, "error");
        assert_eq!(
            payload,
            json!({"code": -32603, "message": "upstream unavailable", "data": {"retry": true}})
        );
    }
}
