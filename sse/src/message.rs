use crate::connection::ConnectionId;
use log::*;
use protocol::{Kind, Message as ProtocolMessage};
use serde::Serialize;
use serde_json::{json, Value};

/// Trait for getting the SSE event type name
pub trait EventType {
    fn event_type(&self) -> &'static str;
}

/// Every event tag the hub puts on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    MessageRequest,
    MessageResponse,
    MessageError,
    MessageNotification,
    Heartbeat,
    Connected,
    Error,
}

impl EventType for Event {
    fn event_type(&self) -> &'static str {
        match self {
            Event::MessageRequest => "message-request",
            Event::MessageResponse => "message-response",
            Event::MessageError => "message-error",
            Event::MessageNotification => "message-notification",
            Event::Heartbeat => "heartbeat",
            Event::Connected => "connected",
            Event::Error => "error",
        }
    }
}

impl From<Kind> for Event {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Request => Event::MessageRequest,
            Kind::Response => Event::MessageResponse,
            Kind::ErrorResponse => Event::MessageError,
            Kind::Notification => Event::MessageNotification,
        }
    }
}

/// Transport envelope wrapping a classified protocol message.
///
/// `message_type` duplicates the event line for clients that only read the body.
#[derive(Debug, Serialize)]
pub struct Envelope<'a> {
    pub message: &'a ProtocolMessage,
    pub timestamp: i64,
    pub message_type: &'static str,
}

/// Where a message should be delivered.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageScope {
    /// Send to one connection
    Connection { connection_id: ConnectionId },
    /// Send to all connected clients
    Broadcast,
}

/// Serializes event data to JSON, substituting an error payload on failure so
/// the client still receives a frame.
pub fn to_payload<T: Serialize + ?Sized>(data: &T) -> Value {
    serde_json::to_value(data).unwrap_or_else(|e| {
        error!("Failed to serialize SSE event data: {e}");
        json!({ "error": format!("failed to marshal data: {e}") })
    })
}

/// A rendered wire frame: `event: <type>\ndata: <json>\n\n`.
///
/// Rendering happens once per delivery call; the same frame is then written to
/// every targeted connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    event_type: String,
    data: String,
    text: String,
}

impl Frame {
    pub fn new<T: Serialize + ?Sized>(event_type: &str, data: &T) -> Self {
        let data = to_payload(data).to_string();
        Self {
            event_type: event_type.to_string(),
            text: format!("event: {event_type}\ndata: {data}\n\n"),
            data,
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// The JSON body as sent on the `data:` line.
    pub fn data_json(&self) -> &str {
        &self.data
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Parses the JSON body back out of the frame.
    pub fn data(&self) -> Option<Value> {
        serde_json::from_str(&self.data).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::ser::{Error as _, Serializer};
    use serde_json::json;

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("refusing to serialize"))
        }
    }

    #[test]
    fn test_frame_wire_format() {
        let frame = Frame::new("heartbeat", &json!({"timestamp": 42}));
        assert_eq!(
            frame.as_str(),
            "event: heartbeat\ndata: {\"timestamp\":42}\n\n"
        );
        assert_eq!(frame.event_type(), "heartbeat");
        assert_eq!(frame.data_json(), "{\"timestamp\":42}");
        assert_eq!(frame.data(), Some(json!({"timestamp": 42})));
    }

    #[test]
    fn test_frame_substitutes_error_payload_on_serialization_failure() {
        let frame = Frame::new("message-request", &Unserializable);

        assert!(frame.as_str().starts_with("event: message-request\ndata: "));
        assert!(frame.as_str().ends_with("\n\n"));
        let data = frame.data().unwrap();
        let reason = data["error"].as_str().unwrap();
        assert!(reason.starts_with("failed to marshal data:"));
        assert!(reason.contains("refusing to serialize"));
    }

    #[test]
    fn test_payload_substitutes_error_on_serialization_failure() {
        let payload = to_payload(&Unserializable);
        let reason = payload["error"].as_str().unwrap();
        assert!(reason.starts_with("failed to marshal data:"));

        assert_eq!(to_payload(&json!({"ok": true})), json!({"ok": true}));
    }

    #[test]
    fn test_event_from_kind() {
        assert_eq!(
            Event::from(Kind::Request).event_type(),
            "message-request"
        );
        assert_eq!(
            Event::from(Kind::Response).event_type(),
            "message-response"
        );
        assert_eq!(
            Event::from(Kind::ErrorResponse).event_type(),
            "message-error"
        );
        assert_eq!(
            Event::from(Kind::Notification).event_type(),
            "message-notification"
        );
    }

    #[test]
    fn test_envelope_fields() {
        let message = ProtocolMessage::notification("tools/progress", None);
        let envelope = Envelope {
            message: &message,
            timestamp: 1_700_000_000,
            message_type: "notification",
        };

        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            value,
            json!({
                "message": {"jsonrpc": "2.0", "method": "tools/progress"},
                "timestamp": 1_700_000_000,
                "message_type": "notification",
            })
        );
    }
}
