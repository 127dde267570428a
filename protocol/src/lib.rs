//! JSON-RPC 2.0 message types for the MCP streaming hub.
//!
//! This crate has no dependencies on the other workspace crates. It defines the
//! protocol message that upstream logic hands to the hub, and the structural
//! rules used to decide what kind of message it is.
//!
//! # Classification
//!
//! A message is classified by shape only, in this order:
//!
//! 1. method present, no id: **notification**
//! 2. method present, id present: **request**
//! 3. no method, id present, error present: **error response**
//! 4. no method, id present, result present: **response**
//!
//! Anything else is malformed and [`Message::kind`] returns `None`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error as StdError;
use std::fmt;

/// The only JSON-RPC version accepted on the wire.
pub const JSONRPC_VERSION: &str = "2.0";

/// MCP protocol revision spoken by this server.
pub const MCP_VERSION: &str = "2024-11-05";

/// Standard MCP method names.
pub mod method {
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "initialized";
    pub const LIST_TOOLS: &str = "tools/list";
    pub const CALL_TOOL: &str = "tools/call";
    pub const TOOLS_PROGRESS: &str = "tools/progress";
    pub const LIST_RESOURCES: &str = "resources/list";
    pub const READ_RESOURCE: &str = "resources/read";
    pub const LIST_RESOURCE_TEMPLATES: &str = "resources/templates/list";
    pub const PING: &str = "ping";
}

/// JSON-RPC and MCP error codes.
pub mod error_code {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    pub const RESOURCE_NOT_FOUND: i64 = -32001;
    pub const TOOL_NOT_FOUND: i64 = -32002;
    pub const INVALID_TOOL: i64 = -32003;
}

/// The structural category of a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Request,
    Response,
    ErrorResponse,
    Notification,
}

impl Kind {
    /// The message type restated inside the transport envelope.
    ///
    /// Error responses restate "response"; the event tag tells them apart.
    pub fn message_type(&self) -> &'static str {
        match self {
            Kind::Request => "request",
            Kind::Response | Kind::ErrorResponse => "response",
            Kind::Notification => "notification",
        }
    }
}

/// A JSON-RPC 2.0 message. Absent fields are omitted when serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// The error member of a JSON-RPC error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Message {
    fn empty() -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: None,
            method: None,
            params: None,
            result: None,
            error: None,
        }
    }

    pub fn request(id: impl Into<Value>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            id: Some(id.into()),
            method: Some(method.into()),
            params,
            ..Self::empty()
        }
    }

    pub fn response(id: impl Into<Value>, result: Value) -> Self {
        Self {
            id: Some(id.into()),
            result: Some(result),
            ..Self::empty()
        }
    }

    pub fn error_response(
        id: impl Into<Value>,
        code: i64,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        Self {
            id: Some(id.into()),
            error: Some(RpcError {
                code,
                message: message.into(),
                data,
            }),
            ..Self::empty()
        }
    }

    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            method: Some(method.into()),
            params,
            ..Self::empty()
        }
    }

    /// Parses a message from JSON text and validates its protocol version.
    pub fn from_json(text: &str) -> Result<Self, ParseError> {
        let message: Message = serde_json::from_str(text).map_err(ParseError::Json)?;
        message.validate()?;
        Ok(message)
    }

    /// Checks the `jsonrpc` version field.
    pub fn validate(&self) -> Result<(), ParseError> {
        if self.jsonrpc != JSONRPC_VERSION {
            return Err(ParseError::UnsupportedVersion(self.jsonrpc.clone()));
        }
        Ok(())
    }

    fn has_method(&self) -> bool {
        self.method.as_deref().is_some_and(|m| !m.is_empty())
    }

    pub fn is_notification(&self) -> bool {
        self.has_method() && self.id.is_none()
    }

    pub fn is_request(&self) -> bool {
        self.has_method() && self.id.is_some()
    }

    pub fn is_response(&self) -> bool {
        !self.has_method() && self.id.is_some() && (self.result.is_some() || self.error.is_some())
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Classifies the message by shape, or `None` when it matches no shape.
    pub fn kind(&self) -> Option<Kind> {
        if self.is_notification() {
            Some(Kind::Notification)
        } else if self.is_request() {
            Some(Kind::Request)
        } else if self.is_response() && self.is_error() {
            Some(Kind::ErrorResponse)
        } else if self.is_response() {
            Some(Kind::Response)
        } else {
            None
        }
    }
}

/// Failure to turn JSON text into a valid [`Message`].
#[derive(Debug)]
pub enum ParseError {
    Json(serde_json::Error),
    UnsupportedVersion(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseError::Json(err) => write!(f, "failed to parse JSON-RPC message: {err}"),
            ParseError::UnsupportedVersion(version) => {
                write!(f, "invalid JSON-RPC version: {version:?}")
            }
        }
    }
}

impl StdError for ParseError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ParseError::Json(err) => Some(err),
            ParseError::UnsupportedVersion(_) => None,
        }
    }
}
