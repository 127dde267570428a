//! Error types for the `sse` hub.
use std::error::Error as StdError;
use std::fmt;

/// Hub error type.
///
/// Connection-local failures (write failures, unknown targets) are absorbed by
/// the hub and only logged. The kinds that reach a caller of the delivery API
/// are `MalformedMessage`, `InvalidMessage`, `DuplicateConnection` and
/// `HubStopped`; the write kinds are produced by [`crate::sink::Sink`]
/// implementations and consumed by the delivery path.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    /// The message matches none of the classification shapes.
    MalformedMessage,
    /// The message could not be parsed or carries the wrong protocol version.
    InvalidMessage,
    /// A connection id was registered while a prior entry was still live.
    DuplicateConnection(String),
    /// The hub has been stopped and accepts no new connections.
    HubStopped,
    /// The sink rejected a write or flush.
    Write,
    /// A write did not complete within the configured timeout.
    WriteTimeout,
}

impl Error {
    pub fn new(error_kind: ErrorKind) -> Self {
        Self {
            source: None,
            error_kind,
        }
    }

    pub fn with_source<E>(error_kind: ErrorKind, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            source: Some(Box::new(source)),
            error_kind,
        }
    }

    pub fn write<E>(source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::with_source(ErrorKind::Write, source)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "Stream Error: {:?}: {source}", self.error_kind),
            None => write!(f, "Stream Error: {:?}", self.error_kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<protocol::ParseError> for Error {
    fn from(err: protocol::ParseError) -> Self {
        Self::with_source(ErrorKind::InvalidMessage, err)
    }
}
