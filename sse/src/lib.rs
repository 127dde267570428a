//! Server-Sent Events (SSE) streaming hub for MCP messages.
//!
//! This crate accepts many long-lived client connections, classifies outbound
//! JSON-RPC messages by shape and pushes them to every client or to a single
//! one, while a heartbeat loop keeps idle connections alive.
//!
//! # Architecture
//!
//! - **Single lock-guarded registry**: one reader/writer lock protects the map
//!   of live connections. Delivery works on a snapshot and never holds it.
//! - **Per-connection write lock**: each connection serializes writes to its own
//!   sink, so heartbeat, broadcast and unicast frames never interleave.
//! - **One terminal signal per connection**: client disconnect, write failure
//!   and hub shutdown all fire the same idempotent signal.
//! - **Ephemeral messages**: clients that are not connected miss the message.
//!   There is no replay on reconnect.
//!
//! # Message Flow
//!
//! 1. Client opens the SSE endpoint; the `Acceptor` registers a `Connection`
//!    and sends a `connected` event.
//! 2. Upstream logic hands a protocol message to the `Streamer`.
//! 3. The `Streamer` classifies it, wraps it in a timestamped envelope and asks
//!    the `Manager` to broadcast it or send it to one connection.
//! 4. The `Manager` renders the frame once and writes it to each target.
//! 5. On disconnect, write failure or `Manager::stop` the connection is closed
//!    and unregistered.
//!
//! # Example: Streaming a notification
//!
//! ```rust,ignore
//! let manager = Arc::new(sse::Manager::new(sse::Settings::default()));
//! manager.start();
//!
//! let streamer = sse::Streamer::new(manager.clone());
//! streamer.stream_progress("search_repositories", json!(50)).await?;
//!
//! manager.stop().await;
//! ```
//!
//! # Modules
//!
//! - `connection`: Connection, TerminalSignal and ConnectionRegistry
//! - `sink`: the write target abstraction and its channel-backed implementation
//! - `message`: event tags, transport envelope and wire frames
//! - `heartbeat`: periodic keepalive loop
//! - `manager`: hub lifecycle and delivery
//! - `acceptor`: per-connection registration lifecycle
//! - `streamer`: message classification and formatting

pub mod acceptor;
pub mod connection;
pub mod error;
pub mod heartbeat;
pub mod manager;
pub mod message;
pub mod sink;
pub mod streamer;

pub use acceptor::Acceptor;
pub use connection::ConnectionId;
pub use manager::{Manager, Settings};
pub use sink::ChannelSink;
pub use streamer::{DeliveryTarget, Streamer};
