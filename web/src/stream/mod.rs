//! SSE HTTP handler for the web layer.
//!
//! This module contains only the Axum handler for the streaming endpoint.
//! The hub itself (Manager, Acceptor, ConnectionRegistry, Streamer) lives in
//! the `sse` crate.

pub mod handler;
