use crate::error::{Error, ErrorKind};
use crate::message::Frame;
use crate::sink::Sink;
use chrono::{DateTime, Utc};
use log::*;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{watch, Mutex};

/// Unique identifier for a connection (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ConnectionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One-shot, idempotent "this connection is finished" signal.
///
/// Client disconnect, write failure and hub shutdown all converge here.
#[derive(Debug)]
pub struct TerminalSignal {
    fired: watch::Sender<bool>,
}

impl TerminalSignal {
    pub fn new() -> Self {
        let (fired, _) = watch::channel(false);
        Self { fired }
    }

    /// Fires the signal. Returns `true` only for the call that actually fired it.
    pub fn fire(&self) -> bool {
        self.fired.send_if_modified(|fired| {
            if *fired {
                false
            } else {
                *fired = true;
                true
            }
        })
    }

    pub fn is_fired(&self) -> bool {
        *self.fired.borrow()
    }

    /// Resolves once the signal has fired.
    pub async fn fired(&self) {
        let mut rx = self.fired.subscribe();
        // The sender lives in `self`, so the channel cannot close underneath us.
        let _ = rx.wait_for(|fired| *fired).await;
    }
}

impl Default for TerminalSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// A registered subscriber: its sink, terminal signal and liveness timestamp.
///
/// The sink sits behind its own async mutex, so heartbeat, broadcast and
/// unicast writes to the same client never interleave. That lock is separate
/// from the registry lock, which only guards the map.
pub struct Connection {
    id: ConnectionId,
    sink: Mutex<Box<dyn Sink>>,
    terminal: TerminalSignal,
    connected_at: DateTime<Utc>,
    last_seen: StdMutex<DateTime<Utc>>,
}

impl Connection {
    pub fn new(id: ConnectionId, sink: impl Sink + 'static) -> Self {
        let now = Utc::now();
        Self {
            id,
            sink: Mutex::new(Box::new(sink)),
            terminal: TerminalSignal::new(),
            connected_at: now,
            last_seen: StdMutex::new(now),
        }
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Time of the last successful write. Advisory only.
    pub fn last_seen(&self) -> DateTime<Utc> {
        *self.last_seen.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fires the terminal signal. Safe to call any number of times.
    pub fn close(&self) -> bool {
        self.terminal.fire()
    }

    pub fn is_closed(&self) -> bool {
        self.terminal.is_fired()
    }

    /// Resolves once the connection has been closed for any reason.
    pub async fn closed(&self) {
        self.terminal.fired().await
    }

    /// Writes one frame to this connection's sink.
    ///
    /// A closed connection is skipped silently. A failed or timed out write
    /// closes the connection; it is never retried and never reported to the
    /// caller.
    pub async fn deliver(&self, frame: &Frame, write_timeout: Option<Duration>) {
        if self.is_closed() {
            return;
        }

        let mut sink = self.sink.lock().await;

        // Shutdown or another writer's failure may have closed us while we waited.
        if self.is_closed() {
            return;
        }

        let write = async {
            sink.write_frame(frame).await?;
            sink.flush().await
        };

        let result = match write_timeout {
            Some(limit) => match tokio::time::timeout(limit, write).await {
                Ok(result) => result,
                Err(_) => Err(Error::new(ErrorKind::WriteTimeout)),
            },
            None => write.await,
        };

        match result {
            Ok(()) => {
                *self.last_seen.lock().unwrap_or_else(PoisonError::into_inner) = Utc::now();
            }
            Err(e) => {
                error!(
                    "Failed to write {} event to connection {}: {e}",
                    frame.event_type(),
                    self.id
                );
                self.close();
            }
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .field("connected_at", &self.connected_at)
            .finish()
    }
}

/// Registry of live connections behind a single reader/writer lock.
///
/// Reads (`get`, `snapshot`, `count`) share the lock, writes (`add`, `remove`,
/// `close_all`, `reopen`) take it exclusively. The lock is never held across a
/// write to a sink: delivery always works on a snapshot.
///
/// After `close_all` the registry refuses new connections until `reopen`.
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Arc<Connection>>>,
    // Only read or written while holding the `connections` write lock.
    shut_down: AtomicBool,
    write_timeout: Option<Duration>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::with_write_timeout(None)
    }

    pub fn with_write_timeout(write_timeout: Option<Duration>) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            shut_down: AtomicBool::new(false),
            write_timeout,
        }
    }

    /// Register a connection under its id.
    ///
    /// A live entry with the same id is left untouched and reported as an
    /// invariant violation. A shut down registry rejects every connection.
    pub fn add(&self, connection: Arc<Connection>) -> Result<(), Error> {
        let mut connections = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if self.shut_down.load(Ordering::SeqCst) {
            connection.close();
            return Err(Error::new(ErrorKind::HubStopped));
        }

        if connections.contains_key(connection.id()) {
            error!("Connection id {} is already registered", connection.id());
            return Err(Error::new(ErrorKind::DuplicateConnection(
                connection.id().to_string(),
            )));
        }

        connections.insert(connection.id().clone(), connection);
        Ok(())
    }

    /// Unregister a connection. Removing an unknown id is a no-op.
    pub fn remove(&self, connection_id: &ConnectionId) -> Option<Arc<Connection>> {
        self.connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(connection_id)
    }

    pub fn get(&self, connection_id: &ConnectionId) -> Option<Arc<Connection>> {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(connection_id)
            .cloned()
    }

    /// An independent copy of the current connection list.
    pub fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Close every connection, empty the registry and stop accepting new
    /// connections, all under one exclusive lock. Returns how many entries
    /// were removed.
    pub fn close_all(&self) -> usize {
        let mut connections = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        self.shut_down.store(true, Ordering::SeqCst);

        for connection in connections.values() {
            connection.close();
        }

        let closed = connections.len();
        connections.clear();
        closed
    }

    /// Accept connections again after `close_all`.
    pub fn reopen(&self) {
        let _connections = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        self.shut_down.store(false, Ordering::SeqCst);
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Send a frame to one connection. Returns `false` if the id is unknown.
    pub async fn send_to(&self, connection_id: &ConnectionId, frame: &Frame) -> bool {
        match self.get(connection_id) {
            Some(connection) => {
                connection.deliver(frame, self.write_timeout).await;
                true
            }
            None => false,
        }
    }

    /// Send a frame to every connection in a snapshot, concurrently.
    /// Returns the number of connections the frame was offered to.
    pub async fn broadcast(&self, frame: &Frame) -> usize {
        let connections = self.snapshot();
        self.deliver_all(&connections, frame).await;
        connections.len()
    }

    pub(crate) async fn deliver_all(&self, connections: &[Arc<Connection>], frame: &Frame) {
        futures::future::join_all(
            connections
                .iter()
                .map(|connection| connection.deliver(frame, self.write_timeout)),
        )
        .await;
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
