use crate::connection::ConnectionRegistry;
use crate::message::{Event, EventType, Frame};
use chrono::Utc;
use log::*;
use serde_json::json;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

struct Running {
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Background loop that pushes a `heartbeat` frame to every connection on a
/// fixed interval.
pub struct Heartbeat {
    interval: Duration,
    running: Mutex<Option<Running>>,
}

impl Heartbeat {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            running: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Spawns the heartbeat loop. Starting an already running loop does nothing.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, registry: Arc<ConnectionRegistry>) {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.is_some() {
            warn!("Heartbeat loop already running");
            return;
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(run(registry, self.interval, stop_rx));
        *running = Some(Running { stop_tx, handle });

        info!("Started heartbeat loop every {:?}", self.interval);
    }

    /// Signals the loop to end and waits for it to exit. A round still writing
    /// to a stalled client is abandoned. A no-op if the loop was never started.
    pub async fn stop(&self) {
        let running = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(Running { stop_tx, handle }) = running {
            let _ = stop_tx.send(());
            if let Err(e) = handle.await {
                error!("Heartbeat loop ended abnormally: {e}");
            }
            info!("Stopped heartbeat loop");
        }
    }
}

async fn run(registry: Arc<ConnectionRegistry>, interval: Duration, mut stop_rx: oneshot::Receiver<()>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; heartbeats start one interval in.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = &mut stop_rx => return,
            _ = ticker.tick() => {}
        }

        tokio::select! {
            _ = &mut stop_rx => return,
            _ = send_heartbeat(&registry) => {}
        }
    }
}

/// Sends one heartbeat to every connection currently registered.
pub(crate) async fn send_heartbeat(registry: &ConnectionRegistry) {
    let connections = registry.snapshot();
    if connections.is_empty() {
        return;
    }

    let frame = Frame::new(
        Event::Heartbeat.event_type(),
        &json!({ "timestamp": Utc::now().timestamp() }),
    );
    registry.deliver_all(&connections, &frame).await;

    debug!("Sent heartbeat to {} client(s)", connections.len());
}
