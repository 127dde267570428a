use anyhow::Result;
use eventsource_client::{self as es, Client};
use futures_util::stream::StreamExt;
use log::*;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct Event {
    pub event_type: String,
    pub data: Value,
    pub received_at: Instant,
}

/// A live subscription to the hub's `/mcp/stream` endpoint.
pub struct Connection {
    pub client_id: String,
    event_rx: mpsc::UnboundedReceiver<Event>,
    _handle: tokio::task::JoinHandle<()>,
}

impl Connection {
    /// Connects and waits for the hub's `connected` greeting.
    pub async fn establish(base_url: &str, timeout: Duration) -> Result<Self> {
        let url = format!("{}/mcp/stream", base_url.trim_end_matches('/'));
        let (tx, rx) = mpsc::unbounded_channel();

        let client = es::ClientBuilder::for_url(&url)?.build();

        let handle = tokio::spawn(async move {
            let mut stream = client.stream();

            loop {
                match stream.next().await {
                    Some(Ok(es::SSE::Event(event))) => match serde_json::from_str(&event.data) {
                        Ok(data) => {
                            let event = Event {
                                event_type: event.event_type,
                                data,
                                received_at: Instant::now(),
                            };
                            if tx.send(event).is_err() {
                                debug!("Event receiver dropped");
                                break;
                            }
                        }
                        Err(e) => warn!("Ignoring {} event with invalid JSON: {e}", event.event_type),
                    },
                    Some(Ok(es::SSE::Comment(_))) => {}
                    Some(Err(e)) => {
                        warn!("Stream error: {e}");
                        break;
                    }
                    None => {
                        debug!("Stream ended");
                        break;
                    }
                }
            }
        });

        let mut connection = Self {
            client_id: String::new(),
            event_rx: rx,
            _handle: handle,
        };

        let greeting = connection.wait_for_event("connected", timeout).await?;
        connection.client_id = greeting.data["clientId"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        Ok(connection)
    }

    /// Next event of any type, or `None` once the stream has closed.
    pub async fn next_event(&mut self, timeout: Duration) -> Result<Option<Event>> {
        match tokio::time::timeout(timeout, self.event_rx.recv()).await {
            Ok(event) => Ok(event),
            Err(_) => anyhow::bail!("Timeout waiting for next event"),
        }
    }

    /// Skips events until one of the given type arrives.
    pub async fn wait_for_event(&mut self, event_type: &str, timeout: Duration) -> Result<Event> {
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                anyhow::bail!("Timeout waiting for event: {}", event_type);
            }

            match tokio::time::timeout(remaining, self.event_rx.recv()).await {
                Ok(Some(event)) if event.event_type == event_type => return Ok(event),
                Ok(Some(_)) => continue,
                Ok(None) => anyhow::bail!("SSE connection closed"),
                Err(_) => anyhow::bail!("Timeout waiting for event: {}", event_type),
            }
        }
    }
}
