use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::{json, Value};

pub struct ApiClient {
    client: Client,
    base_url: String,
}

/// A message to publish and the event tag the hub should stream it under.
pub struct Sample {
    pub label: &'static str,
    pub message: Value,
    pub expected_event: &'static str,
}

impl ApiClient {
    pub fn new(client: Client, base_url: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// POSTs a JSON-RPC message to the hub, optionally targeting one client.
    pub async fn publish(&self, message: &Value, client_id: Option<&str>) -> Result<Value> {
        let url = format!("{}/mcp/publish", self.base_url);
        let mut request = self.client.post(&url).json(message);
        if let Some(client_id) = client_id {
            request = request.query(&[("client_id", client_id)]);
        }

        let response = request.send().await.context("Failed to publish message")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Publish failed with {}: {}", status, body);
        }

        response.json().await.context("Invalid publish response")
    }

    pub async fn ready(&self) -> Result<Value> {
        let url = format!("{}/ready", self.base_url);
        let response = self.client.get(&url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }
}

/// One message of each shape the hub classifies.
pub fn sample_messages() -> Vec<Sample> {
    vec![
        Sample {
            label: "request",
            message: json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "tools/list",
            }),
            expected_event: "message-request",
        },
        Sample {
            label: "response",
            message: json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {"tools": [{"name": "search_repositories"}]},
            }),
            expected_event: "message-response",
        },
        Sample {
            label: "error response",
            message: json!({
                "jsonrpc": "2.0",
                "id": 2,
                "error": {"code": -32601, "message": "Method not found"},
            }),
            expected_event: "message-error",
        },
        Sample {
            label: "notification",
            message: json!({
                "jsonrpc": "2.0",
                "method": "tools/progress",
                "params": {"tool": "search_repositories", "progress": 50},
            }),
            expected_event: "message-notification",
        },
    ]
}
