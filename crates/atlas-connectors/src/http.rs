use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

use atlas_core::error::{AtlasError, Result};

const CONNECTOR_TIMEOUT_SECS: u64 = 15;

pub(crate) fn connector_error(connector: &str, message: impl Into<String>) -> AtlasError {
    AtlasError::Connector {
        connector: connector.to_string(),
        message: message.into(),
    }
}

pub(crate) fn build_client(connector: &str) -> Result<Client> {
    Client::builder()
        .user_agent("atlas-erp/0.1")
        .timeout(Duration::from_secs(CONNECTOR_TIMEOUT_SECS))
        .build()
        .map_err(|e| connector_error(connector, format!("Failed to build HTTP client: {e}")))
}

/// GET a JSON document with bearer auth.
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &Client,
    connector: &str,
    url: &str,
    token: &str,
) -> Result<T> {
    debug!(connector, url, "Calling connector platform");

    let response = client
        .get(url)
        .bearer_auth(token)
        .send()
        .await
        .map_err(|e| connector_error(connector, format!("HTTP request failed: {e}")))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(connector_error(
            connector,
            format!(
                "API returned HTTP {}: {}",
                status,
                body.chars().take(500).collect::<String>()
            ),
        ));
    }

    response
        .json()
        .await
        .map_err(|e| connector_error(connector, format!("Failed to parse response JSON: {e}")))
}

/// Outcome of the most recent platform call.
#[derive(Debug, Default)]
pub(crate) struct CheckState {
    pub last_checked: Option<DateTime<Utc>>,
    pub integrations: usize,
    pub last_error: Option<String>,
}

impl CheckState {
    pub fn record<T>(&mut self, result: &Result<Vec<T>>) {
        self.last_checked = Some(Utc::now());
        match result {
            Ok(items) => {
                self.integrations = items.len();
                self.last_error = None;
            }
            Err(e) => self.last_error = Some(e.to_string()),
        }
    }
}
