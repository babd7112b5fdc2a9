use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use atlas_core::config::AppConfig;
use atlas_core::connector::{Connector, ConnectorStatus, Integration};
use atlas_core::error::Result;
use atlas_core::records::Platform;

use crate::http::{build_client, connector_error, get_json, CheckState};

const NAME: &str = "nango";

#[derive(Debug, Deserialize)]
struct IntegrationsResponse {
    #[serde(default)]
    data: Vec<NangoIntegration>,
}

#[derive(Debug, Deserialize)]
struct NangoIntegration {
    unique_key: String,
    provider: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    logo: Option<String>,
}

/// Client for the Nango integrations API.
pub struct NangoConnector {
    client: Client,
    base_url: String,
    secret_key: String,
    state: RwLock<CheckState>,
}

impl NangoConnector {
    pub fn new(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(NAME)?,
            base_url: config.nango_url.trim_end_matches('/').to_string(),
            secret_key: config.nango_secret_key.clone(),
            state: RwLock::new(CheckState::default()),
        })
    }

    pub fn is_configured(&self) -> bool {
        !self.secret_key.is_empty()
    }

    fn to_integration(raw: NangoIntegration) -> Integration {
        Integration {
            display_name: raw.display_name.unwrap_or_else(|| raw.unique_key.clone()),
            id: raw.unique_key,
            provider: raw.provider,
            platform: Platform::Nango,
            logo_url: raw.logo,
        }
    }

    async fn fetch(&self) -> Result<Vec<Integration>> {
        if !self.is_configured() {
            return Err(connector_error(NAME, "NANGO_SECRET_KEY is not set"));
        }
        let url = format!("{}/integrations", self.base_url);
        let response: IntegrationsResponse =
            get_json(&self.client, NAME, &url, &self.secret_key).await?;
        Ok(response.data.into_iter().map(Self::to_integration).collect())
    }
}

#[async_trait]
impl Connector for NangoConnector {
    fn name(&self) -> &str {
        NAME
    }

    fn platform(&self) -> Platform {
        Platform::Nango
    }

    async fn list_integrations(&self) -> Result<Vec<Integration>> {
        let result = self.fetch().await;
        self.state.write().await.record(&result);
        match &result {
            Ok(items) => info!(integrations = items.len(), "Fetched Nango integrations"),
            Err(e) => warn!(error = %e, "Failed to fetch Nango integrations"),
        }
        result
    }

    async fn status(&self) -> ConnectorStatus {
        let reachable = self.is_configured() && self.list_integrations().await.is_ok();
        let state = self.state.read().await;
        ConnectorStatus {
            name: NAME.to_string(),
            platform: Platform::Nango,
            configured: self.is_configured(),
            reachable,
            mock: false,
            last_checked: state.last_checked,
            integrations: state.integrations,
            error: if self.is_configured() {
                state.last_error.clone()
            } else {
                Some("NANGO_SECRET_KEY is not set".to_string())
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_integration_payload() {
        let body = r#"{"data": [
            {"unique_key": "hubspot-crm", "provider": "hubspot", "display_name": "HubSpot", "logo": "https://x/hubspot.svg"},
            {"unique_key": "slack", "provider": "slack"}
        ]}"#;
        let parsed: IntegrationsResponse = serde_json::from_str(body).unwrap();
        let integrations: Vec<Integration> = parsed
            .data
            .into_iter()
            .map(NangoConnector::to_integration)
            .collect();

        assert_eq!(integrations[0].id, "hubspot-crm");
        assert_eq!(integrations[0].display_name, "HubSpot");
        assert_eq!(integrations[1].display_name, "slack");
        assert!(integrations.iter().all(|i| i.platform == Platform::Nango));
    }

    #[tokio::test]
    async fn unconfigured_connector_reports_error_without_calling_out() {
        let connector = NangoConnector::new(&AppConfig::in_memory()).unwrap();
        assert!(connector.list_integrations().await.is_err());

        let status = connector.status().await;
        assert!(!status.configured);
        assert!(!status.reachable);
        assert!(status.error.unwrap().contains("NANGO_SECRET_KEY"));
    }
}
