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

const NAME: &str = "pipedream";

#[derive(Debug, Deserialize)]
struct AppsResponse {
    #[serde(default)]
    data: Vec<PipedreamApp>,
}

#[derive(Debug, Deserialize)]
struct PipedreamApp {
    id: String,
    name_slug: String,
    name: String,
    #[serde(default)]
    img_src: Option<String>,
}

/// Client for the Pipedream Connect apps API.
pub struct PipedreamConnector {
    client: Client,
    base_url: String,
    api_key: String,
    state: RwLock<CheckState>,
}

impl PipedreamConnector {
    pub fn new(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(NAME)?,
            base_url: config.pipedream_url.trim_end_matches('/').to_string(),
            api_key: config.pipedream_api_key.clone(),
            state: RwLock::new(CheckState::default()),
        })
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn to_integration(app: PipedreamApp) -> Integration {
        Integration {
            id: app.id,
            provider: app.name_slug,
            display_name: app.name,
            platform: Platform::Pipedream,
            logo_url: app.img_src,
        }
    }

    async fn fetch(&self) -> Result<Vec<Integration>> {
        if !self.is_configured() {
            return Err(connector_error(NAME, "PIPEDREAM_API_KEY is not set"));
        }
        let url = format!("{}/apps", self.base_url);
        let response: AppsResponse = get_json(&self.client, NAME, &url, &self.api_key).await?;
        Ok(response.data.into_iter().map(Self::to_integration).collect())
    }
}

#[async_trait]
impl Connector for PipedreamConnector {
    fn name(&self) -> &str {
        NAME
    }

    fn platform(&self) -> Platform {
        Platform::Pipedream
    }

    async fn list_integrations(&self) -> Result<Vec<Integration>> {
        let result = self.fetch().await;
        self.state.write().await.record(&result);
        match &result {
            Ok(items) => info!(integrations = items.len(), "Fetched Pipedream apps"),
            Err(e) => warn!(error = %e, "Failed to fetch Pipedream apps"),
        }
        result
    }

    async fn status(&self) -> ConnectorStatus {
        let reachable = self.is_configured() && self.list_integrations().await.is_ok();
        let state = self.state.read().await;
        ConnectorStatus {
            name: NAME.to_string(),
            platform: Platform::Pipedream,
            configured: self.is_configured(),
            reachable,
            mock: false,
            last_checked: state.last_checked,
            integrations: state.integrations,
            error: if self.is_configured() {
                state.last_error.clone()
            } else {
                Some("PIPEDREAM_API_KEY is not set".to_string())
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_app_payload() {
        let body = r#"{"page_info": {"count": 1}, "data": [
            {"id": "app_OkrhR1", "name_slug": "google_sheets", "name": "Google Sheets", "img_src": "https://x/sheets.png"}
        ]}"#;
        let parsed: AppsResponse = serde_json::from_str(body).unwrap();
        let app = PipedreamConnector::to_integration(parsed.data.into_iter().next().unwrap());
        assert_eq!(app.id, "app_OkrhR1");
        assert_eq!(app.provider, "google_sheets");
        assert_eq!(app.platform, Platform::Pipedream);
    }

    #[tokio::test]
    async fn unconfigured_status() {
        let connector = PipedreamConnector::new(&AppConfig::in_memory()).unwrap();
        let status = connector.status().await;
        assert_eq!(status.name, "pipedream");
        assert!(!status.configured);
        assert!(!status.reachable);
        assert!(status.error.is_some());
        assert!(status.last_checked.is_none());
    }
}
