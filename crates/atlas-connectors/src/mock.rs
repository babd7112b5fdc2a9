use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::warn;

use atlas_core::connector::{Connector, ConnectorStatus, Integration, IntegrationListing};
use atlas_core::error::Result;
use atlas_core::records::Platform;

const CANNED: &[(&str, &str, &str)] = &[
    ("salesforce", "salesforce", "Salesforce"),
    ("hubspot", "hubspot", "HubSpot"),
    ("slack", "slack", "Slack"),
    ("google-drive", "google-drive", "Google Drive"),
    ("quickbooks", "quickbooks", "QuickBooks"),
];

/// Local stand-in returning a fixed set of integrations.
pub struct MockConnector {
    name: String,
    platform: Platform,
}

impl MockConnector {
    pub fn new(name: impl Into<String>, platform: Platform) -> Self {
        Self {
            name: name.into(),
            platform,
        }
    }

    fn canned(&self) -> Vec<Integration> {
        CANNED
            .iter()
            .map(|(id, provider, display_name)| Integration {
                id: id.to_string(),
                provider: provider.to_string(),
                display_name: display_name.to_string(),
                platform: self.platform,
                logo_url: None,
            })
            .collect()
    }
}

#[async_trait]
impl Connector for MockConnector {
    fn name(&self) -> &str {
        &self.name
    }

    fn platform(&self) -> Platform {
        self.platform
    }

    async fn list_integrations(&self) -> Result<Vec<Integration>> {
        Ok(self.canned())
    }

    async fn status(&self) -> ConnectorStatus {
        ConnectorStatus {
            name: self.name.clone(),
            platform: self.platform,
            configured: true,
            reachable: true,
            mock: true,
            last_checked: Some(Utc::now()),
            integrations: CANNED.len(),
            error: None,
        }
    }

    async fn fetch_integrations(&self) -> Result<IntegrationListing> {
        Ok(IntegrationListing {
            integrations: self.canned(),
            mock: true,
        })
    }
}

/// Wraps a live connector and answers from a [`MockConnector`] whenever the
/// live platform is unconfigured, unreachable or returns an error.
pub struct WithMockFallback {
    inner: Arc<dyn Connector>,
    mock: MockConnector,
}

impl WithMockFallback {
    pub fn new(inner: Arc<dyn Connector>) -> Self {
        let mock = MockConnector::new(inner.name(), inner.platform());
        Self { inner, mock }
    }
}

#[async_trait]
impl Connector for WithMockFallback {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn platform(&self) -> Platform {
        self.inner.platform()
    }

    async fn list_integrations(&self) -> Result<Vec<Integration>> {
        Ok(self.fetch_integrations().await?.integrations)
    }

    async fn fetch_integrations(&self) -> Result<IntegrationListing> {
        match self.inner.fetch_integrations().await {
            Ok(listing) => Ok(listing),
            Err(e) => {
                warn!(connector = %self.inner.name(), error = %e, "Falling back to mock integrations");
                self.mock.fetch_integrations().await
            }
        }
    }

    async fn status(&self) -> ConnectorStatus {
        let live = self.inner.status().await;
        if live.configured && live.reachable {
            return live;
        }
        let mock = self.mock.status().await;
        ConnectorStatus {
            configured: live.configured,
            reachable: false,
            error: live.error,
            ..mock
        }
    }
}
