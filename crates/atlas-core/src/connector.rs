use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::records::Platform;

/// An integration offered by a connector platform (a SaaS app the user can
/// authorise).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Integration {
    pub id: String,
    pub provider: String,
    pub display_name: String,
    pub platform: Platform,
    #[serde(default)]
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorStatus {
    pub name: String,
    pub platform: Platform,
    pub configured: bool,
    pub reachable: bool,
    /// True when the reported data came from the local mock service.
    pub mock: bool,
    pub last_checked: Option<DateTime<Utc>>,
    pub integrations: usize,
    pub error: Option<String>,
}

/// One answer from [`Connector::fetch_integrations`].
#[derive(Debug, Clone)]
pub struct IntegrationListing {
    pub integrations: Vec<Integration>,
    pub mock: bool,
}

#[async_trait]
pub trait Connector: Send + Sync {
    fn name(&self) -> &str;
    fn platform(&self) -> Platform;
    async fn list_integrations(&self) -> Result<Vec<Integration>>;
    async fn status(&self) -> ConnectorStatus;

    /// Integrations along with whether they came from canned data.
    async fn fetch_integrations(&self) -> Result<IntegrationListing> {
        Ok(IntegrationListing {
            integrations: self.list_integrations().await?,
            mock: false,
        })
    }
}
