use std::collections::BTreeMap;
use std::sync::Arc;

use atlas_core::config::AppConfig;
use atlas_core::error::Result;
use atlas_core::Connector;

mod http;
mod mock;
mod nango;
mod pipedream;

pub use mock::{MockConnector, WithMockFallback};
pub use nango::NangoConnector;
pub use pipedream::PipedreamConnector;

/// Connectors keyed by name. Nango is served through the mock fallback so
/// the integrations page keeps working without vendor credentials.
pub fn connector_registry(config: &AppConfig) -> Result<BTreeMap<String, Arc<dyn Connector>>> {
    let mut registry: BTreeMap<String, Arc<dyn Connector>> = BTreeMap::new();
    registry.insert(
        "nango".into(),
        Arc::new(WithMockFallback::new(Arc::new(NangoConnector::new(config)?))),
    );
    registry.insert("pipedream".into(), Arc::new(PipedreamConnector::new(config)?));
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_contains_every_platform() {
        let registry = connector_registry(&AppConfig::in_memory()).unwrap();
        let names: Vec<&str> = registry.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["nango", "pipedream"]);
        assert!(registry.values().all(|c| !c.name().is_empty()));
    }
}
