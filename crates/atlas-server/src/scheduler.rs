use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Emit a random `metrics-update` sample to every WebSocket client. The
/// interval is re-read from settings after every tick so changes apply
/// without a restart.
pub async fn run_metrics_loop(state: AppState) {
    info!("Starting metrics broadcast loop");

    loop {
        let interval = match state.current_settings().await {
            Ok(settings) => settings.metrics_interval_secs.max(1),
            Err(e) => {
                warn!(error = %e, "Failed to read settings, using default metrics interval");
                atlas_core::Settings::default().metrics_interval_secs
            }
        };
        tokio::time::sleep(Duration::from_secs(interval)).await;

        let value: f64 = rand::thread_rng().gen_range(0.0..100.0);
        let receivers = state.hub.publish_metrics(value);
        debug!(value, receivers, "Published metrics sample");
    }
}
