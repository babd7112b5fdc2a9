use std::time::Instant;

use axum::{extract::State, Json};
use chrono::Utc;
use futures::future::join_all;
use tracing::{info, warn};

use atlas_core::api_types::{HealthResponse, ServiceHealth, ServiceHealthResponse};
use atlas_core::ServiceEndpoint;

use crate::state::AppState;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// GET /api/health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    info!("Health check requested");

    let (graph_connected, node_count, edge_count) = match state.knowledge.stats().await {
        Ok(stats) => (true, stats.node_count, stats.edge_count),
        Err(e) => {
            warn!("Graph store connectivity check failed: {e}");
            (false, 0, 0)
        }
    };

    let records_connected = match state.records.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!("Record store connectivity check failed: {e}");
            false
        }
    };

    let status = if graph_connected && records_connected {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: VERSION.to_string(),
        graph_connected,
        records_connected,
        node_count,
        edge_count,
    })
}

async fn check_service(client: &reqwest::Client, endpoint: &ServiceEndpoint) -> ServiceHealth {
    let started = Instant::now();
    let result = client.get(&endpoint.url).send().await;
    let latency_ms = started.elapsed().as_millis() as u64;

    match result {
        Ok(response) => {
            let status = response.status();
            ServiceHealth {
                name: endpoint.name.clone(),
                url: endpoint.url.clone(),
                healthy: status.is_success(),
                status_code: Some(status.as_u16()),
                latency_ms,
                error: (!status.is_success()).then(|| format!("HTTP {status}")),
            }
        }
        Err(e) => ServiceHealth {
            name: endpoint.name.clone(),
            url: endpoint.url.clone(),
            healthy: false,
            status_code: None,
            latency_ms,
            error: Some(e.to_string()),
        },
    }
}

/// GET /api/health/services: probe every configured service in parallel.
pub async fn service_health(State(state): State<AppState>) -> Json<ServiceHealthResponse> {
    let endpoints = &state.config.service_health_urls;
    info!(services = endpoints.len(), "Checking external services");

    let services: Vec<ServiceHealth> =
        join_all(endpoints.iter().map(|endpoint| check_service(&state.http, endpoint))).await;

    for service in services.iter().filter(|s| !s.healthy) {
        warn!(service = %service.name, error = ?service.error, "Service unhealthy");
    }

    Json(ServiceHealthResponse {
        healthy: services.iter().filter(|s| s.healthy).count(),
        total: services.len(),
        services,
        checked_at: Utc::now(),
    })
}
