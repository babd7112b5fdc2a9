use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use futures::future::join_all;
use tracing::info;

use atlas_core::api_types::{
    ConnectorIntegrationsResponse, IntegrationsResponse, ListResponse, NewConnection,
};
use atlas_core::Connection;

use super::records;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// GET /api/integrations
pub async fn list_connectors(State(state): State<AppState>) -> Json<IntegrationsResponse> {
    let connectors = join_all(state.connectors.values().map(|c| c.status())).await;
    info!(count = connectors.len(), "Collected connector statuses");
    Json(IntegrationsResponse { connectors })
}

/// GET /api/integrations/{name}
pub async fn list_integrations(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<ConnectorIntegrationsResponse>> {
    let connector = state
        .connectors
        .get(&name)
        .ok_or_else(|| ApiError::not_found(format!("Unknown connector '{name}'")))?;

    let listing = connector.fetch_integrations().await?;
    info!(
        connector = %name,
        count = listing.integrations.len(),
        mock = listing.mock,
        "Listed integrations"
    );

    Ok(Json(ConnectorIntegrationsResponse {
        connector: name,
        mock: listing.mock,
        integrations: listing.integrations,
    }))
}

/// GET /api/integrations/connections
pub async fn list_connections(
    State(state): State<AppState>,
) -> ApiResult<Json<ListResponse<Connection>>> {
    records::list_all(&state.connections).await
}

/// POST /api/integrations/connections
pub async fn create_connection(
    State(state): State<AppState>,
    body: Result<Json<NewConnection>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Connection>)> {
    let Json(connection) = body?;
    records::require_name(&connection.name, "Connection")?;
    if connection.integration_id.trim().is_empty() {
        return Err(ApiError::bad_request("integrationId must not be empty"));
    }
    records::create_one(&state.connections, connection.into_record()).await
}

/// GET /api/integrations/connections/{id}
pub async fn get_connection(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Connection>> {
    records::get_one(&state.connections, &id).await
}

/// PATCH /api/integrations/connections/{id}
pub async fn update_connection(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> ApiResult<Json<Connection>> {
    let Json(patch) = body?;
    records::check_patch_name(&patch, "Connection")?;
    records::patch_one(&state.connections, &id, patch).await
}

/// DELETE /api/integrations/connections/{id}
pub async fn delete_connection(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    records::delete_one(&state.connections, &id).await
}
