use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};

use atlas_core::api_types::{ListResponse, NewAgent};
use atlas_core::Agent;

use super::records;
use crate::error::ApiResult;
use crate::state::AppState;

/// GET /api/agents
pub async fn list_agents(State(state): State<AppState>) -> ApiResult<Json<ListResponse<Agent>>> {
    records::list_all(&state.agents).await
}

/// POST /api/agents
pub async fn create_agent(
    State(state): State<AppState>,
    body: Result<Json<NewAgent>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Agent>)> {
    let Json(agent) = body?;
    records::require_name(&agent.name, "Agent")?;
    records::create_one(&state.agents, agent.into_record()).await
}

/// GET /api/agents/{id}
pub async fn get_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Agent>> {
    records::get_one(&state.agents, &id).await
}

/// PATCH /api/agents/{id}
pub async fn update_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> ApiResult<Json<Agent>> {
    let Json(patch) = body?;
    records::check_patch_name(&patch, "Agent")?;
    records::patch_one(&state.agents, &id, patch).await
}

/// DELETE /api/agents/{id}
pub async fn delete_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    records::delete_one(&state.agents, &id).await
}
