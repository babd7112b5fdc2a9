use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};

use atlas_core::api_types::{ListResponse, NewWorkflow};
use atlas_core::Workflow;

use super::records;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

fn check_steps(steps: &[atlas_core::records::WorkflowStep]) -> ApiResult<()> {
    if let Some(index) = steps.iter().position(|s| s.action.trim().is_empty()) {
        return Err(ApiError::bad_request(format!(
            "Workflow step {index} has no action"
        )));
    }
    Ok(())
}

/// GET /api/workflows
pub async fn list_workflows(
    State(state): State<AppState>,
) -> ApiResult<Json<ListResponse<Workflow>>> {
    records::list_all(&state.workflows).await
}

/// POST /api/workflows
pub async fn create_workflow(
    State(state): State<AppState>,
    body: Result<Json<NewWorkflow>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Workflow>)> {
    let Json(workflow) = body?;
    records::require_name(&workflow.name, "Workflow")?;
    check_steps(&workflow.steps)?;
    records::create_one(&state.workflows, workflow.into_record()).await
}

/// GET /api/workflows/{id}
pub async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Workflow>> {
    records::get_one(&state.workflows, &id).await
}

/// PATCH /api/workflows/{id}
pub async fn update_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> ApiResult<Json<Workflow>> {
    let Json(patch) = body?;
    records::check_patch_name(&patch, "Workflow")?;
    let current = state.workflows.get(&id).await?;
    let merged = atlas_store::merge_patch(&current, patch)?;
    check_steps(&merged.steps)?;
    let updated = state.workflows.save(merged).await?;
    tracing::info!(workflow_id = %id, "Updated workflow");
    Ok(Json(updated))
}

/// DELETE /api/workflows/{id}
pub async fn delete_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    records::delete_one(&state.workflows, &id).await
}
