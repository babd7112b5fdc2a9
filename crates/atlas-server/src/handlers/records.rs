//! Shared CRUD plumbing for the passive record tables.

use axum::{http::StatusCode, Json};
use tracing::info;

use atlas_core::api_types::ListResponse;
use atlas_core::Record;
use atlas_store::Repository;

use crate::error::{ApiError, ApiResult};

pub fn require_name(name: &str, kind: &str) -> ApiResult<()> {
    if name.trim().is_empty() {
        return Err(ApiError::bad_request(format!("{kind} name must not be empty")));
    }
    Ok(())
}

/// Reject patches that would blank out the `name` field.
pub fn check_patch_name(patch: &serde_json::Value, kind: &str) -> ApiResult<()> {
    match patch.get("name") {
        Some(serde_json::Value::String(name)) => require_name(name, kind),
        Some(serde_json::Value::Null) => {
            Err(ApiError::bad_request(format!("{kind} name must not be empty")))
        }
        _ => Ok(()),
    }
}

pub async fn list_all<T: Record>(repo: &Repository<T>) -> ApiResult<Json<ListResponse<T>>> {
    let items = repo.list().await?;
    info!(table = T::TABLE, count = items.len(), "Listed records");
    Ok(Json(items.into()))
}

pub async fn create_one<T: Record>(
    repo: &Repository<T>,
    record: T,
) -> ApiResult<(StatusCode, Json<T>)> {
    let created = repo.create(record).await?;
    info!(table = T::TABLE, id = created.id(), "Created record");
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_one<T: Record>(repo: &Repository<T>, id: &str) -> ApiResult<Json<T>> {
    Ok(Json(repo.get(id).await?))
}

pub async fn patch_one<T: Record>(
    repo: &Repository<T>,
    id: &str,
    patch: serde_json::Value,
) -> ApiResult<Json<T>> {
    let updated = repo.patch(id, patch).await?;
    info!(table = T::TABLE, id, "Updated record");
    Ok(Json(updated))
}

pub async fn delete_one<T: Record>(repo: &Repository<T>, id: &str) -> ApiResult<StatusCode> {
    repo.delete(id).await?;
    info!(table = T::TABLE, id, "Deleted record");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_names_are_rejected() {
        assert!(require_name("Planner", "Agent").is_ok());
        assert_eq!(
            require_name("   ", "Agent").unwrap_err().status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn patches_may_omit_but_not_blank_the_name() {
        assert!(check_patch_name(&json!({"status": "active"}), "Workflow").is_ok());
        assert!(check_patch_name(&json!({"name": "Renamed"}), "Workflow").is_ok());
        assert!(check_patch_name(&json!({"name": ""}), "Workflow").is_err());
        assert!(check_patch_name(&json!({"name": null}), "Workflow").is_err());
    }
}
