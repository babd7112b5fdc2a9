use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use tracing::info;

use atlas_core::records::SETTINGS_ID;
use atlas_core::{AtlasError, Settings};

use crate::error::ApiResult;
use crate::state::AppState;

fn validate(settings: &Settings) -> Result<(), AtlasError> {
    if settings.chunk_size == 0 {
        return Err(AtlasError::Validation("chunkSize must be greater than 0".into()));
    }
    if settings.chunk_overlap >= settings.chunk_size {
        return Err(AtlasError::Validation(
            "chunkOverlap must be smaller than chunkSize".into(),
        ));
    }
    if settings.max_chunks == 0 {
        return Err(AtlasError::Validation("maxChunks must be greater than 0".into()));
    }
    if settings.max_upload_bytes == 0 {
        return Err(AtlasError::Validation("maxUploadBytes must be greater than 0".into()));
    }
    if settings.metrics_interval_secs == 0 {
        return Err(AtlasError::Validation(
            "metricsIntervalSecs must be at least 1".into(),
        ));
    }
    Ok(())
}

/// GET /api/settings
pub async fn get_settings(State(state): State<AppState>) -> ApiResult<Json<Settings>> {
    Ok(Json(state.current_settings().await?))
}

/// PATCH /api/settings
pub async fn update_settings(
    State(state): State<AppState>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> ApiResult<Json<Settings>> {
    let Json(patch) = body?;
    let stored = state.settings.find(SETTINGS_ID).await?;
    let current = stored.clone().unwrap_or_default();

    let merged = atlas_store::merge_patch(&current, patch)?;
    validate(&merged)?;

    let saved = match stored {
        Some(_) => state.settings.save(merged).await?,
        None => state.settings.create(merged).await?,
    };
    info!(
        chunk_size = saved.chunk_size,
        chunk_overlap = saved.chunk_overlap,
        max_chunks = saved.max_chunks,
        "Settings updated"
    );
    Ok(Json(saved))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate(&Settings::default()).is_ok());
    }

    #[test]
    fn overlap_must_stay_below_chunk_size() {
        let settings = Settings {
            chunk_size: 100,
            chunk_overlap: 100,
            ..Settings::default()
        };
        assert!(matches!(validate(&settings), Err(AtlasError::Validation(_))));
    }

    #[test]
    fn metrics_interval_cannot_be_zero() {
        let settings = Settings {
            metrics_interval_secs: 0,
            ..Settings::default()
        };
        assert!(validate(&settings).is_err());
    }
}
