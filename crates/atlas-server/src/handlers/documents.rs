use axum::{
    body::Body,
    extract::{rejection::JsonRejection, rejection::QueryRejection, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use tracing::info;

use atlas_core::api_types::{
    DocumentListQuery, DocumentResponse, ListResponse, UpdateDocumentRequest,
};
use atlas_core::records::{Document, DocumentCategory};
use atlas_ingest::UploadRequest;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

fn parse_flag(field: &str, raw: &str) -> ApiResult<bool> {
    match raw.trim().to_lowercase().as_str() {
        "" | "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(ApiError::bad_request(format!(
            "Field '{field}' must be a boolean, got '{other}'"
        ))),
    }
}

/// MIME type from the file extension, for clients that send
/// `application/octet-stream` or nothing.
fn guess_mime_type(file_name: &str) -> &'static str {
    mime_guess::from_path(file_name)
        .first_raw()
        .unwrap_or("application/octet-stream")
}

/// Read the upload form into an [`UploadRequest`].
async fn read_upload_form(mut multipart: Multipart) -> ApiResult<UploadRequest> {
    let mut upload: Option<UploadRequest> = None;
    let mut category = DocumentCategory::General;
    let mut process = true;
    let mut vectorize = true;
    let mut knowledge_graph = true;
    let mut metadata = None;

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let mime_type = match field.content_type() {
                    Some(ct) if ct != "application/octet-stream" => ct.to_string(),
                    _ => guess_mime_type(&file_name).to_string(),
                };
                let bytes = field.bytes().await?;
                upload = Some(UploadRequest::new(file_name, mime_type, bytes.to_vec()));
            }
            "category" => {
                let raw = field.text().await?;
                category = DocumentCategory::parse(&raw)
                    .ok_or_else(|| ApiError::bad_request(format!("Unknown category '{raw}'")))?;
            }
            "process" => process = parse_flag("process", &field.text().await?)?,
            "vectorize" => vectorize = parse_flag("vectorize", &field.text().await?)?,
            "knowledgeGraph" => {
                knowledge_graph = parse_flag("knowledgeGraph", &field.text().await?)?
            }
            "metadata" => {
                let raw = field.text().await?;
                if !raw.trim().is_empty() {
                    let value: serde_json::Value = serde_json::from_str(&raw).map_err(|e| {
                        ApiError::bad_request(format!("Field 'metadata' is not valid JSON: {e}"))
                    })?;
                    if !value.is_object() {
                        return Err(ApiError::bad_request("Field 'metadata' must be a JSON object"));
                    }
                    metadata = Some(value);
                }
            }
            _ => {}
        }
    }

    let mut upload = upload.ok_or_else(|| ApiError::bad_request("Missing 'file' field"))?;
    upload.category = category;
    upload.process = process;
    upload.vectorize = vectorize;
    upload.knowledge_graph = knowledge_graph;
    upload.metadata = metadata;
    Ok(upload)
}

/// POST /api/documents (multipart)
pub async fn upload_document(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<DocumentResponse>)> {
    let request = read_upload_form(multipart).await?;
    info!(
        name = %request.file_name,
        mime_type = %request.mime_type,
        size = request.bytes.len(),
        process = request.process,
        vectorize = request.vectorize,
        knowledge_graph = request.knowledge_graph,
        "Uploading document"
    );

    let settings = state.current_settings().await?;
    let document = state.uploads.upload(request, &settings).await?;
    Ok((StatusCode::CREATED, Json(DocumentResponse { document })))
}

/// GET /api/documents
pub async fn list_documents(
    State(state): State<AppState>,
    query: Result<Query<DocumentListQuery>, QueryRejection>,
) -> ApiResult<Json<ListResponse<Document>>> {
    let Query(query) = query?;
    let mut documents = state.uploads.documents().list().await?;
    if let Some(category) = query.category {
        documents.retain(|d| d.category == category);
    }
    documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(documents.into()))
}

/// GET /api/documents/{id}
pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DocumentResponse>> {
    let document = state.uploads.documents().get(&id).await?;
    Ok(Json(DocumentResponse { document }))
}

/// PATCH /api/documents/{id}
pub async fn update_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<UpdateDocumentRequest>, JsonRejection>,
) -> ApiResult<Json<DocumentResponse>> {
    let Json(request) = body?;
    let mut patch = serde_json::Map::new();
    if let Some(name) = request.name {
        if name.trim().is_empty() {
            return Err(ApiError::bad_request("Document name must not be empty"));
        }
        patch.insert("name".into(), name.trim().into());
    }
    if let Some(category) = request.category {
        patch.insert("category".into(), serde_json::to_value(category).map_err(atlas_core::AtlasError::from)?);
    }
    if let Some(metadata) = request.metadata {
        if !metadata.is_object() {
            return Err(ApiError::bad_request("metadata must be a JSON object"));
        }
        patch.insert("metadata".into(), metadata);
    }

    info!(document_id = %id, fields = patch.len(), "Updating document");
    let document = state
        .uploads
        .documents()
        .patch(&id, serde_json::Value::Object(patch))
        .await?;
    Ok(Json(DocumentResponse { document }))
}

/// DELETE /api/documents/{id}
pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    info!(document_id = %id, "Deleting document");
    state.uploads.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/documents/{id}/content
pub async fn document_content(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let (document, bytes) = state.uploads.content(&id).await?;
    let disposition = format!(
        "inline; filename=\"{}\"",
        atlas_store::sanitize_file_name(&document.name)
    );
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, document.mime_type)
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from(bytes))
        .map_err(|e| {
            ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to build response",
                Some(e.to_string()),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_accept_common_spellings() {
        assert!(parse_flag("process", "true").unwrap());
        assert!(parse_flag("process", "").unwrap());
        assert!(!parse_flag("process", "Off").unwrap());
        assert!(!parse_flag("process", "0").unwrap());
        assert!(parse_flag("process", "maybe").is_err());
    }

    #[test]
    fn mime_type_is_guessed_from_extension() {
        assert_eq!(guess_mime_type("Report.PDF"), "application/pdf");
        assert_eq!(guess_mime_type("notes.md"), "text/markdown");
        assert_eq!(guess_mime_type("archive"), "application/octet-stream");
    }
}
