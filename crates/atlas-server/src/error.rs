use axum::extract::multipart::MultipartError;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{error, warn};

use atlas_core::api_types::ErrorBody;
use atlas_core::AtlasError;

/// Error returned by handlers, rendered as `{error, details}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: String,
    details: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>, details: Option<String>) -> Self {
        Self {
            status,
            error: error.into(),
            details,
        }
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error, None)
    }

    pub fn not_found(error: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, error, None)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<AtlasError> for ApiError {
    fn from(e: AtlasError) -> Self {
        match e {
            AtlasError::Validation(msg) => Self::new(StatusCode::BAD_REQUEST, "Invalid request", Some(msg)),
            AtlasError::NotFound(msg) => Self::new(StatusCode::NOT_FOUND, "Not found", Some(msg)),
            connector @ AtlasError::Connector { .. } => Self::new(
                StatusCode::BAD_GATEWAY,
                "Upstream service error",
                Some(connector.to_string()),
            ),
            other => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                Some(other.to_string()),
            ),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "Malformed JSON body",
            Some(rejection.body_text()),
        )
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "Invalid query parameters",
            Some(rejection.body_text()),
        )
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "Invalid multipart payload", Some(e.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, error = %self.error, details = ?self.details, "Request failed");
        } else {
            warn!(status = %self.status, error = %self.error, details = ?self.details, "Request rejected");
        }
        let body = ErrorBody {
            error: self.error,
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_domain_errors_to_status_codes() {
        let cases = [
            (AtlasError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (AtlasError::NotFound("gone".into()), StatusCode::NOT_FOUND),
            (AtlasError::Graph("down".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (AtlasError::Store("down".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (
                AtlasError::Connector {
                    connector: "pipedream".into(),
                    message: "timeout".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn details_carry_the_underlying_message() {
        let err = ApiError::from(AtlasError::Graph("neo4j timed out".into()));
        assert_eq!(err.error, "Internal server error");
        assert!(err.details.unwrap().contains("neo4j timed out"));
    }
}
