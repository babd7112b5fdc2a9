use thiserror::Error;

#[derive(Error, Debug)]
pub enum AtlasError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Graph database error: {0}")]
    Graph(String),

    #[error("Record store error: {0}")]
    Store(String),

    #[error("Object store error: {0}")]
    ObjectStore(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Connector error ({connector}): {message}")]
    Connector { connector: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AtlasError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AtlasError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, AtlasError>;
