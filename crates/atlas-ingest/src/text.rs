use async_trait::async_trait;
use serde::Deserialize;

use atlas_core::config::AppConfig;
use atlas_core::error::{AtlasError, Result};
use atlas_core::ingest::TextExtractor;

const PROCESSOR_TIMEOUT_SECS: u64 = 60;

fn essence(mime_type: &str) -> String {
    mime_type.split(';').next().unwrap_or("").trim().to_lowercase()
}

pub fn is_textual(mime_type: &str) -> bool {
    let essence = essence(mime_type);
    essence.starts_with("text/")
        || matches!(
            essence.as_str(),
            "application/json" | "application/xml" | "application/x-yaml"
        )
}

fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Built-in extraction for textual uploads. Binary formats yield `None`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract_text(
        &self,
        _name: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<Option<String>> {
        if !is_textual(mime_type) {
            return Ok(None);
        }
        let text = String::from_utf8_lossy(bytes);
        if essence(mime_type) == "text/html" {
            return Ok(Some(strip_tags(&text)));
        }
        Ok(Some(text.into_owned()))
    }
}

/// Client for the hosted document-processing service. The raw file is
/// posted as the request body; the service answers `{"text": "..."}`.
pub struct HttpDocumentProcessor {
    client: reqwest::Client,
    url: String,
}

#[derive(Debug, Deserialize)]
struct ProcessorResponse {
    #[serde(default)]
    text: Option<String>,
}

impl HttpDocumentProcessor {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(PROCESSOR_TIMEOUT_SECS))
            .build()
            .map_err(|e| AtlasError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl TextExtractor for HttpDocumentProcessor {
    async fn extract_text(
        &self,
        name: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<Option<String>> {
        tracing::debug!(name, mime_type, size = bytes.len(), "Sending file to document processor");

        let response = self
            .client
            .post(&self.url)
            .header("content-type", mime_type)
            .header("x-file-name", urlencoding::encode(name).into_owned())
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| AtlasError::Extraction(format!("Document processor unreachable: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNSUPPORTED_MEDIA_TYPE {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(AtlasError::Extraction(format!(
                "Document processor returned status {status}"
            )));
        }

        let parsed: ProcessorResponse = response.json().await.map_err(|e| {
            AtlasError::Extraction(format!("Failed to parse document processor response: {e}"))
        })?;
        Ok(parsed.text)
    }
}

/// Uses the hosted processor when configured and falls back to built-in
/// extraction when it has nothing to offer.
pub struct DocumentTextExtractor {
    processor: Option<HttpDocumentProcessor>,
    plain: PlainTextExtractor,
}

impl DocumentTextExtractor {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let processor = match config.document_processor_url.as_deref() {
            Some(url) if !url.trim().is_empty() => Some(HttpDocumentProcessor::new(url)?),
            _ => None,
        };
        Ok(Self {
            processor,
            plain: PlainTextExtractor,
        })
    }
}

#[async_trait]
impl TextExtractor for DocumentTextExtractor {
    async fn extract_text(
        &self,
        name: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<Option<String>> {
        if let Some(processor) = &self.processor {
            match processor.extract_text(name, mime_type, bytes).await {
                Ok(Some(text)) => return Ok(Some(text)),
                Ok(None) => {}
                Err(e) if is_textual(mime_type) => {
                    tracing::warn!(name, error = %e, "Document processor failed, using plain text");
                }
                Err(e) => return Err(e),
            }
        }
        self.plain.extract_text(name, mime_type, bytes).await
    }
}
