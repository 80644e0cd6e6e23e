use crate::error::IngestError;
use crate::models::ExtractedPage;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use lopdf::Document;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::path::Path;
use tracing::{debug, error, info};

/// Turns a file on disk into page-tagged text.
#[async_trait]
pub trait PageExtractor: Send + Sync {
    async fn extract(&self, path: &Path) -> Result<Vec<ExtractedPage>, IngestError>;
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
struct VisionOcrRequest {
    model: String,
    file_name: String,
    pdf_base64: String,
    maintain_format: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
struct VisionOcrResponse {
    #[serde(default)]
    file_name: Option<String>,
    pages: Option<Vec<VisionOcrPage>>,
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct VisionOcrPage {
    #[serde(default)]
    page: Option<u32>,
    #[serde(default, alias = "content")]
    text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VisionOcrConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
}

/// Client for an external vision/OCR service that reads a whole PDF and
/// answers with per-page markdown.
pub struct VisionOcrExtractor {
    config: VisionOcrConfig,
    client: Client,
}

impl VisionOcrExtractor {
    pub fn new(config: VisionOcrConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    async fn request_pages(&self, path: &Path, file_name: &str) -> Result<Vec<ExtractedPage>, IngestError> {
        let pdf = tokio::fs::read(path).await?;
        let payload = VisionOcrRequest {
            model: self.config.model.clone(),
            file_name: file_name.to_string(),
            pdf_base64: STANDARD.encode(pdf),
            maintain_format: None,
        };

        let mut request = self.client.post(&self.config.endpoint).json(&payload);
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|error| IngestError::extraction(path, error))?;

        if !response.status().is_success() {
            return Err(IngestError::extraction(
                path,
                format!(
                    "vision OCR request to {} returned {}",
                    self.config.endpoint,
                    response.status()
                ),
            ));
        }

        let body: VisionOcrResponse = response
            .json()
            .await
            .map_err(|error| IngestError::extraction(path, error))?;

        payload_to_pages(&body, file_name, path)
    }
}

#[async_trait]
impl PageExtractor for VisionOcrExtractor {
    async fn extract(&self, path: &Path) -> Result<Vec<ExtractedPage>, IngestError> {
        let file_name = source_file_name(path)?;
        info!(path = %path.display(), model = %self.config.model, "starting OCR");

        match self.request_pages(path, &file_name).await {
            Ok(pages) => {
                info!(path = %path.display(), pages = pages.len(), "OCR completed");
                Ok(pages)
            }
            Err(error) => {
                error!(path = %path.display(), %error, "OCR failed");
                Err(error)
            }
        }
    }
}

/// Reads the embedded text layer of a PDF with lopdf. Scanned documents
/// come back as empty pages.
#[derive(Debug, Default)]
pub struct TextLayerExtractor;

#[async_trait]
impl PageExtractor for TextLayerExtractor {
    async fn extract(&self, path: &Path) -> Result<Vec<ExtractedPage>, IngestError> {
        let file_name = source_file_name(path)?;
        let owned = path.to_path_buf();

        tokio::task::spawn_blocking(move || read_text_layer(&owned, &file_name))
            .await
            .map_err(|error| IngestError::extraction(path, error))?
    }
}

fn read_text_layer(path: &Path, file_name: &str) -> Result<Vec<ExtractedPage>, IngestError> {
    let document = Document::load(path).map_err(|error| IngestError::extraction(path, error))?;

    let mut pages = Vec::new();
    for (page_no, _page_id) in document.get_pages() {
        let text = document
            .extract_text(&[page_no])
            .map_err(|error| IngestError::extraction(path, error))?;

        pages.push(ExtractedPage {
            source_file_name: file_name.to_string(),
            page_number: page_no,
            text: text.trim().to_string(),
        });
    }

    if pages.is_empty() {
        return Err(IngestError::extraction(path, "pdf has no pages"));
    }

    debug!(path = %path.display(), pages = pages.len(), "read pdf text layer");
    Ok(pages)
}

fn source_file_name(path: &Path) -> Result<String, IngestError> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| IngestError::extraction(path, "path has no file name"))
}

fn payload_to_pages(
    payload: &VisionOcrResponse,
    file_name: &str,
    path: &Path,
) -> Result<Vec<ExtractedPage>, IngestError> {
    if let Some(reported) = &payload.file_name {
        debug!(reported = %reported, file_name, "OCR service echoed file name");
    }

    if let Some(listed) = &payload.pages {
        if !listed.is_empty() {
            let mut pages = listed
                .iter()
                .enumerate()
                .map(|(index, page)| ExtractedPage {
                    source_file_name: file_name.to_string(),
                    page_number: page.page.filter(|number| *number >= 1).unwrap_or(index as u32 + 1),
                    text: page.text.as_deref().unwrap_or_default().trim().to_string(),
                })
                .collect::<Vec<_>>();
            pages.sort_by_key(|page| page.page_number);
            return Ok(pages);
        }
    }

    if let Some(raw_text) = &payload.text {
        let pages = raw_text
            .split('\u{000c}')
            .enumerate()
            .map(|(index, text)| ExtractedPage {
                source_file_name: file_name.to_string(),
                page_number: (index + 1) as u32,
                text: text.trim().to_string(),
            })
            .collect::<Vec<_>>();

        if pages.iter().any(|page| !page.text.is_empty()) {
            return Ok(pages);
        }
    }

    Err(IngestError::extraction(path, "vision OCR response was empty"))
}
