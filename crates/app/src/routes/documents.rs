use super::error::ApiError;
use crate::state::AppState;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::routing::post;
use axum::{Json, Router};
use pdf_qa_core::{Chunk, ChunkMetadata, IngestionSummary, UploadedFile, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Multipart field names accepted as uploaded files.
const FILE_FIELDS: [&str; 2] = ["files", "file"];

pub const DOCUMENT_ADDED: &str = "Document added successfully";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/documents", post(upload_documents))
        .route("/add_document", post(add_document))
}

async fn upload_documents(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<IngestionSummary>, ApiError> {
    let mut multipart = multipart?;
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| ApiError::bad_request(format!("Malformed upload: {error}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if !FILE_FIELDS.contains(&name.as_str()) {
            debug!(field = %name, "ignoring non-file form field");
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let content = field
            .bytes()
            .await
            .map_err(|error| ApiError::bad_request(format!("Malformed upload: {error}")))?
            .to_vec();

        files.push(UploadedFile {
            file_name,
            declared_size: Some(content.len() as u64),
            content,
        });
    }

    let summary = state.ingestor.ingest_batch(files).await?;
    Ok(Json(summary))
}

#[derive(Debug, Deserialize)]
struct AddDocumentRequest {
    page_content: String,
    #[serde(default)]
    metadata: Value,
}

#[derive(Debug, Serialize)]
struct AddDocumentResponse {
    message: &'static str,
    id: Uuid,
}

async fn add_document(
    State(state): State<Arc<AppState>>,
    body: Result<Json<AddDocumentRequest>, JsonRejection>,
) -> Result<Json<AddDocumentResponse>, ApiError> {
    let Json(request) = body?;
    if request.page_content.trim().is_empty() {
        return Err(ValidationError::EmptyContent.into());
    }

    let metadata = parse_metadata(request.metadata)?;
    let id = state
        .store
        .add_document(Chunk {
            text: request.page_content,
            metadata,
        })
        .await?;

    Ok(Json(AddDocumentResponse {
        message: DOCUMENT_ADDED,
        id,
    }))
}

fn parse_metadata(raw: Value) -> Result<ChunkMetadata, ValidationError> {
    let metadata: ChunkMetadata = serde_json::from_value(raw)
        .map_err(|error| ValidationError::InvalidMetadata(error.to_string()))?;

    if !metadata.is_attributable() {
        return Err(ValidationError::InvalidMetadata(
            "file_name must be non-empty and page_number at least 1".to_string(),
        ));
    }
    Ok(metadata)
}
