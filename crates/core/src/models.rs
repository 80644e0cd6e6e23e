use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Text of one physical page as returned by an extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPage {
    pub source_file_name: String,
    pub page_number: u32,
    pub text: String,
}

/// Attribution shared by every chunk cut from the same page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkMetadata {
    pub file_name: String,
    pub page_number: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChunkMetadata {
    pub fn new(file_name: impl Into<String>, page_number: u32) -> Self {
        Self {
            file_name: file_name.into(),
            page_number,
            extra: Map::new(),
        }
    }

    pub fn from_page(page: &ExtractedPage) -> Self {
        Self::new(page.source_file_name.clone(), page.page_number)
    }

    pub fn is_attributable(&self) -> bool {
        !self.file_name.trim().is_empty() && self.page_number >= 1
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone)]
pub struct StoredEmbeddingRecord {
    pub id: Uuid,
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

impl StoredEmbeddingRecord {
    pub fn new(chunk: Chunk, embedding: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            chunk,
            embedding,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
    pub chunk: Chunk,
    pub similarity_score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnswerPayload {
    pub answer_text: String,
    pub supporting_chunks: Vec<Chunk>,
}

/// One file of an upload batch, fully buffered.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub declared_size: Option<u64>,
    pub content: Vec<u8>,
}

impl UploadedFile {
    pub fn new(file_name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            file_name: Some(file_name.into()),
            declared_size: Some(content.len() as u64),
            content,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestionSummary {
    pub message: String,
    pub documents_indexed: usize,
    pub total_chunks: usize,
}

#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub allowed_extensions: Vec<String>,
    pub max_file_size: u64,
}

pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            allowed_extensions: vec![".pdf".to_string()],
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub similarity_threshold: f64,
    pub temperature: f64,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            similarity_threshold: 0.7,
            temperature: 0.0,
        }
    }
}
