use std::path::PathBuf;
use thiserror::Error;

/// Who caused a failure, as seen by the caller of an orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Client,
    Server,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No files uploaded")]
    EmptyBatch,

    #[error("No filename provided")]
    MissingFileName,

    #[error("File {file_name} must be a PDF file (allowed: {allowed})")]
    DisallowedExtension { file_name: String, allowed: String },

    #[error("File {file_name} is too large ({size} bytes). Maximum size: {}MB", .limit / (1024 * 1024))]
    FileTooLarge {
        file_name: String,
        size: u64,
        limit: u64,
    },

    #[error("Question must not be empty")]
    EmptyQuestion,

    #[error("Document content must not be empty")]
    EmptyContent,

    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("embedding dimension {actual} != {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("extraction failed for {}: {cause}", .path.display())]
    Extraction { path: PathBuf, cause: String },

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),
}

impl IngestError {
    pub fn extraction(path: impl Into<PathBuf>, cause: impl ToString) -> Self {
        Self::Extraction {
            path: path.into(),
            cause: cause.to_string(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Validation(_) => ErrorClass::Client,
            _ => ErrorClass::Server,
        }
    }
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("retrieval failed: {0}")]
    Storage(#[from] StoreError),

    #[error("completion failed: {0}")]
    Completion(StoreError),
}

impl QueryError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Validation(_) => ErrorClass::Client,
            _ => ErrorClass::Server,
        }
    }
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
