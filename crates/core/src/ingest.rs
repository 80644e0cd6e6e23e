use crate::extractor::PageExtractor;
use crate::store::EmbeddingStore;
use crate::temp_storage::TempStorage;
use crate::{IngestError, IngestionSummary, UploadPolicy, UploadedFile, ValidationError};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;
use walkdir::WalkDir;

pub const SUCCESS_MESSAGE: &str = "Documents processed successfully";

/// Where a batch is in its lifecycle. `Failed` is reachable from every
/// non-terminal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    Received,
    Validating,
    Saving,
    Extracting,
    ChunkingAndStoring,
    Completed,
    Failed,
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Validating => "validating",
            Self::Saving => "saving",
            Self::Extracting => "extracting",
            Self::ChunkingAndStoring => "chunking_and_storing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Runs upload batches through save, extract, chunk and store.
#[derive(Clone)]
pub struct DocumentIngestor {
    storage: TempStorage,
    extractor: Arc<dyn PageExtractor>,
    store: EmbeddingStore,
    policy: UploadPolicy,
}

struct BatchProgress {
    stage: IngestStage,
    documents_indexed: usize,
    total_chunks: usize,
}

impl BatchProgress {
    fn advance(&mut self, stage: IngestStage) {
        debug!(from = %self.stage, to = %stage, "batch stage");
        self.stage = stage;
    }
}

impl DocumentIngestor {
    pub fn new(
        storage: TempStorage,
        extractor: Arc<dyn PageExtractor>,
        store: EmbeddingStore,
        policy: UploadPolicy,
    ) -> Self {
        Self {
            storage,
            extractor,
            store,
            policy,
        }
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Ingests the whole batch or fails as a unit. Every file is validated
    /// before anything touches the disk; files are then processed one at a
    /// time. The batch directory is removed on every exit path.
    pub async fn ingest_batch(&self, files: Vec<UploadedFile>) -> Result<IngestionSummary, IngestError> {
        let batch_id = Uuid::new_v4();
        let span = info_span!("ingest_batch", %batch_id, files = files.len());
        self.run_batch(files).instrument(span).await
    }

    async fn run_batch(&self, files: Vec<UploadedFile>) -> Result<IngestionSummary, IngestError> {
        let mut progress = BatchProgress {
            stage: IngestStage::Received,
            documents_indexed: 0,
            total_chunks: 0,
        };
        info!("starting document processing");

        let result = self.process(files, &mut progress).await;
        match &result {
            Ok(summary) => {
                progress.advance(IngestStage::Completed);
                info!(
                    documents_indexed = summary.documents_indexed,
                    total_chunks = summary.total_chunks,
                    "document processing completed"
                );
            }
            Err(failure) => {
                let failed_at = progress.stage;
                progress.advance(IngestStage::Failed);
                match failure {
                    IngestError::Validation(reason) => {
                        warn!(stage = %failed_at, %reason, "upload rejected")
                    }
                    other => error!(
                        stage = %failed_at,
                        error = %other,
                        stored_before_failure = progress.documents_indexed,
                        chunks_before_failure = progress.total_chunks,
                        "document processing failed"
                    ),
                }
            }
        }
        result
    }

    async fn process(
        &self,
        files: Vec<UploadedFile>,
        progress: &mut BatchProgress,
    ) -> Result<IngestionSummary, IngestError> {
        progress.advance(IngestStage::Validating);
        let names = self.validate_batch(&files)?;

        let scope = self.storage.create_batch_scope()?;

        for (file, file_name) in files.iter().zip(&names) {
            debug!(file_name = %file_name, "processing file");

            progress.advance(IngestStage::Saving);
            let destination = scope.file_path(file_name)?;
            let written = self
                .storage
                .persist(&mut file.content.as_slice(), &destination)
                .await?;
            info!(
                path = %destination.display(),
                bytes = written,
                sha256 = %digest_bytes(&file.content),
                "saved upload"
            );

            progress.advance(IngestStage::Extracting);
            let pages = self.extractor.extract(&destination).await?;

            progress.advance(IngestStage::ChunkingAndStoring);
            let chunks = self.store.chunk(&pages);
            let inserted = self.store.upsert(chunks).await?;
            info!(file_name = %file_name, pages = pages.len(), chunks = inserted, "indexed file");

            progress.documents_indexed += 1;
            progress.total_chunks += inserted;
        }

        drop(scope);

        Ok(IngestionSummary {
            message: SUCCESS_MESSAGE.to_string(),
            documents_indexed: progress.documents_indexed,
            total_chunks: progress.total_chunks,
        })
    }

    /// Checks every file against the policy and returns the file names in
    /// batch order. The first violation rejects the batch.
    pub fn validate_batch(&self, files: &[UploadedFile]) -> Result<Vec<String>, ValidationError> {
        if files.is_empty() {
            return Err(ValidationError::EmptyBatch);
        }
        files.iter().map(|file| self.validate_file(file)).collect()
    }

    fn validate_file(&self, file: &UploadedFile) -> Result<String, ValidationError> {
        let file_name = file
            .file_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or(ValidationError::MissingFileName)?;

        let extension = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{}", ext.to_lowercase()))
            .unwrap_or_default();

        if !self.policy.allowed_extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(&extension)) {
            return Err(ValidationError::DisallowedExtension {
                file_name: file_name.to_string(),
                allowed: self.policy.allowed_extensions.join(", "),
            });
        }

        if let Some(size) = file.declared_size {
            if size > self.policy.max_file_size {
                return Err(ValidationError::FileTooLarge {
                    file_name: file_name.to_string(),
                    size,
                    limit: self.policy.max_file_size,
                });
            }
        }

        debug!(file_name, "file validation passed");
        Ok(file_name.to_string())
    }
}

pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Every file under `folder` whose extension is in `extensions`, sorted.
pub fn discover_files(folder: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let wanted = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                extensions
                    .iter()
                    .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext))
            });

        if wanted {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

/// Loads the matching files of a folder as one upload batch.
pub async fn uploads_from_folder(
    folder: &Path,
    policy: &UploadPolicy,
) -> Result<Vec<UploadedFile>, IngestError> {
    let mut uploads = Vec::new();
    for path in discover_files(folder, &policy.allowed_extensions) {
        let content = tokio::fs::read(&path).await?;
        uploads.push(UploadedFile {
            file_name: path
                .file_name()
                .and_then(|name| name.to_str())
                .map(str::to_string),
            declared_size: Some(content.len() as u64),
            content,
        });
    }
    Ok(uploads)
}
