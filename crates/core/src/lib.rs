pub mod chunking;
pub mod completion;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod models;
pub mod openai;
pub mod query;
pub mod store;
pub mod stores;
pub mod temp_storage;
pub mod traits;

#[cfg(test)]
mod test_support;

pub use chunking::{chunk_pages, ChunkingConfig, RecursiveSplitter};
pub use completion::{CompletionModel, Message, Role};
pub use embeddings::{CharacterNgramEmbedder, Embedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{ErrorClass, IngestError, QueryError, StoreError, ValidationError};
pub use extractor::{PageExtractor, TextLayerExtractor, VisionOcrConfig, VisionOcrExtractor};
pub use ingest::{discover_files, uploads_from_folder, DocumentIngestor, IngestStage};
pub use models::{
    AnswerPayload, Chunk, ChunkMetadata, ExtractedPage, IngestionSummary, RetrievalResult,
    RetrievalSettings, StoredEmbeddingRecord, UploadPolicy, UploadedFile,
};
pub use openai::{OpenAiCompletion, OpenAiConfig, OpenAiEmbedder};
pub use query::{QuestionAnswerer, NO_RELEVANT_DOCUMENTS};
pub use store::EmbeddingStore;
pub use stores::{InMemoryStore, PgConnection, PgVectorStore};
pub use temp_storage::{BatchScope, TempStorage};
pub use traits::VectorIndex;
