use crate::config::{EmbeddingProvider, ExtractionBackend, Settings, VectorBackend};
use anyhow::Context;
use pdf_qa_core::{
    CharacterNgramEmbedder, CompletionModel, DocumentIngestor, Embedder, EmbeddingStore,
    InMemoryStore, OpenAiCompletion, OpenAiEmbedder, PageExtractor, PgVectorStore,
    QuestionAnswerer, RecursiveSplitter, TempStorage, TextLayerExtractor, VectorIndex,
    VisionOcrExtractor,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared by every handler and CLI command.
#[derive(Clone)]
pub struct AppState {
    pub ingestor: DocumentIngestor,
    pub answerer: QuestionAnswerer,
    pub store: EmbeddingStore,
    pub max_request_size: usize,
}

impl AppState {
    pub async fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let splitter = RecursiveSplitter::new(settings.chunking()?)?;
        let retrieval = settings.retrieval().map_err(anyhow::Error::msg)?;

        if settings.openai_api_key.is_none() {
            warn!("OPENAI_API_KEY is not set; completion requests will be rejected");
        }

        let embedder: Arc<dyn Embedder> = match settings.embedding_provider {
            EmbeddingProvider::Openai => Arc::new(OpenAiEmbedder::new(
                settings.openai()?,
                &settings.embedding_model,
                settings.embedding_dimensions,
            )),
            EmbeddingProvider::Local => Arc::new(CharacterNgramEmbedder {
                dimensions: settings.embedding_dimensions,
            }),
        };

        let index: Arc<dyn VectorIndex> = match settings.vector_store {
            VectorBackend::Postgres => {
                let store = PgVectorStore::connect(
                    &settings.pg_connection(),
                    &settings.collection_name,
                    embedder.dimensions(),
                )
                .await
                .context("connecting to postgres")?;
                store
                    .ensure_schema()
                    .await
                    .context("preparing pgvector schema")?;
                Arc::new(store)
            }
            VectorBackend::Memory => Arc::new(InMemoryStore::new(embedder.dimensions())),
        };

        let extractor: Arc<dyn PageExtractor> = match settings.extraction_backend {
            ExtractionBackend::Vision => Arc::new(VisionOcrExtractor::new(settings.vision_ocr())),
            ExtractionBackend::TextLayer => Arc::new(TextLayerExtractor),
        };

        let completion: Arc<dyn CompletionModel> = Arc::new(OpenAiCompletion::new(
            settings.openai()?,
            &settings.completion_model,
        ));

        let storage = TempStorage::new(settings.temp_root())?;
        info!(
            collection = %settings.collection_name,
            vector_store = ?settings.vector_store,
            embedding_provider = ?settings.embedding_provider,
            extraction_backend = ?settings.extraction_backend,
            temp_root = %storage.root().display(),
            "components ready"
        );

        let store = EmbeddingStore::new(splitter, embedder, index);
        Ok(Self {
            ingestor: DocumentIngestor::new(
                storage,
                extractor,
                store.clone(),
                settings.upload_policy(),
            ),
            answerer: QuestionAnswerer::new(store.clone(), completion, retrieval),
            store,
            max_request_size: settings.max_request_size,
        })
    }
}
