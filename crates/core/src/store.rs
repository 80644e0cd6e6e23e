use crate::chunking::{chunk_pages, RecursiveSplitter};
use crate::embeddings::Embedder;
use crate::traits::VectorIndex;
use crate::{Chunk, ExtractedPage, QueryError, RetrievalResult, StoreError, StoredEmbeddingRecord};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Chunks pages, embeds chunks and reads them back by similarity.
#[derive(Clone)]
pub struct EmbeddingStore {
    splitter: RecursiveSplitter,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl EmbeddingStore {
    pub fn new(
        splitter: RecursiveSplitter,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            splitter,
            embedder,
            index,
        }
    }

    pub fn chunk(&self, pages: &[ExtractedPage]) -> Vec<Chunk> {
        let chunks = chunk_pages(pages, &self.splitter);
        debug!(pages = pages.len(), chunks = chunks.len(), "chunked pages");
        chunks
    }

    /// Embeds and inserts every chunk under a fresh id. No deduplication.
    pub async fn upsert(&self, chunks: Vec<Chunk>) -> Result<usize, StoreError> {
        if chunks.is_empty() {
            return Ok(0);
        }

        if let Some(orphan) = chunks.iter().find(|chunk| !chunk.metadata.is_attributable()) {
            return Err(StoreError::InvalidArgument(format!(
                "chunk without file name/page number: {:?}",
                orphan.metadata
            )));
        }

        let texts = chunks.iter().map(|chunk| chunk.text.clone()).collect::<Vec<_>>();
        let embeddings = self.embedder.embed_documents(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(StoreError::BackendResponse {
                backend: "embedder".to_string(),
                details: format!(
                    "embedding count {} doesn't match chunk count {}",
                    embeddings.len(),
                    chunks.len()
                ),
            });
        }

        let records = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| StoredEmbeddingRecord::new(chunk, embedding))
            .collect::<Vec<_>>();

        let inserted = self.index.insert(&records).await?;
        info!(inserted, "added chunks to vector store");
        Ok(inserted)
    }

    /// Stores one pre-chunked document as-is and returns its record id.
    pub async fn add_document(&self, chunk: Chunk) -> Result<Uuid, StoreError> {
        if !chunk.metadata.is_attributable() {
            return Err(StoreError::InvalidArgument(format!(
                "chunk without file name/page number: {:?}",
                chunk.metadata
            )));
        }

        let embedding = self.embedder.embed_query(&chunk.text).await?;
        let record = StoredEmbeddingRecord::new(chunk, embedding);
        let id = record.id;
        self.index.insert(std::slice::from_ref(&record)).await?;
        debug!(%id, "added document to vector store");
        Ok(id)
    }

    /// Nearest neighbours of `query`, best first, with every score below
    /// `similarity_threshold` removed.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        similarity_threshold: f64,
    ) -> Result<Vec<RetrievalResult>, QueryError> {
        if top_k == 0 {
            return Err(QueryError::InvalidArgument(
                "top_k must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&similarity_threshold) {
            return Err(QueryError::InvalidArgument(format!(
                "similarity threshold {similarity_threshold} is outside [0, 1]"
            )));
        }

        let query_vector = self.embedder.embed_query(query).await?;
        let mut candidates = self.index.search(&query_vector, top_k).await?;
        candidates.sort_by(|left, right| right.similarity_score.total_cmp(&left.similarity_score));
        candidates.truncate(top_k);

        let found = candidates.len();
        candidates.retain(|candidate| candidate.similarity_score >= similarity_threshold);

        info!(
            top_k,
            threshold = similarity_threshold,
            found,
            kept = candidates.len(),
            "queried vector store"
        );
        Ok(candidates)
    }
}
