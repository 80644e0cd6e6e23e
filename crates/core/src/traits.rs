use crate::{RetrievalResult, StoreError, StoredEmbeddingRecord};
use async_trait::async_trait;

/// Persistent collection of embedded chunks with nearest-neighbor search.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Inserts every record and returns how many were written.
    async fn insert(&self, records: &[StoredEmbeddingRecord]) -> Result<usize, StoreError>;

    /// Up to `top_k` records closest to `query_vector`, best first, scored
    /// in [0, 1].
    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievalResult>, StoreError>;
}
