use crate::embeddings::similarity;
use crate::traits::VectorIndex;
use crate::{RetrievalResult, StoreError, StoredEmbeddingRecord};
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Process-local collection scanned exhaustively on every search.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    dimensions: Option<usize>,
    records: RwLock<Vec<StoredEmbeddingRecord>>,
}

impl InMemoryStore {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: Some(dimensions),
            records: RwLock::new(Vec::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn check_dimensions(&self, actual: usize) -> Result<(), StoreError> {
        match self.dimensions {
            Some(expected) if expected != actual => {
                Err(StoreError::DimensionMismatch { expected, actual })
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl VectorIndex for InMemoryStore {
    async fn insert(&self, records: &[StoredEmbeddingRecord]) -> Result<usize, StoreError> {
        for record in records {
            self.check_dimensions(record.embedding.len())?;
        }

        let mut guard = self.records.write().await;
        guard.extend(records.iter().cloned());
        Ok(records.len())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievalResult>, StoreError> {
        self.check_dimensions(query_vector.len())?;

        let guard = self.records.read().await;
        let mut scored = guard
            .iter()
            .map(|record| RetrievalResult {
                chunk: record.chunk.clone(),
                similarity_score: similarity(query_vector, &record.embedding),
            })
            .collect::<Vec<_>>();

        scored.sort_by(|left, right| right.similarity_score.total_cmp(&left.similarity_score));
        scored.truncate(top_k);
        Ok(scored)
    }
}
