use crate::embeddings::distance_to_similarity;
use crate::traits::VectorIndex;
use crate::{Chunk, ChunkMetadata, RetrievalResult, StoreError, StoredEmbeddingRecord};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::Row;
use std::time::Duration;
use tracing::info;

const TABLE: &str = "rag_embeddings";

#[derive(Debug, Clone)]
pub struct PgConnection {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub pool_size: u32,
}

impl PgConnection {
    fn options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
    }
}

/// Embedded chunks in PostgreSQL with the pgvector extension. One table
/// holds every collection; rows are scoped by the `collection` column.
pub struct PgVectorStore {
    pool: PgPool,
    collection: String,
    dimensions: usize,
}

impl PgVectorStore {
    pub async fn connect(
        connection: &PgConnection,
        collection: impl Into<String>,
        dimensions: usize,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(connection.pool_size.max(1))
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(connection.options())
            .await?;

        info!(
            host = %connection.host,
            database = %connection.database,
            pool_size = connection.pool_size,
            "connected to postgres"
        );

        Ok(Self {
            pool,
            collection: collection.into(),
            dimensions,
        })
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&self.pool)
            .await?;

        let create = format!(
            "CREATE TABLE IF NOT EXISTS {TABLE} (
                id UUID PRIMARY KEY,
                collection TEXT NOT NULL,
                document TEXT NOT NULL,
                cmetadata JSONB NOT NULL,
                embedding vector({}) NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
            self.dimensions
        );
        sqlx::query(&create).execute(&self.pool).await?;

        let index = format!(
            "CREATE INDEX IF NOT EXISTS idx_{TABLE}_collection ON {TABLE} (collection)"
        );
        sqlx::query(&index).execute(&self.pool).await?;

        info!(collection = %self.collection, dimensions = self.dimensions, "vector table ready");
        Ok(())
    }

    fn check_dimensions(&self, actual: usize) -> Result<(), StoreError> {
        if actual != self.dimensions {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimensions,
                actual,
            });
        }
        Ok(())
    }
}

fn vector_literal(values: &[f32]) -> String {
    let joined = values
        .iter()
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join(",");
    format!("[{joined}]")
}

#[async_trait]
impl VectorIndex for PgVectorStore {
    async fn insert(&self, records: &[StoredEmbeddingRecord]) -> Result<usize, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }
        for record in records {
            self.check_dimensions(record.embedding.len())?;
        }

        let statement = format!(
            "INSERT INTO {TABLE} (id, collection, document, cmetadata, embedding, created_at)
             VALUES ($1, $2, $3, $4, $5::vector, $6)"
        );

        let mut tx = self.pool.begin().await?;
        for record in records {
            sqlx::query(&statement)
                .bind(record.id)
                .bind(&self.collection)
                .bind(&record.chunk.text)
                .bind(Json(&record.chunk.metadata))
                .bind(vector_literal(&record.embedding))
                .bind(record.created_at)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(records.len())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievalResult>, StoreError> {
        self.check_dimensions(query_vector.len())?;

        let statement = format!(
            "SELECT document, cmetadata, embedding <=> $1::vector AS distance
             FROM {TABLE}
             WHERE collection = $2
             ORDER BY distance
             LIMIT $3"
        );

        let rows = sqlx::query(&statement)
            .bind(vector_literal(query_vector))
            .bind(&self.collection)
            .bind(top_k as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| -> Result<RetrievalResult, StoreError> {
                let text: String = row.try_get("document")?;
                let Json(metadata): Json<ChunkMetadata> = row.try_get("cmetadata")?;
                let distance: f64 = row.try_get("distance")?;

                Ok(RetrievalResult {
                    chunk: Chunk { text, metadata },
                    similarity_score: distance_to_similarity(distance),
                })
            })
            .collect()
    }
}
