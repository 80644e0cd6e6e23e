use clap::{Args, ValueEnum};
use pdf_qa_core::{
    ChunkingConfig, IngestError, OpenAiConfig, PgConnection, RetrievalSettings, StoreError,
    UploadPolicy, VisionOcrConfig,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VectorBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmbeddingProvider {
    Openai,
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExtractionBackend {
    Vision,
    TextLayer,
}

/// Every runtime option, settable by flag or environment variable.
#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// Address the HTTP server listens on.
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8001")]
    pub bind_addr: String,

    /// Vector collection chunks are written to and searched in.
    #[arg(long, env = "COLLECTION_NAME", default_value = "agentic_rag_embeddings")]
    pub collection_name: String,

    #[arg(long, env = "DB_USER", default_value = "myuser")]
    pub db_user: String,

    #[arg(long, env = "DB_PASSWORD", default_value = "mypassword", hide_env_values = true)]
    pub db_password: String,

    #[arg(long, env = "DB_HOST", default_value = "localhost")]
    pub db_host: String,

    #[arg(long, env = "DB_PORT", default_value_t = 5432)]
    pub db_port: u16,

    #[arg(long, env = "DB_NAME", default_value = "postgres")]
    pub db_name: String,

    #[arg(long, env = "DB_POOL_SIZE", default_value_t = 5)]
    pub db_pool_size: u32,

    #[arg(long, env = "VECTOR_STORE", value_enum, default_value_t = VectorBackend::Postgres)]
    pub vector_store: VectorBackend,

    #[arg(long, env = "EMBEDDING_PROVIDER", value_enum, default_value_t = EmbeddingProvider::Openai)]
    pub embedding_provider: EmbeddingProvider,

    #[arg(long, env = "EMBEDDING_MODEL", default_value = "text-embedding-3-large")]
    pub embedding_model: String,

    #[arg(long, env = "EMBEDDING_DIMENSIONS", default_value_t = 3072)]
    pub embedding_dimensions: usize,

    #[arg(long, env = "COMPLETION_MODEL", default_value = "gpt-4o-mini")]
    pub completion_model: String,

    #[arg(long, env = "COMPLETION_TEMPERATURE", default_value_t = 0.0)]
    pub completion_temperature: f64,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = pdf_qa_core::openai::DEFAULT_OPENAI_BASE_URL)]
    pub openai_base_url: String,

    /// `vision` sends the PDF to an OCR service, `text-layer` reads embedded text.
    #[arg(long, env = "EXTRACTION_BACKEND", value_enum, default_value_t = ExtractionBackend::Vision)]
    pub extraction_backend: ExtractionBackend,

    #[arg(long, env = "OCR_MODEL", default_value = "gpt-4o-mini")]
    pub ocr_model: String,

    #[arg(long, env = "OCR_ENDPOINT", default_value = "http://localhost:8090/ocr")]
    pub ocr_endpoint: String,

    #[arg(long, env = "OCR_API_KEY", hide_env_values = true)]
    pub ocr_api_key: Option<String>,

    #[arg(long, env = "TOP_K", default_value_t = 5)]
    pub top_k: usize,

    #[arg(long, env = "SIMILARITY_THRESHOLD", default_value_t = 0.7)]
    pub similarity_threshold: f64,

    #[arg(long, env = "CHUNK_SIZE", default_value_t = pdf_qa_core::chunking::DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    #[arg(long, env = "CHUNK_OVERLAP", default_value_t = pdf_qa_core::chunking::DEFAULT_CHUNK_OVERLAP)]
    pub chunk_overlap: usize,

    /// Per-file upload limit in bytes.
    #[arg(long, env = "MAX_UPLOAD_SIZE", default_value_t = pdf_qa_core::models::DEFAULT_MAX_FILE_SIZE)]
    pub max_upload_size: u64,

    /// Whole request body limit in bytes.
    #[arg(long, env = "MAX_REQUEST_SIZE", default_value_t = 256 * 1024 * 1024)]
    pub max_request_size: usize,

    /// Root for per-batch temporary directories. Defaults to the system temp dir.
    #[arg(long, env = "TEMP_DIR")]
    pub temp_dir: Option<PathBuf>,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Settings {
    pub fn chunking(&self) -> Result<ChunkingConfig, IngestError> {
        ChunkingConfig::new(self.chunk_size, self.chunk_overlap)
    }

    pub fn upload_policy(&self) -> UploadPolicy {
        UploadPolicy {
            max_file_size: self.max_upload_size,
            ..UploadPolicy::default()
        }
    }

    pub fn retrieval(&self) -> Result<RetrievalSettings, String> {
        if self.top_k == 0 {
            return Err("TOP_K must be at least 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(format!(
                "SIMILARITY_THRESHOLD {} is outside [0, 1]",
                self.similarity_threshold
            ));
        }
        Ok(RetrievalSettings {
            top_k: self.top_k,
            similarity_threshold: self.similarity_threshold,
            temperature: self.completion_temperature,
        })
    }

    pub fn pg_connection(&self) -> PgConnection {
        PgConnection {
            user: self.db_user.clone(),
            password: self.db_password.clone(),
            host: self.db_host.clone(),
            port: self.db_port,
            database: self.db_name.clone(),
            pool_size: self.db_pool_size,
        }
    }

    pub fn openai(&self) -> Result<OpenAiConfig, StoreError> {
        OpenAiConfig::new(
            &self.openai_base_url,
            self.openai_api_key.clone().unwrap_or_default(),
        )
    }

    pub fn vision_ocr(&self) -> VisionOcrConfig {
        VisionOcrConfig {
            endpoint: self.ocr_endpoint.clone(),
            model: self.ocr_model.clone(),
            api_key: self.ocr_api_key.clone(),
        }
    }

    pub fn temp_root(&self) -> PathBuf {
        self.temp_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("pdf-qa"))
    }

    /// `RUST_LOG` wins over `LOG_LEVEL` when both are set.
    pub fn log_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.log_level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        settings: Settings,
    }

    fn parse(args: &[&str]) -> Settings {
        let mut argv = vec!["pdf-qa-server"];
        argv.extend_from_slice(args);
        Harness::try_parse_from(argv).expect("parse").settings
    }

    #[test]
    fn retrieval_and_upload_limits_come_from_flags() {
        let settings = parse(&[
            "--top-k",
            "3",
            "--similarity-threshold",
            "0.4",
            "--max-upload-size",
            "1024",
            "--vector-store",
            "memory",
            "--extraction-backend",
            "text-layer",
        ]);

        let retrieval = settings.retrieval().expect("valid retrieval settings");
        assert_eq!(retrieval.top_k, 3);
        assert_eq!(retrieval.similarity_threshold, 0.4);
        assert_eq!(settings.upload_policy().max_file_size, 1024);
        assert_eq!(settings.upload_policy().allowed_extensions, vec![".pdf"]);
        assert_eq!(settings.vector_store, VectorBackend::Memory);
        assert_eq!(settings.extraction_backend, ExtractionBackend::TextLayer);
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let settings = parse(&["--similarity-threshold", "1.5"]);
        assert!(settings.retrieval().is_err());
    }

    #[test]
    fn overlap_not_smaller_than_size_is_rejected() {
        let settings = parse(&["--chunk-size", "100", "--chunk-overlap", "100"]);
        assert!(settings.chunking().is_err());
    }

    #[test]
    fn postgres_connection_uses_db_flags() {
        let settings = parse(&["--db-host", "db.internal", "--db-port", "6543"]);
        let connection = settings.pg_connection();
        assert_eq!(connection.host, "db.internal");
        assert_eq!(connection.port, 6543);
        assert_eq!(connection.pool_size, settings.db_pool_size);
    }
}
