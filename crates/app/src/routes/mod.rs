pub mod documents;
pub mod error;
pub mod question;

use crate::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// All HTTP routes with body limit, CORS and request tracing applied.
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.max_request_size;

    Router::new()
        .route("/healthz", get(healthz))
        .merge(documents::routes())
        .merge(question::routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request};
    use http_body_util::BodyExt;
    use pdf_qa_core::{
        CharacterNgramEmbedder, ChunkingConfig, CompletionModel, DocumentIngestor, EmbeddingStore,
        ExtractedPage, InMemoryStore, IngestError, Message, PageExtractor, QuestionAnswerer,
        RecursiveSplitter, RetrievalSettings, StoreError, TempStorage, UploadPolicy,
        NO_RELEVANT_DOCUMENTS,
    };
    use serde_json::{json, Value};
    use std::path::Path;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "pdf-qa-test-boundary";

    /// Treats the saved bytes as the text of a single page. Files whose name
    /// starts with `broken` fail extraction.
    struct PlainTextExtractor;

    #[async_trait]
    impl PageExtractor for PlainTextExtractor {
        async fn extract(&self, path: &Path) -> Result<Vec<ExtractedPage>, IngestError> {
            let file_name = path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or_default()
                .to_string();
            if file_name.starts_with("broken") {
                return Err(IngestError::extraction(path, "secret upstream detail"));
            }

            Ok(vec![ExtractedPage {
                source_file_name: file_name,
                page_number: 1,
                text: std::fs::read_to_string(path)?,
            }])
        }
    }

    struct CannedCompletion;

    #[async_trait]
    impl CompletionModel for CannedCompletion {
        async fn complete(&self, _messages: &[Message], _temperature: f64) -> Result<String, StoreError> {
            Ok("Two years.".to_string())
        }
    }

    struct TestApp {
        router: Router,
        temp_root: TempDir,
    }

    fn test_app() -> TestApp {
        let temp_root = tempfile::tempdir().expect("tempdir");
        let embedder = CharacterNgramEmbedder::default();
        let index = Arc::new(InMemoryStore::new(embedder.dimensions));
        let splitter =
            RecursiveSplitter::new(ChunkingConfig::new(200, 20).expect("config")).expect("splitter");
        let store = EmbeddingStore::new(splitter, Arc::new(embedder), index);

        let state = AppState {
            ingestor: DocumentIngestor::new(
                TempStorage::new(temp_root.path()).expect("storage"),
                Arc::new(PlainTextExtractor),
                store.clone(),
                UploadPolicy::default(),
            ),
            answerer: QuestionAnswerer::new(
                store.clone(),
                Arc::new(CannedCompletion),
                RetrievalSettings::default(),
            ),
            store,
            max_request_size: 1024 * 1024,
        };

        TestApp {
            router: build_router(Arc::new(state)),
            temp_root,
        }
    }

    /// `(field, file name, content)`; a `None` file name makes a plain form field.
    fn multipart(parts: &[(&str, Option<&str>, &str)]) -> Request<Body> {
        let mut body = String::new();
        for (field, file_name, content) in parts {
            body.push_str(&format!("--{BOUNDARY}\r\n"));
            match file_name {
                Some(file_name) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
                     Content-Type: application/pdf\r\n\r\n"
                )),
                None => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{field}\"\r\n\r\n"
                )),
            }
            body.push_str(content);
            body.push_str("\r\n");
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));

        Request::builder()
            .method("POST")
            .uri("/documents")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .expect("request")
    }

    fn json_post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, body)
    }

    fn leftover_entries(app: &TestApp) -> usize {
        std::fs::read_dir(app.temp_root.path()).expect("read temp root").count()
    }

    #[tokio::test]
    async fn healthz_is_ok() {
        let app = test_app();
        let request = Request::builder()
            .uri("/healthz")
            .body(Body::empty())
            .expect("request");
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn upload_reports_documents_and_chunks() {
        let app = test_app();
        let (status, body) = send(
            &app,
            multipart(&[
                ("files", Some("manual.pdf"), "The warranty lasts two years."),
                ("file", Some("guide.pdf"), "Press the red button to start."),
            ]),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Documents processed successfully");
        assert_eq!(body["documents_indexed"], 2);
        assert_eq!(body["total_chunks"], 2);
        assert_eq!(leftover_entries(&app), 0);
    }

    #[tokio::test]
    async fn upload_without_files_is_a_bad_request() {
        let app = test_app();
        let (status, body) = send(&app, multipart(&[("note", None, "hello")])).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "No files uploaded");
        assert_eq!(leftover_entries(&app), 0);
    }

    #[tokio::test]
    async fn non_pdf_upload_is_a_bad_request() {
        let app = test_app();
        let (status, body) = send(
            &app,
            multipart(&[
                ("files", Some("manual.pdf"), "fine"),
                ("files", Some("notes.txt"), "not allowed"),
            ]),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let detail = body["detail"].as_str().expect("detail");
        assert!(detail.contains("notes.txt"), "{detail}");
        assert_eq!(leftover_entries(&app), 0);
    }

    #[tokio::test]
    async fn extraction_failure_hides_the_cause() {
        let app = test_app();
        let (status, body) = send(&app, multipart(&[("files", Some("broken.pdf"), "x")])).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["detail"], "Error processing documents");
        assert_eq!(leftover_entries(&app), 0);
    }

    #[tokio::test]
    async fn question_without_matches_gets_fixed_answer() {
        let app = test_app();
        let (status, body) = send(
            &app,
            json_post("/question", json!({"question": "How long is the warranty?"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"answer": NO_RELEVANT_DOCUMENTS, "chunks": []}));
    }

    #[tokio::test]
    async fn blank_question_is_a_bad_request() {
        let app = test_app();
        let (status, body) = send(&app, json_post("/question", json!({"question": "  "}))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].is_string());
    }

    #[tokio::test]
    async fn added_document_answers_questions_with_attribution() {
        let app = test_app();
        let (status, body) = send(
            &app,
            json_post(
                "/add_document",
                json!({
                    "page_content": "The warranty lasts two years.",
                    "metadata": {"file_name": "faq.pdf", "page_number": 3}
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], documents::DOCUMENT_ADDED);
        assert!(body["id"].is_string());

        let (status, body) = send(
            &app,
            json_post("/question", json!({"question": "The warranty lasts two years."})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], "Two years.");
        assert_eq!(
            body["chunks"],
            json!([{
                "file_name": "faq.pdf",
                "page_number": 3,
                "content": "The warranty lasts two years."
            }])
        );
    }

    #[tokio::test]
    async fn add_document_rejects_unattributed_metadata() {
        let app = test_app();
        let (status, body) = send(
            &app,
            json_post(
                "/add_document",
                json!({"page_content": "text", "metadata": {"file_name": "a.pdf", "page_number": 0}}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"]
            .as_str()
            .expect("detail")
            .starts_with("Invalid metadata"));
    }

    #[tokio::test]
    async fn malformed_question_body_gets_a_detail() {
        let app = test_app();
        let request = Request::builder()
            .method("POST")
            .uri("/question")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .expect("request");
        let (status, body) = send(&app, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"]
            .as_str()
            .expect("detail")
            .starts_with("Invalid request body"));
    }

    #[tokio::test]
    async fn question_field_is_required() {
        let app = test_app();
        let (status, body) = send(&app, json_post("/question", json!({"query": "warranty"}))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].is_string());
    }

    #[tokio::test]
    async fn upload_without_multipart_content_type_gets_a_detail() {
        let app = test_app();
        let (status, body) = send(&app, json_post("/documents", json!({"files": []}))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"]
            .as_str()
            .expect("detail")
            .starts_with("Invalid upload"));
        assert_eq!(leftover_entries(&app), 0);
    }
}
