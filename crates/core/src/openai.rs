//! Clients for OpenAI-compatible `/embeddings` and `/chat/completions`.

use crate::completion::{CompletionModel, Message};
use crate::embeddings::Embedder;
use crate::error::StoreError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1/";

const EMBEDDING_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub base_url: Url,
    pub api_key: String,
}

impl OpenAiConfig {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self, StoreError> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            base_url,
            api_key: api_key.into(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, StoreError> {
        Ok(self.base_url.join(path)?)
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

pub struct OpenAiEmbedder {
    config: OpenAiConfig,
    model: String,
    dimensions: usize,
    client: Client,
}

impl OpenAiEmbedder {
    pub fn new(config: OpenAiConfig, model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            config,
            model: model.into(),
            dimensions,
            client: Client::new(),
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StoreError> {
        let response = self
            .client
            .post(self.config.endpoint("embeddings")?)
            .bearer_auth(&self.config.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
                dimensions: Some(self.dimensions),
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::BackendResponse {
                backend: "openai embeddings".to_string(),
                details: format!("{status}: {body}"),
            });
        }

        let mut parsed: EmbeddingResponse = response.json().await?;
        parsed.data.sort_by_key(|item| item.index.unwrap_or(usize::MAX));

        if parsed.data.len() != texts.len() {
            return Err(StoreError::BackendResponse {
                backend: "openai embeddings".to_string(),
                details: format!("expected {} embeddings, got {}", texts.len(), parsed.data.len()),
            });
        }

        parsed
            .data
            .into_iter()
            .map(|item| {
                if item.embedding.len() == self.dimensions {
                    Ok(item.embedding)
                } else {
                    Err(StoreError::DimensionMismatch {
                        expected: self.dimensions,
                        actual: item.embedding.len(),
                    })
                }
            })
            .collect()
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StoreError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBEDDING_BATCH_SIZE) {
            vectors.extend(self.embed_batch(batch).await?);
        }
        Ok(vectors)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f64,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

pub struct OpenAiCompletion {
    config: OpenAiConfig,
    model: String,
    client: Client,
}

impl OpenAiCompletion {
    pub fn new(config: OpenAiConfig, model: impl Into<String>) -> Self {
        Self {
            config,
            model: model.into(),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl CompletionModel for OpenAiCompletion {
    async fn complete(&self, messages: &[Message], temperature: f64) -> Result<String, StoreError> {
        let response = self
            .client
            .post(self.config.endpoint("chat/completions")?)
            .bearer_auth(&self.config.api_key)
            .json(&ChatRequest {
                model: &self.model,
                messages,
                temperature,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::BackendResponse {
                backend: "openai completion".to_string(),
                details: format!("{status}: {body}"),
            });
        }

        let parsed: ChatResponse = response.json().await?;
        first_content(parsed)
    }
}

fn first_content(parsed: ChatResponse) -> Result<String, StoreError> {
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| StoreError::BackendResponse {
            backend: "openai completion".to_string(),
            details: "response carried no message content".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve_once;

    #[test]
    fn endpoints_are_joined_under_the_base_path() {
        let config = OpenAiConfig::new("http://localhost:8080/v1", "key").expect("config");
        assert_eq!(
            config.endpoint("embeddings").expect("url").as_str(),
            "http://localhost:8080/v1/embeddings"
        );
        assert_eq!(
            config.endpoint("chat/completions").expect("url").as_str(),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[test]
    fn chat_request_uses_lowercase_roles() {
        let messages = vec![Message::system("rules"), Message::user("question")];
        let request = ChatRequest {
            model: "gpt-4o-mini",
            messages: &messages,
            temperature: 0.0,
        };

        let json = serde_json::to_value(&request).expect("json");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "question");
    }

    #[test]
    fn embedding_response_is_parsed() {
        let json = r#"{
            "data": [
                {"embedding": [0.3, 0.4], "index": 1, "object": "embedding"},
                {"embedding": [0.1, 0.2], "index": 0, "object": "embedding"}
            ],
            "model": "text-embedding-3-small",
            "object": "list"
        }"#;
        let mut parsed: EmbeddingResponse = serde_json::from_str(json).expect("response");
        parsed.data.sort_by_key(|item| item.index.unwrap_or(usize::MAX));
        assert_eq!(parsed.data[0].embedding, vec![0.1, 0.2]);
    }

    #[test]
    fn chat_response_without_content_is_an_error() {
        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"role": "assistant"}}]}"#)
                .expect("response");
        assert!(matches!(
            first_content(parsed),
            Err(StoreError::BackendResponse { .. })
        ));
    }

    #[tokio::test]
    async fn embedding_request_asks_for_configured_dimensions() {
        let (base_url, server) =
            serve_once(200, r#"{"data": [{"embedding": [0.5, 0.25], "index": 0}]}"#).await;
        let config = OpenAiConfig::new(&format!("{base_url}/v1"), "key").expect("config");
        let embedder = OpenAiEmbedder::new(config, "text-embedding-3-large", 2);

        let vectors = embedder
            .embed_documents(&["hello".to_string()])
            .await
            .expect("embeddings");
        assert_eq!(vectors, vec![vec![0.5, 0.25]]);

        let sent: serde_json::Value =
            serde_json::from_str(&server.await.expect("server")).expect("request json");
        assert_eq!(sent["model"], "text-embedding-3-large");
        assert_eq!(sent["dimensions"], 2);
        assert_eq!(sent["input"][0], "hello");
    }

    #[tokio::test]
    async fn completion_without_choices_is_an_error() {
        let (base_url, server) = serve_once(200, r#"{"choices": []}"#).await;
        let config = OpenAiConfig::new(&format!("{base_url}/v1"), "key").expect("config");
        let completion = OpenAiCompletion::new(config, "gpt-4o-mini");

        let result = completion.complete(&[Message::user("question")], 0.0).await;
        assert!(matches!(result, Err(StoreError::BackendResponse { .. })));

        let sent: serde_json::Value =
            serde_json::from_str(&server.await.expect("server")).expect("request json");
        assert_eq!(sent["model"], "gpt-4o-mini");
    }
}
