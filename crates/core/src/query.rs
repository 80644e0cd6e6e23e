use crate::completion::{CompletionModel, Message};
use crate::store::EmbeddingStore;
use crate::{AnswerPayload, QueryError, RetrievalResult, RetrievalSettings, ValidationError};
use std::sync::Arc;
use tracing::{debug, info};

pub const NO_RELEVANT_DOCUMENTS: &str = "No relevant documents found.";

pub const SYSTEM_INSTRUCTION: &str = "You are an assistant that answers questions about \
the user's uploaded documents. Answer using only the provided context. If the context does \
not contain the answer, say that you don't know. Keep the answer concise.";

/// Answers a question from the chunks closest to it.
#[derive(Clone)]
pub struct QuestionAnswerer {
    store: EmbeddingStore,
    completion: Arc<dyn CompletionModel>,
    settings: RetrievalSettings,
}

impl QuestionAnswerer {
    pub fn new(
        store: EmbeddingStore,
        completion: Arc<dyn CompletionModel>,
        settings: RetrievalSettings,
    ) -> Self {
        Self {
            store,
            completion,
            settings,
        }
    }

    pub async fn answer(&self, question: &str) -> Result<AnswerPayload, QueryError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ValidationError::EmptyQuestion.into());
        }

        let retrieved = self
            .store
            .retrieve(question, self.settings.top_k, self.settings.similarity_threshold)
            .await?;

        if retrieved.is_empty() {
            info!("no chunks passed the similarity threshold");
            return Ok(AnswerPayload {
                answer_text: NO_RELEVANT_DOCUMENTS.to_string(),
                supporting_chunks: Vec::new(),
            });
        }

        let messages = build_prompt(question, &retrieved);
        debug!(chunks = retrieved.len(), "sending prompt to completion model");

        let answer_text = self
            .completion
            .complete(&messages, self.settings.temperature)
            .await
            .map_err(QueryError::Completion)?;

        Ok(AnswerPayload {
            answer_text,
            supporting_chunks: retrieved.into_iter().map(|result| result.chunk).collect(),
        })
    }
}

/// System instruction plus one user message carrying the ranked context
/// and the question.
pub fn build_prompt(question: &str, retrieved: &[RetrievalResult]) -> Vec<Message> {
    let context = retrieved
        .iter()
        .map(|result| result.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    vec![
        Message::system(SYSTEM_INSTRUCTION),
        Message::user(format!("Context:\n{context}\n\nQuestion: {question}")),
    ]
}
