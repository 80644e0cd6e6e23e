use super::error::ApiError;
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use pdf_qa_core::{AnswerPayload, Chunk};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/question", post(ask_question))
}

#[derive(Debug, Deserialize)]
pub struct QuestionRequest {
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct ChunkBody {
    pub file_name: String,
    pub page_number: u32,
    pub content: String,
}

impl From<Chunk> for ChunkBody {
    fn from(chunk: Chunk) -> Self {
        Self {
            file_name: chunk.metadata.file_name,
            page_number: chunk.metadata.page_number,
            content: chunk.text,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnswerBody {
    pub answer: String,
    pub chunks: Vec<ChunkBody>,
}

impl From<AnswerPayload> for AnswerBody {
    fn from(payload: AnswerPayload) -> Self {
        Self {
            answer: payload.answer_text,
            chunks: payload
                .supporting_chunks
                .into_iter()
                .map(ChunkBody::from)
                .collect(),
        }
    }
}

async fn ask_question(
    State(state): State<Arc<AppState>>,
    body: Result<Json<QuestionRequest>, JsonRejection>,
) -> Result<Json<AnswerBody>, ApiError> {
    let Json(request) = body?;
    let payload = state.answerer.answer(&request.question).await?;
    Ok(Json(payload.into()))
}
