use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pdf_qa_core::{ErrorClass, IngestError, QueryError, StoreError, ValidationError};
use serde::Serialize;
use tracing::error;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

/// Handler failure rendered as `{"detail": ...}`. Client faults keep their
/// message; server faults are logged and replaced by a generic one.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: detail.into(),
        }
    }

    fn classified(class: ErrorClass, cause: &dyn std::error::Error, generic: &str) -> Self {
        match class {
            ErrorClass::Client => Self::bad_request(cause.to_string()),
            ErrorClass::Server => {
                error!(error = %cause, "request failed");
                Self::internal(generic)
            }
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(value: ValidationError) -> Self {
        Self::bad_request(value.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::bad_request(format!("Invalid upload: {}", rejection.body_text()))
    }
}

impl From<IngestError> for ApiError {
    fn from(value: IngestError) -> Self {
        Self::classified(value.class(), &value, "Error processing documents")
    }
}

impl From<QueryError> for ApiError {
    fn from(value: QueryError) -> Self {
        Self::classified(value.class(), &value, "Error answering question")
    }
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        Self::classified(ErrorClass::Server, &value, "Error adding document")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { detail: self.detail })).into_response()
    }
}
