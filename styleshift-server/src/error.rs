use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use styleshift_core::StyleError;
use thiserror::Error;

use crate::queue::QueueError;

/// Failures surfaced to the caller during the synchronous part of a request.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Style(#[from] StyleError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Style(StyleError::UnknownStyle(_)) => StatusCode::NOT_FOUND,
            ApiError::Style(StyleError::InvalidProductId(_)) => StatusCode::BAD_REQUEST,
            ApiError::Style(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Queue(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
