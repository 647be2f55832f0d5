// SPDX-License-Identifier: MIT

//! Error taxonomy (spec §7): every handler failure maps to `{error}` JSON
//! with an appropriate status code; no board write happens on a validation
//! failure.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use clamban_core::CoreError;
use clamban_storage::StorageError;
use clamban_supervisor::SupervisorError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Core(CoreError::UnknownColumn(_) | CoreError::PathEscape(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Core(CoreError::TaskNotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Storage(StorageError::Json(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Storage(StorageError::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Supervisor(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}
