//! API error taxonomy for the analysis endpoints.
//!
//! Every error renders as a JSON `{error, message}` body so the dashboard
//! can surface the message directly. Store failures on the primary query of
//! a request are terminal (500, no retry); enrichment sub-queries are
//! handled at the call site and never reach this type.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

// ---

#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed query parameter.
    #[error("{0}")]
    InvalidParameter(String),

    /// Structurally valid request that cannot be analyzed (too few
    /// sensors, no located sensors).
    #[error("{0}")]
    InsufficientInput(String),

    /// The readings store rejected or failed the primary query.
    #[error("database query failed: {0}")]
    StoreQueryFailed(#[from] sqlx::Error),

    #[error("method not allowed")]
    MethodNotAllowed,
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        // ---
        match self {
            ApiError::InvalidParameter(_) | ApiError::InsufficientInput(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::StoreQueryFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    fn code(&self) -> &'static str {
        // ---
        match self {
            ApiError::InvalidParameter(_) => "invalid_parameter",
            ApiError::InsufficientInput(_) => "insufficient_input",
            ApiError::StoreQueryFailed(_) => "store_query_failed",
            ApiError::MethodNotAllowed => "method_not_allowed",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // ---
        if let ApiError::StoreQueryFailed(ref e) = self {
            tracing::error!("store query failed: {e}");
        }

        let body = ErrorBody {
            error: self.code(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
