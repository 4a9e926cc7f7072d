use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Failures surfaced by a ticker provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request to data provider failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    NotFound(String),
    #[error("rate limited by data provider")]
    RateLimited,
    #[error("data provider responded with status {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("invalid response from data provider: {0}")]
    InvalidResponse(String),
    #[error("could not establish data provider session: {0}")]
    Session(String),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Forbidden(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            // Provider failures get the generic server error, never the upstream detail
            ApiError::Provider(e) => {
                tracing::error!(error = %e, "Provider call failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
            }
            ApiError::BadRequest(detail) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "detail": detail }))).into_response()
            }
            ApiError::Forbidden(detail) => {
                (StatusCode::FORBIDDEN, Json(json!({ "detail": detail }))).into_response()
            }
        }
    }
}
