//! Ingest rate limiting middleware

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use tracing::warn;

use crate::app::AppState;

/// Rejection for requests over the ingest quota
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("Too many frame pushes, slow down")]
    TooManyRequests,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.to_string()
        });
        (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response()
    }
}

/// Middleware to cap engine frame pushes
pub async fn limit_ingest(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    if state.ingest_limiter.check().is_err() {
        warn!(path = %request.uri().path(), "Ingest rate limited");
        return Err(RateLimitError::TooManyRequests);
    }

    Ok(next.run(request).await)
}
