//! HTTP mapping for domain errors.
//!
//! Every failure leaves the router as `{ "error": <label>, "message": <text> }`
//! so clients can tell an origin outage from a rate limit or a storage fault.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tfmkt_domain::TfmktError;
use tracing::{error, warn};

/// Domain error on its way out of a handler
#[derive(Debug)]
pub struct ApiError(pub TfmktError);

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl ApiError {
    /// HTTP status for the wrapped error.
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            TfmktError::FetchFailed(_) => StatusCode::BAD_GATEWAY,
            TfmktError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            TfmktError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            TfmktError::NotFound(_) => StatusCode::NOT_FOUND,
            TfmktError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            TfmktError::Config(_) | TfmktError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<TfmktError> for ApiError {
    fn from(err: TfmktError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self.0, %status, "request failed");
        } else if status == StatusCode::TOO_MANY_REQUESTS {
            warn!(error = %self.0, "request rate limited");
        }

        let body = ErrorBody { error: self.0.label(), message: self.0.to_string() };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
