//! Error envelope for every non-2xx response.

use std::time::Duration;

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use scribe_scheduler::RejectReason;
use serde::{Deserialize, Serialize};

use crate::upload::UploadRejection;

/// JSON body of an error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Canonical reason phrase of the status.
    pub error: String,
    /// Numeric status code.
    pub code: u16,
    /// Human-readable detail.
    pub details: Option<String>,
}

/// An HTTP error with optional `Retry-After`.
#[derive(Debug, Clone)]
pub struct ApiError {
    status: StatusCode,
    details: Option<String>,
    retry_after: Option<Duration>,
}

impl ApiError {
    /// Error with `status` and `details`.
    pub fn new(status: StatusCode, details: impl Into<String>) -> Self {
        Self {
            status,
            details: Some(details.into()),
            retry_after: None,
        }
    }

    /// Attach a retry hint.
    #[must_use]
    pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
        self.retry_after = retry_after;
        self
    }

    /// Map a scheduler rejection onto a status.
    pub fn from_rejection(reason: RejectReason, retry_after: Option<Duration>) -> Self {
        let (status, details) = match reason {
            RejectReason::MemoryPressure => (
                StatusCode::SERVICE_UNAVAILABLE,
                "server under memory pressure, retry later",
            ),
            RejectReason::Busy => (
                StatusCode::SERVICE_UNAVAILABLE,
                "all processing slots are busy, retry later",
            ),
            RejectReason::Cancelled => (StatusCode::SERVICE_UNAVAILABLE, "server is shutting down"),
            RejectReason::TranscriptionFailed => {
                (StatusCode::INTERNAL_SERVER_ERROR, "transcription failed")
            }
        };
        Self::new(status, details).with_retry_after(retry_after)
    }

    /// Status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The JSON body this error renders.
    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self
                .status
                .canonical_reason()
                .unwrap_or("Unknown")
                .to_string(),
            code: self.status.as_u16(),
            details: self.details.clone(),
        }
    }
}

impl From<UploadRejection> for ApiError {
    fn from(rejection: UploadRejection) -> Self {
        Self::new(rejection.status(), rejection.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.body())).into_response();
        if let Some(retry_after) = self.retry_after {
            let _ = response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after.as_secs()));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backpressure_maps_to_503_with_retry_after() {
        let err = ApiError::from_rejection(RejectReason::Busy, Some(Duration::from_secs(30)));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        let resp = err.into_response();
        assert_eq!(resp.headers()[header::RETRY_AFTER], "30");
    }

    #[test]
    fn transcription_failure_maps_to_500_without_retry() {
        let err = ApiError::from_rejection(RejectReason::TranscriptionFailed, None);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let resp = err.into_response();
        assert!(resp.headers().get(header::RETRY_AFTER).is_none());
    }

    #[test]
    fn body_uses_reason_phrase() {
        let body = ApiError::new(StatusCode::PAYLOAD_TOO_LARGE, "too big").body();
        assert_eq!(body.error, "Payload Too Large");
        assert_eq!(body.code, 413);
        assert_eq!(body.details.as_deref(), Some("too big"));
    }
}
