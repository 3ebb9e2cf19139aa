use crate::errors::error::ErrorResponse;
use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use thiserror::Error;

pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

const DEFAULT_MESSAGE: &str = "Too many requests, please try again later";

/// Quota exhausted. Rendered as `429 Too Many Requests`.
///
/// `headers` always carries `Retry-After`, alongside whatever
/// `X-RateLimit-*` headers the caller attached.
#[derive(Debug, Error)]
#[error("{message} (retry after {retry_after_secs}s)")]
pub struct RateLimitError {
    pub message: String,
    pub retry_after_secs: u64,
    pub headers: HeaderMap,
}

impl RateLimitError {
    pub fn new(retry_after_secs: Option<u64>, headers: HeaderMap) -> Self {
        Self::with_message(DEFAULT_MESSAGE, retry_after_secs, headers)
    }

    pub fn with_message(
        message: impl Into<String>,
        retry_after_secs: Option<u64>,
        mut headers: HeaderMap,
    ) -> Self {
        let retry_after_secs = retry_after_secs.unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        headers.insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));

        Self {
            message: message.into(),
            retry_after_secs,
            headers,
        }
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::TOO_MANY_REQUESTS
    }
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            status: "fail".to_string(),
            message: self.message,
        });

        (StatusCode::TOO_MANY_REQUESTS, self.headers, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderName;

    #[test]
    fn retry_after_defaults_when_unknown() {
        let err = RateLimitError::new(None, HeaderMap::new());

        assert_eq!(err.retry_after_secs, DEFAULT_RETRY_AFTER_SECS);
        assert_eq!(err.headers[RETRY_AFTER], "60");
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn response_keeps_caller_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-ratelimit-limit"),
            HeaderValue::from(5u32),
        );

        let response = RateLimitError::new(Some(42), headers).into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[RETRY_AFTER], "42");
        assert_eq!(response.headers()["x-ratelimit-limit"], "5");
    }
}
