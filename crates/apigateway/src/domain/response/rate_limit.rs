use axum::http::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use shared::utils::to_iso_millis;
use utoipa::ToSchema;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Outcome of a single limiter check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitResult {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl RateLimitResult {
    pub fn allowed(limit: u32, remaining: u32, reset_time_ms: u64) -> Self {
        Self {
            allowed: true,
            limit,
            remaining,
            reset_time_ms,
            retry_after_secs: None,
        }
    }

    pub fn denied(limit: u32, reset_time_ms: u64, now_ms: u64) -> Self {
        Self {
            allowed: false,
            limit,
            remaining: 0,
            reset_time_ms,
            retry_after_secs: Some(reset_time_ms.saturating_sub(now_ms).div_ceil(1000)),
        }
    }

    /// `X-RateLimit-Limit`, `X-RateLimit-Remaining` and `X-RateLimit-Reset` (ISO-8601).
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(self.limit));
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(self.remaining));

        if let Ok(reset) = HeaderValue::from_str(&to_iso_millis(self.reset_time_ms)) {
            headers.insert(X_RATELIMIT_RESET, reset);
        }

        headers
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStatusResponse {
    pub policy: String,
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_time_ms: u64,
    pub reset_at: String,
    pub retry_after_secs: Option<u64>,
}

impl RateLimitStatusResponse {
    pub fn new(policy: impl Into<String>, result: RateLimitResult) -> Self {
        Self {
            policy: policy.into(),
            allowed: result.allowed,
            limit: result.limit,
            remaining: result.remaining,
            reset_time_ms: result.reset_time_ms,
            reset_at: to_iso_millis(result.reset_time_ms),
            retry_after_secs: result.retry_after_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denied_rounds_retry_after_up() {
        let result = RateLimitResult::denied(5, 900_000, 899_001);

        assert!(!result.allowed);
        assert_eq!(result.remaining, 0);
        assert_eq!(result.retry_after_secs, Some(1));
    }

    #[test]
    fn headers_carry_iso_reset() {
        let headers = RateLimitResult::allowed(100, 99, 1_704_068_100_000).headers();

        assert_eq!(headers["x-ratelimit-limit"], "100");
        assert_eq!(headers["x-ratelimit-remaining"], "99");
        assert_eq!(headers["x-ratelimit-reset"], "2024-01-01T00:15:00.000Z");
    }
}
