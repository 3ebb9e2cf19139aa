use crate::{domain::PolicyName, service::registry::RateLimiterRegistry};
use axum::http::{HeaderMap, StatusCode};
use shared::{errors::RateLimitError, utils::now_millis};
use std::sync::Arc;
use tracing::debug;

/// Turns limiter decisions into the handler contract: headers to merge on
/// success, or a 429 error to return as-is.
#[derive(Debug, Clone)]
pub struct RateLimitGuard {
    registry: Arc<RateLimiterRegistry>,
}

impl RateLimitGuard {
    pub fn new(registry: Arc<RateLimiterRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &RateLimiterRegistry {
        &self.registry
    }

    pub async fn check(
        &self,
        policy: PolicyName,
        headers: &HeaderMap,
        identity: Option<&str>,
    ) -> Result<HeaderMap, RateLimitError> {
        self.check_at(policy, headers, identity, now_millis()).await
    }

    pub async fn check_at(
        &self,
        policy: PolicyName,
        headers: &HeaderMap,
        identity: Option<&str>,
        now_ms: u64,
    ) -> Result<HeaderMap, RateLimitError> {
        let result = self
            .registry
            .limiter(policy)
            .check_limit_at(headers, identity, now_ms)
            .await;

        if result.allowed {
            Ok(result.headers())
        } else {
            Err(RateLimitError::new(result.retry_after_secs, result.headers()))
        }
    }

    /// Applies the policy's skip flags once the handler's status is known.
    /// `now_ms` must be the instant passed to [`Self::check_at`].
    pub async fn settle_at(
        &self,
        policy: PolicyName,
        headers: &HeaderMap,
        identity: Option<&str>,
        now_ms: u64,
        status: StatusCode,
    ) -> bool {
        let limiter = self.registry.limiter(policy);
        let rules = limiter.policy();

        let failed = status.is_client_error() || status.is_server_error();
        let skip = (failed && rules.skip_failed_requests)
            || (!failed && rules.skip_successful_requests);

        if !skip {
            return false;
        }

        debug!("Refunding '{policy}' request that finished with {status}");
        limiter.refund_at(headers, identity, now_ms).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FailurePolicy, RateLimitPolicy};
    use axum::http::header::RETRY_AFTER;
    use shared::cache::InMemoryCounterStore;

    // 2024-01-01T00:00:00Z
    const NOW: u64 = 1_704_067_200_000;

    fn guard_with(policies: [RateLimitPolicy; 6]) -> RateLimitGuard {
        let registry = RateLimiterRegistry::with_policies(
            policies,
            Arc::new(InMemoryCounterStore::new()),
            FailurePolicy::FailOpen,
            None,
        )
        .unwrap();
        RateLimitGuard::new(Arc::new(registry))
    }

    fn guard() -> RateLimitGuard {
        guard_with(PolicyName::ALL.map(RateLimitPolicy::builtin))
    }

    #[tokio::test]
    async fn success_returns_rate_limit_headers() {
        let headers = guard()
            .check_at(PolicyName::Api, &HeaderMap::new(), Some("abc"), NOW)
            .await
            .unwrap();

        assert_eq!(headers["x-ratelimit-limit"], "100");
        assert_eq!(headers["x-ratelimit-remaining"], "99");
        assert_eq!(headers["x-ratelimit-reset"], "2024-01-01T00:15:00.000Z");
        assert!(!headers.contains_key(RETRY_AFTER));
    }

    #[tokio::test]
    async fn exhausted_quota_is_a_429_with_retry_after() {
        let guard = guard();
        let headers = HeaderMap::new();

        for _ in 0..10 {
            guard
                .check_at(PolicyName::Upload, &headers, Some("abc"), NOW)
                .await
                .unwrap();
        }

        let err = guard
            .check_at(PolicyName::Upload, &headers, Some("abc"), NOW + 1_000)
            .await
            .unwrap_err();

        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.retry_after_secs, 3_599);
        assert_eq!(err.headers[RETRY_AFTER], "3599");
        assert_eq!(err.headers["x-ratelimit-remaining"], "0");
        assert_eq!(err.headers["x-ratelimit-limit"], "10");
    }

    #[tokio::test]
    async fn failed_requests_are_refunded_when_flagged() {
        let mut policies = PolicyName::ALL.map(RateLimitPolicy::builtin);
        policies[1] = policies[1].clone().skip_failed_requests(true);
        let guard = guard_with(policies);
        let headers = HeaderMap::new();

        guard
            .check_at(PolicyName::Upload, &headers, Some("abc"), NOW)
            .await
            .unwrap();
        let refunded = guard
            .settle_at(
                PolicyName::Upload,
                &headers,
                Some("abc"),
                NOW,
                StatusCode::BAD_GATEWAY,
            )
            .await;
        assert!(refunded);

        let kept = guard
            .settle_at(PolicyName::Upload, &headers, Some("abc"), NOW, StatusCode::OK)
            .await;
        assert!(!kept);

        let next = guard
            .check_at(PolicyName::Upload, &headers, Some("abc"), NOW)
            .await
            .unwrap();
        assert_eq!(next["x-ratelimit-remaining"], "9");
    }

    #[tokio::test]
    async fn builtin_policies_never_refund() {
        let guard = guard();
        let headers = HeaderMap::new();

        guard
            .check_at(PolicyName::Publishing, &headers, None, NOW)
            .await
            .unwrap();

        for status in [StatusCode::OK, StatusCode::INTERNAL_SERVER_ERROR] {
            assert!(
                !guard
                    .settle_at(PolicyName::Publishing, &headers, None, NOW, status)
                    .await
            );
        }
    }
}
