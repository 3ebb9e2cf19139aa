use crate::{
    abstract_trait::rate_limit::RateLimiterTrait,
    cache::RateLimiter,
    domain::{FailurePolicy, KeyStrategy, RateLimitPolicy},
};
use axum::http::HeaderMap;
use shared::{
    abstract_trait::DynCounterStore,
    errors::RateLimitError,
    utils::{RateLimitMetrics, now_millis},
};
use std::{sync::Arc, time::Duration};
use tracing::warn;

const WINDOW: Duration = Duration::from_secs(60);
const MAX_REQUESTS: u32 = 60;
const KEY: &str = "ai_service";

/// Process-wide throttle on outbound AI provider calls, shared by every user.
///
/// Build one at startup and hand out clones of the `Arc`. On `Err`, delay or
/// queue the call until `retry_after_secs` has passed.
pub struct AiServiceRateLimiter {
    limiter: RateLimiter,
}

impl AiServiceRateLimiter {
    pub fn new(store: DynCounterStore) -> Self {
        let policy = RateLimitPolicy::new(KEY, WINDOW, MAX_REQUESTS).with_key_strategy(
            KeyStrategy::Fixed {
                key: KEY.to_string(),
            },
        );

        Self {
            limiter: RateLimiter::new(policy, store),
        }
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.limiter = self.limiter.with_failure_policy(failure_policy);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<RateLimitMetrics>) -> Self {
        self.limiter = self.limiter.with_metrics(metrics);
        self
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        self.limiter.policy()
    }

    pub async fn acquire(&self) -> Result<(), RateLimitError> {
        self.acquire_at(now_millis()).await
    }

    pub async fn acquire_at(&self, now_ms: u64) -> Result<(), RateLimitError> {
        let result = self
            .limiter
            .check_limit_at(&HeaderMap::new(), None, now_ms)
            .await;

        if result.allowed {
            return Ok(());
        }

        warn!(
            "AI service quota exhausted, retry after {:?}s",
            result.retry_after_secs
        );

        Err(RateLimitError::with_message(
            "AI service rate limit exceeded, please try again later",
            result.retry_after_secs,
            result.headers(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::rate_limit::tests::FailingCounterStore;
    use shared::cache::InMemoryCounterStore;

    // 5s into a minute
    const NOW: u64 = 1_704_067_205_000;

    #[tokio::test]
    async fn sixty_first_call_in_a_minute_is_rejected() {
        let limiter = AiServiceRateLimiter::new(Arc::new(InMemoryCounterStore::new()));

        for i in 0..60 {
            limiter.acquire_at(NOW + i * 500).await.unwrap();
        }

        let err = limiter.acquire_at(NOW + 30_000).await.unwrap_err();
        assert!(err.retry_after_secs > 0);
        assert_eq!(err.retry_after_secs, 25);
    }

    #[tokio::test]
    async fn quota_returns_in_the_next_window() {
        let limiter = AiServiceRateLimiter::new(Arc::new(InMemoryCounterStore::new()));

        for _ in 0..60 {
            limiter.acquire_at(NOW).await.unwrap();
        }
        assert!(limiter.acquire_at(NOW).await.is_err());

        assert!(limiter.acquire_at(NOW + 60_000).await.is_ok());
    }

    #[tokio::test]
    async fn fresh_instances_are_isolated_per_store() {
        let first = AiServiceRateLimiter::new(Arc::new(InMemoryCounterStore::new()));
        let second = AiServiceRateLimiter::new(Arc::new(InMemoryCounterStore::new()));

        for _ in 0..60 {
            first.acquire_at(NOW).await.unwrap();
        }

        assert!(first.acquire_at(NOW).await.is_err());
        assert!(second.acquire_at(NOW).await.is_ok());
    }

    #[tokio::test]
    async fn store_outage_does_not_block_outbound_calls() {
        let limiter = AiServiceRateLimiter::new(Arc::new(FailingCounterStore));

        for _ in 0..100 {
            assert!(limiter.acquire_at(NOW).await.is_ok());
        }
    }
}
