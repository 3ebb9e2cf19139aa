use crate::{
    abstract_trait::rate_limit::RateLimiterTrait,
    domain::{FailurePolicy, RateLimitPolicy, response::RateLimitResult},
};
use async_trait::async_trait;
use axum::http::HeaderMap;
use shared::{
    abstract_trait::DynCounterStore,
    errors::StoreError,
    utils::{Decision, RateLimitMetrics},
};
use std::sync::Arc;
use tracing::{debug, error};

const KEY_PREFIX: &str = "rate_limit";

/// Fixed-window counter over a shared store.
///
/// Counter keys are `rate_limit:<key>:<window index>` and expire one window
/// after their first hit, so every policy/caller pair has at most one live
/// counter.
#[derive(Clone)]
pub struct RateLimiter {
    policy: RateLimitPolicy,
    store: DynCounterStore,
    failure_policy: FailurePolicy,
    metrics: Option<Arc<RateLimitMetrics>>,
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy, store: DynCounterStore) -> Self {
        Self {
            policy,
            store,
            failure_policy: FailurePolicy::default(),
            metrics: None,
        }
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<RateLimitMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn counter_key(
        &self,
        headers: &HeaderMap,
        identity: Option<&str>,
        now_ms: u64,
    ) -> (String, u64) {
        let key = self.policy.derive_key(headers, identity);
        let window = self.policy.window_index(now_ms);
        (format!("{KEY_PREFIX}:{key}:{window}"), window)
    }

    async fn count_request(
        &self,
        store_key: &str,
        window: u64,
        now_ms: u64,
    ) -> Result<RateLimitResult, StoreError> {
        let limit = self.policy.max_requests;
        let reset_time_ms = self.policy.window_end(window);

        let current = self.store.get(store_key).await?.unwrap_or(0);

        if current >= i64::from(limit) {
            debug!("Rate limit exceeded for key: {store_key}");
            return Ok(RateLimitResult::denied(limit, reset_time_ms, now_ms));
        }

        let count = self
            .store
            .incr_with_expiry(store_key, self.policy.ttl_secs())
            .await?;

        // lost a race for the last slot
        if count > i64::from(limit) {
            debug!("Rate limit exceeded for key: {store_key}");
            return Ok(RateLimitResult::denied(limit, reset_time_ms, now_ms));
        }

        Ok(RateLimitResult::allowed(
            limit,
            remaining(limit, count),
            reset_time_ms,
        ))
    }

    async fn peek(
        &self,
        store_key: &str,
        window: u64,
        now_ms: u64,
    ) -> Result<RateLimitResult, StoreError> {
        let limit = self.policy.max_requests;
        let reset_time_ms = self.policy.window_end(window);

        let current = self.store.get(store_key).await?.unwrap_or(0);

        if current >= i64::from(limit) {
            Ok(RateLimitResult::denied(limit, reset_time_ms, now_ms))
        } else {
            Ok(RateLimitResult::allowed(
                limit,
                remaining(limit, current),
                reset_time_ms,
            ))
        }
    }

    fn on_store_failure(&self, err: &StoreError, now_ms: u64) -> RateLimitResult {
        error!(
            "Rate limit store error for policy '{}': {err}",
            self.policy.name
        );

        let limit = self.policy.max_requests;
        let reset_time_ms = now_ms + self.policy.window_ms;

        if let Some(metrics) = &self.metrics {
            metrics.record_store_error();
        }

        match self.failure_policy {
            FailurePolicy::FailOpen => {
                self.record(Decision::FailOpen);
                RateLimitResult::allowed(limit, limit, reset_time_ms)
            }
            FailurePolicy::FailClosed => {
                self.record(Decision::FailClosed);
                RateLimitResult::denied(limit, reset_time_ms, now_ms)
            }
        }
    }

    fn record(&self, outcome: Decision) {
        if let Some(metrics) = &self.metrics {
            metrics.record(&self.policy.name, outcome);
        }
    }
}

fn remaining(limit: u32, count: i64) -> u32 {
    let left = i64::from(limit).saturating_sub(count).max(0);
    u32::try_from(left).unwrap_or(0)
}

#[async_trait]
impl RateLimiterTrait for RateLimiter {
    fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    async fn check_limit_at(
        &self,
        headers: &HeaderMap,
        identity: Option<&str>,
        now_ms: u64,
    ) -> RateLimitResult {
        let (store_key, window) = self.counter_key(headers, identity, now_ms);

        match self.count_request(&store_key, window, now_ms).await {
            Ok(result) => {
                self.record(if result.allowed {
                    Decision::Allowed
                } else {
                    Decision::Denied
                });
                result
            }
            Err(e) => self.on_store_failure(&e, now_ms),
        }
    }

    async fn status_at(
        &self,
        headers: &HeaderMap,
        identity: Option<&str>,
        now_ms: u64,
    ) -> RateLimitResult {
        let (store_key, window) = self.counter_key(headers, identity, now_ms);

        match self.peek(&store_key, window, now_ms).await {
            Ok(result) => result,
            Err(e) => {
                error!("Failed to read rate limit status for '{store_key}': {e}");
                let limit = self.policy.max_requests;
                RateLimitResult::allowed(limit, limit, now_ms + self.policy.window_ms)
            }
        }
    }

    async fn reset_at(&self, headers: &HeaderMap, identity: Option<&str>, now_ms: u64) -> bool {
        let (store_key, _) = self.counter_key(headers, identity, now_ms);

        match self.store.del(&store_key).await {
            Ok(()) => {
                debug!("Rate limit counter reset: {store_key}");
                true
            }
            Err(e) => {
                error!("Failed to reset rate limit counter '{store_key}': {e}");
                false
            }
        }
    }

    async fn refund_at(&self, headers: &HeaderMap, identity: Option<&str>, now_ms: u64) -> bool {
        let (store_key, _) = self.counter_key(headers, identity, now_ms);

        match self.store.decr_if_positive(&store_key).await {
            Ok(Some(_)) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_refund(&self.policy.name);
                }
                true
            }
            Ok(None) => false,
            Err(e) => {
                error!("Failed to refund rate limit counter '{store_key}': {e}");
                false
            }
        }
    }
}
