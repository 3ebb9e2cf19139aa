use crate::domain::{RateLimitPolicy, response::RateLimitResult};
use async_trait::async_trait;
use axum::http::HeaderMap;
use shared::utils::now_millis;
use std::sync::Arc;

pub type DynRateLimiter = Arc<dyn RateLimiterTrait + Send + Sync>;

/// Fixed-window limiter for one policy. None of these operations fail: store
/// errors are absorbed by the limiter's failure policy.
#[async_trait]
pub trait RateLimiterTrait {
    fn policy(&self) -> &RateLimitPolicy;

    async fn check_limit_at(
        &self,
        headers: &HeaderMap,
        identity: Option<&str>,
        now_ms: u64,
    ) -> RateLimitResult;

    /// Same view as a check, without counting the request.
    async fn status_at(
        &self,
        headers: &HeaderMap,
        identity: Option<&str>,
        now_ms: u64,
    ) -> RateLimitResult;

    /// Drops the caller's counter for the window containing `now_ms`.
    async fn reset_at(&self, headers: &HeaderMap, identity: Option<&str>, now_ms: u64) -> bool;

    /// Gives back one request counted in the window containing `now_ms`.
    async fn refund_at(&self, headers: &HeaderMap, identity: Option<&str>, now_ms: u64) -> bool;

    async fn check_limit(&self, headers: &HeaderMap, identity: Option<&str>) -> RateLimitResult {
        self.check_limit_at(headers, identity, now_millis()).await
    }

    async fn status(&self, headers: &HeaderMap, identity: Option<&str>) -> RateLimitResult {
        self.status_at(headers, identity, now_millis()).await
    }

    async fn reset(&self, headers: &HeaderMap, identity: Option<&str>) -> bool {
        self.reset_at(headers, identity, now_millis()).await
    }
}
