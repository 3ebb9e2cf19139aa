use crate::errors::StoreError;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::error;

pub type DynCounterStore = Arc<dyn CounterStoreTrait + Send + Sync>;

/// Minimal key-value surface a fixed-window limiter needs from its backing store.
///
/// Implementations must make `incr` atomic across every process sharing the store.
#[async_trait]
pub trait CounterStoreTrait {
    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError>;

    /// Increments the counter, creating it at `1` when absent.
    async fn incr(&self, key: &str) -> Result<i64, StoreError>;

    async fn expire(&self, key: &str, seconds: u64) -> Result<(), StoreError>;

    /// Decrements the counter only while it is above zero, leaving its TTL alone.
    /// Returns `None` when nothing was taken back.
    async fn decr_if_positive(&self, key: &str) -> Result<Option<i64>, StoreError>;

    async fn del(&self, key: &str) -> Result<(), StoreError>;

    /// Increments the counter and, on its first hit, gives it a TTL of `seconds`.
    ///
    /// A counter must never live without a TTL, so a failed `expire` deletes the
    /// fresh key before reporting the error. Stores with a native atomic form
    /// should override this.
    async fn incr_with_expiry(&self, key: &str, seconds: u64) -> Result<i64, StoreError> {
        let count = self.incr(key).await?;

        if count == 1 {
            if let Err(e) = self.expire(key, seconds).await {
                if let Err(del_err) = self.del(key).await {
                    error!("Failed to drop counter '{key}' left without TTL: {del_err}");
                }
                return Err(e);
            }
        }

        Ok(count)
    }
}
