use crate::{abstract_trait::CounterStoreTrait, errors::StoreError};
use async_trait::async_trait;
use deadpool_redis::{Connection, Pool};
use redis::Script;
use std::sync::Arc;
use tracing::{debug, error};

/// KEYS[1]: counter key, ARGV[1]: TTL in seconds.
///
/// A key left without TTL (`TTL` = -1) gets one on its next hit.
const INCR_WITH_EXPIRY_SCRIPT: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 or redis.call('TTL', KEYS[1]) == -1 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return count
"#;

/// KEYS[1]: counter key. Returns the new count, or nil when already at zero.
const DECR_IF_POSITIVE_SCRIPT: &str = r#"
local current = tonumber(redis.call('GET', KEYS[1]))
if current == nil or current <= 0 then
    return false
end
return redis.call('DECR', KEYS[1])
"#;

#[derive(Clone)]
pub struct RedisCounterStore {
    redis_pool: Arc<Pool>,
}

impl RedisCounterStore {
    pub fn new(redis_pool: Pool) -> Self {
        Self {
            redis_pool: Arc::new(redis_pool),
        }
    }

    async fn get_conn(&self) -> Result<Connection, StoreError> {
        self.redis_pool.get().await.map_err(|e| {
            error!("Failed to get Redis pooled connection: {:?}", e);
            StoreError::from(e)
        })
    }
}

#[async_trait]
impl CounterStoreTrait for RedisCounterStore {
    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let mut conn = self.get_conn().await?;

        let value: Option<i64> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;

        Ok(value)
    }

    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        let mut conn = self.get_conn().await?;

        let value: i64 = redis::cmd("INCR").arg(key).query_async(&mut conn).await?;

        debug!("Incremented counter '{}' to {}", key, value);
        Ok(value)
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<(), StoreError> {
        let mut conn = self.get_conn().await?;

        redis::cmd("EXPIRE")
            .arg(key)
            .arg(seconds)
            .query_async::<()>(&mut conn)
            .await?;

        Ok(())
    }

    async fn decr_if_positive(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let mut conn = self.get_conn().await?;

        let value: Option<i64> = Script::new(DECR_IF_POSITIVE_SCRIPT)
            .key(key)
            .invoke_async(&mut conn)
            .await?;

        Ok(value)
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.get_conn().await?;

        redis::cmd("DEL")
            .arg(key)
            .query_async::<()>(&mut conn)
            .await?;

        Ok(())
    }

    async fn incr_with_expiry(&self, key: &str, seconds: u64) -> Result<i64, StoreError> {
        let mut conn = self.get_conn().await?;

        let value: i64 = Script::new(INCR_WITH_EXPIRY_SCRIPT)
            .key(key)
            .arg(seconds)
            .invoke_async(&mut conn)
            .await?;

        debug!("Incremented counter '{}' to {}", key, value);
        Ok(value)
    }
}
