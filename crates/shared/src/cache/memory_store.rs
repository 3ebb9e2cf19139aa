use crate::{abstract_trait::CounterStoreTrait, errors::StoreError};
use async_trait::async_trait;
use std::{collections::HashMap, time::Duration};
use tokio::{sync::RwLock, time::Instant};
use tracing::debug;

const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy)]
struct CounterEntry {
    value: i64,
    expires_at: Option<Instant>,
}

impl CounterEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Default)]
struct Counters {
    entries: HashMap<String, CounterEntry>,
    last_sweep: Option<Instant>,
}

impl Counters {
    fn drop_expired(&mut self, key: &str, now: Instant) {
        if self.entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            self.entries.remove(key);
        }
    }

    fn live(&mut self, key: &str, now: Instant) -> Option<&mut CounterEntry> {
        self.drop_expired(key, now);
        self.entries.get_mut(key)
    }

    fn incr(&mut self, key: &str, now: Instant) -> &mut CounterEntry {
        self.sweep(now);
        self.drop_expired(key, now);

        let entry = self
            .entries
            .entry(key.to_string())
            .or_insert(CounterEntry {
                value: 0,
                expires_at: None,
            });
        entry.value += 1;
        entry
    }

    /// Old windows are never written again, so they are swept on a timer
    /// rather than on access.
    fn sweep(&mut self, now: Instant) {
        let due = self
            .last_sweep
            .is_none_or(|last| now.duration_since(last) >= SWEEP_INTERVAL);
        if !due {
            return;
        }

        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        self.last_sweep = Some(now);

        let swept = before - self.entries.len();
        if swept > 0 {
            debug!("Swept {swept} expired rate limit counters");
        }
    }
}

/// Single-process counter store for development and tests.
///
/// Every mutation runs under one write lock, so the compound operations are
/// atomic with respect to each other.
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    counters: RwLock<Counters>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStoreTrait for InMemoryCounterStore {
    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let now = Instant::now();
        let counters = self.counters.read().await;

        Ok(counters
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value))
    }

    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        let now = Instant::now();
        let mut counters = self.counters.write().await;

        Ok(counters.incr(key, now).value)
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<(), StoreError> {
        let now = Instant::now();
        let mut counters = self.counters.write().await;

        if let Some(entry) = counters.live(key, now) {
            entry.expires_at = Some(now + Duration::from_secs(seconds));
        }

        Ok(())
    }

    async fn decr_if_positive(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let now = Instant::now();
        let mut counters = self.counters.write().await;

        Ok(counters
            .live(key, now)
            .filter(|entry| entry.value > 0)
            .map(|entry| {
                entry.value -= 1;
                entry.value
            }))
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        self.counters.write().await.entries.remove(key);
        Ok(())
    }

    async fn incr_with_expiry(&self, key: &str, seconds: u64) -> Result<i64, StoreError> {
        let now = Instant::now();
        let mut counters = self.counters.write().await;

        let entry = counters.incr(key, now);
        if entry.value == 1 || entry.expires_at.is_none() {
            entry.expires_at = Some(now + Duration::from_secs(seconds));
        }

        Ok(entry.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn incr_creates_counter_at_one() {
        let store = InMemoryCounterStore::new();

        assert_eq!(store.get("k").await.unwrap(), None);
        assert_eq!(store.incr("k").await.unwrap(), 1);
        assert_eq!(store.incr("k").await.unwrap(), 2);
        assert_eq!(store.get("k").await.unwrap(), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_counter_restarts() {
        let store = InMemoryCounterStore::new();

        store.incr("k").await.unwrap();
        store.expire("k", 1).await.unwrap();

        tokio::time::advance(Duration::from_millis(1_001)).await;

        assert_eq!(store.get("k").await.unwrap(), None);
        assert_eq!(store.incr("k").await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn incr_with_expiry_sets_ttl_on_first_hit_only() {
        let store = InMemoryCounterStore::new();

        assert_eq!(store.incr_with_expiry("k", 2).await.unwrap(), 1);
        tokio::time::advance(Duration::from_millis(1_500)).await;
        assert_eq!(store.incr_with_expiry("k", 2).await.unwrap(), 2);

        // second hit must not push the deadline out
        tokio::time::advance(Duration::from_millis(600)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_windows_are_swept() {
        let store = InMemoryCounterStore::new();

        for window in 0..1_000 {
            store
                .incr_with_expiry(&format!("rate_limit:api:ip:1.2.3.4:{window}"), 1)
                .await
                .unwrap();
        }
        assert_eq!(store.counters.read().await.entries.len(), 1_000);

        tokio::time::advance(SWEEP_INTERVAL + Duration::from_secs(1)).await;
        store.incr_with_expiry("rate_limit:api:ip:1.2.3.4:1000", 1).await.unwrap();

        assert_eq!(store.counters.read().await.entries.len(), 1);
    }

    #[tokio::test]
    async fn decr_if_positive_stops_at_zero() {
        let store = InMemoryCounterStore::new();

        assert_eq!(store.decr_if_positive("k").await.unwrap(), None);

        store.incr("k").await.unwrap();
        assert_eq!(store.decr_if_positive("k").await.unwrap(), Some(0));
        assert_eq!(store.decr_if_positive("k").await.unwrap(), None);
        assert_eq!(store.get("k").await.unwrap(), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn decr_if_positive_does_not_revive_expired_counter() {
        let store = InMemoryCounterStore::new();

        store.incr_with_expiry("k", 1).await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(store.decr_if_positive("k").await.unwrap(), None);
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_decrements_never_go_negative() {
        let store = Arc::new(InMemoryCounterStore::new());
        store.incr("k").await.unwrap();

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let store = store.clone();
            tasks.spawn(async move { store.decr_if_positive("k").await.unwrap() });
        }

        let mut taken = 0;
        while let Some(result) = tasks.join_next().await {
            if result.unwrap().is_some() {
                taken += 1;
            }
        }

        assert_eq!(taken, 1);
        assert_eq!(store.get("k").await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn del_removes_counter() {
        let store = InMemoryCounterStore::new();

        store.incr("k").await.unwrap();
        store.del("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }
}
