use crate::{
    config::{Config, StoreBackend},
    domain::FailurePolicy,
    service::{AiServiceRateLimiter, RateLimitGuard, RateLimiterRegistry},
};
use anyhow::{Context, Result};
use prometheus_client::registry::Registry;
use shared::{
    abstract_trait::DynCounterStore,
    cache::{InMemoryCounterStore, RedisCounterStore},
    config::RedisClient,
    utils::RateLimitMetrics,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub limiters: Arc<RateLimiterRegistry>,
    pub guard: Arc<RateLimitGuard>,
    pub ai_limiter: Arc<AiServiceRateLimiter>,
    pub registry: Arc<Mutex<Registry>>,
    pub metrics: Arc<RateLimitMetrics>,
    pub trust_user_id_header: bool,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("limiters", &self.limiters)
            .field("ai_limiter", &self.ai_limiter.policy().name)
            .field("trust_user_id_header", &self.trust_user_id_header)
            .finish()
    }
}

impl AppState {
    pub async fn new(config: &Config) -> Result<Self> {
        let store: DynCounterStore = match &config.store {
            StoreBackend::Redis(redis_config) => {
                info!("Initializing Redis connection for rate limiting");

                let redis = RedisClient::new(redis_config).context("Failed to connect to Redis")?;
                redis.ping().await.context("Failed to ping Redis server")?;

                Arc::new(RedisCounterStore::new(redis.pool))
            }
            StoreBackend::Memory => {
                warn!("Using in-memory rate limit store; counters are not shared across instances");
                Arc::new(InMemoryCounterStore::new())
            }
        };

        if config.trust_user_id_header {
            warn!("Trusting client-supplied x-user-id as caller identity");
        }

        Ok(Self::with_store(store, config.failure_policy)?
            .with_trusted_user_id_header(config.trust_user_id_header))
    }

    pub fn with_store(store: DynCounterStore, failure_policy: FailurePolicy) -> Result<Self> {
        let metrics = Arc::new(RateLimitMetrics::new());

        let mut registry = Registry::default();
        metrics.register(&mut registry);

        let limiters = Arc::new(
            RateLimiterRegistry::new(store.clone(), failure_policy, Some(metrics.clone()))
                .context("Invalid rate limit policy configuration")?,
        );

        let guard = Arc::new(RateLimitGuard::new(limiters.clone()));

        let ai_limiter = Arc::new(
            AiServiceRateLimiter::new(store)
                .with_failure_policy(failure_policy)
                .with_metrics(metrics.clone()),
        );

        Ok(Self {
            limiters,
            guard,
            ai_limiter,
            registry: Arc::new(Mutex::new(registry)),
            metrics,
            trust_user_id_header: false,
        })
    }

    pub fn with_trusted_user_id_header(mut self, trust: bool) -> Self {
        self.trust_user_id_header = trust;
        self
    }
}
