use crate::{
    abstract_trait::rate_limit::DynRateLimiter,
    cache::RateLimiter,
    domain::{FailurePolicy, PolicyName, RateLimitPolicy},
};
use shared::{abstract_trait::DynCounterStore, errors::ConfigError, utils::RateLimitMetrics};
use std::{collections::HashMap, sync::Arc};
use tracing::info;

/// One limiter per named policy, built once at startup over a shared store.
#[derive(Clone)]
pub struct RateLimiterRegistry {
    limiters: Vec<DynRateLimiter>,
}

impl std::fmt::Debug for RateLimiterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.limiters.iter().map(|limiter| &limiter.policy().name))
            .finish()
    }
}

impl RateLimiterRegistry {
    pub fn new(
        store: DynCounterStore,
        failure_policy: FailurePolicy,
        metrics: Option<Arc<RateLimitMetrics>>,
    ) -> Result<Self, ConfigError> {
        Self::with_policies(
            PolicyName::ALL.map(RateLimitPolicy::builtin),
            store,
            failure_policy,
            metrics,
        )
    }

    /// `policies` are given in [`PolicyName::ALL`] order.
    pub fn with_policies(
        policies: [RateLimitPolicy; 6],
        store: DynCounterStore,
        failure_policy: FailurePolicy,
        metrics: Option<Arc<RateLimitMetrics>>,
    ) -> Result<Self, ConfigError> {
        validate_policies(&policies)?;

        for (expected, policy) in PolicyName::ALL.iter().zip(&policies) {
            if policy.name != expected.as_str() {
                return Err(ConfigError::InvalidValue {
                    name: format!("policy slot '{expected}'"),
                    value: policy.name.clone(),
                });
            }
        }

        let limiters = policies
            .into_iter()
            .map(|policy| {
                info!(
                    "Registering rate limit policy '{}': {} requests per {}ms",
                    policy.name, policy.max_requests, policy.window_ms
                );

                let mut limiter =
                    RateLimiter::new(policy, store.clone()).with_failure_policy(failure_policy);
                if let Some(metrics) = &metrics {
                    limiter = limiter.with_metrics(metrics.clone());
                }

                Arc::new(limiter) as DynRateLimiter
            })
            .collect();

        Ok(Self { limiters })
    }

    pub fn limiter(&self, name: PolicyName) -> &DynRateLimiter {
        &self.limiters[name.index()]
    }

    pub fn policy(&self, name: PolicyName) -> &RateLimitPolicy {
        self.limiter(name).policy()
    }
}

pub fn validate_policies(policies: &[RateLimitPolicy]) -> Result<(), ConfigError> {
    let mut namespaces: HashMap<&str, &str> = HashMap::new();

    for policy in policies {
        policy.validate()?;

        if let Some(first) = namespaces.insert(policy.namespace(), &policy.name) {
            return Err(ConfigError::DuplicateNamespace {
                namespace: policy.namespace().to_string(),
                first: first.to_string(),
                second: policy.name.clone(),
            });
        }
    }

    Ok(())
}
