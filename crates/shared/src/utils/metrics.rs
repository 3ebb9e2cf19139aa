use prometheus_client::metrics::{counter::Counter, family::Family};
use prometheus_client::registry::Registry;
use prometheus_client_derive_encode::{EncodeLabelSet, EncodeLabelValue};

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum Decision {
    Allowed,
    Denied,
    FailOpen,
    FailClosed,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct DecisionLabels {
    pub policy: String,
    pub outcome: Decision,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct PolicyLabels {
    pub policy: String,
}

#[derive(Clone, Debug, Default)]
pub struct RateLimitMetrics {
    pub decisions: Family<DecisionLabels, Counter>,
    pub refunds: Family<PolicyLabels, Counter>,
    pub store_errors: Counter,
}

impl RateLimitMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, registry: &mut Registry) {
        registry.register(
            "rate_limit_decisions",
            "Rate limit decisions by policy and outcome",
            self.decisions.clone(),
        );

        registry.register(
            "rate_limit_refunds",
            "Requests removed from a window after the handler outcome",
            self.refunds.clone(),
        );

        registry.register(
            "rate_limit_store_errors",
            "Counter store failures absorbed by the limiter",
            self.store_errors.clone(),
        );
    }

    pub fn record(&self, policy: &str, outcome: Decision) {
        let labels = DecisionLabels {
            policy: policy.to_string(),
            outcome,
        };
        self.decisions.get_or_create(&labels).inc();
    }

    pub fn record_refund(&self, policy: &str) {
        let labels = PolicyLabels {
            policy: policy.to_string(),
        };
        self.refunds.get_or_create(&labels).inc();
    }

    pub fn record_store_error(&self) {
        self.store_errors.inc();
    }
}
