use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use shared::errors::ConfigError;
use std::{fmt, str::FromStr, time::Duration};

const FIFTEEN_MINUTES: Duration = Duration::from_secs(15 * 60);
const ONE_HOUR: Duration = Duration::from_secs(60 * 60);

const FORWARDED_FOR: &str = "x-forwarded-for";
const REAL_IP: &str = "x-real-ip";
const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PolicyName {
    Api,
    Upload,
    AiAnalysis,
    ContentGeneration,
    Publishing,
    Auth,
}

impl PolicyName {
    pub const ALL: [PolicyName; 6] = [
        PolicyName::Api,
        PolicyName::Upload,
        PolicyName::AiAnalysis,
        PolicyName::ContentGeneration,
        PolicyName::Publishing,
        PolicyName::Auth,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyName::Api => "api",
            PolicyName::Upload => "upload",
            PolicyName::AiAnalysis => "aiAnalysis",
            PolicyName::ContentGeneration => "contentGeneration",
            PolicyName::Publishing => "publishing",
            PolicyName::Auth => "auth",
        }
    }

    pub(crate) fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for PolicyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyName {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PolicyName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| ConfigError::InvalidValue {
                name: "policy".to_string(),
                value: s.to_string(),
            })
    }
}

/// How a request is mapped onto a counter key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum KeyStrategy {
    /// `<policy>:user:<id>` when an identity is known, `<policy>:ip:<addr>` otherwise.
    UserOrIp,
    /// `<policy>:ip:<addr>`, identity ignored.
    Ip,
    /// `<prefix>:<addr>`, identity ignored.
    Custom { prefix: String },
    /// One counter for every caller.
    Fixed { key: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailurePolicy {
    #[default]
    FailOpen,
    FailClosed,
}

impl FromStr for FailurePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" | "fail_open" => Ok(FailurePolicy::FailOpen),
            "closed" | "fail_closed" => Ok(FailurePolicy::FailClosed),
            other => Err(ConfigError::InvalidValue {
                name: "RATE_LIMIT_FAILURE_POLICY".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitPolicy {
    pub name: String,
    pub window_ms: u64,
    pub max_requests: u32,
    pub key_strategy: KeyStrategy,
    #[serde(default)]
    pub skip_successful_requests: bool,
    #[serde(default)]
    pub skip_failed_requests: bool,
}

impl RateLimitPolicy {
    pub fn new(name: impl Into<String>, window: Duration, max_requests: u32) -> Self {
        Self {
            name: name.into(),
            window_ms: window.as_millis() as u64,
            max_requests,
            key_strategy: KeyStrategy::UserOrIp,
            skip_successful_requests: false,
            skip_failed_requests: false,
        }
    }

    pub fn with_key_strategy(mut self, key_strategy: KeyStrategy) -> Self {
        self.key_strategy = key_strategy;
        self
    }

    pub fn skip_successful_requests(mut self, skip: bool) -> Self {
        self.skip_successful_requests = skip;
        self
    }

    pub fn skip_failed_requests(mut self, skip: bool) -> Self {
        self.skip_failed_requests = skip;
        self
    }

    pub fn builtin(name: PolicyName) -> Self {
        match name {
            PolicyName::Api => Self::new(name.as_str(), FIFTEEN_MINUTES, 100),
            PolicyName::Upload => Self::new(name.as_str(), ONE_HOUR, 10),
            PolicyName::AiAnalysis => Self::new(name.as_str(), ONE_HOUR, 20),
            PolicyName::ContentGeneration => Self::new(name.as_str(), ONE_HOUR, 50),
            PolicyName::Publishing => Self::new(name.as_str(), ONE_HOUR, 30),
            PolicyName::Auth => Self::new(name.as_str(), FIFTEEN_MINUTES, 5).with_key_strategy(
                KeyStrategy::Custom {
                    prefix: "auth".to_string(),
                },
            ),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_ms == 0 {
            return Err(ConfigError::InvalidWindow(self.name.clone()));
        }

        if self.max_requests == 0 {
            return Err(ConfigError::InvalidQuota(self.name.clone()));
        }

        Ok(())
    }

    /// Leading key segment owned by this policy. No two registered policies may share one.
    pub fn namespace(&self) -> &str {
        match &self.key_strategy {
            KeyStrategy::UserOrIp | KeyStrategy::Ip => &self.name,
            KeyStrategy::Custom { prefix } => prefix,
            KeyStrategy::Fixed { key } => key,
        }
    }

    pub fn derive_key(&self, headers: &HeaderMap, identity: Option<&str>) -> String {
        let namespace = self.namespace();

        match &self.key_strategy {
            KeyStrategy::UserOrIp => match (identity, client_ip(headers)) {
                (Some(id), _) => format!("{namespace}:user:{id}"),
                (None, Some(ip)) => format!("{namespace}:ip:{ip}"),
                (None, None) => format!("{namespace}:{UNKNOWN}"),
            },
            KeyStrategy::Ip => match client_ip(headers) {
                Some(ip) => format!("{namespace}:ip:{ip}"),
                None => format!("{namespace}:{UNKNOWN}"),
            },
            KeyStrategy::Custom { .. } => {
                let ip = client_ip(headers);
                format!("{namespace}:{}", ip.as_deref().unwrap_or(UNKNOWN))
            }
            KeyStrategy::Fixed { key } => key.clone(),
        }
    }

    pub fn window_index(&self, now_ms: u64) -> u64 {
        now_ms / self.window_ms
    }

    /// Epoch ms at which window `window_index` ends and the next one starts.
    pub fn window_end(&self, window_index: u64) -> u64 {
        (window_index + 1) * self.window_ms
    }

    pub fn ttl_secs(&self) -> u64 {
        self.window_ms.div_ceil(1000)
    }
}

/// First `x-forwarded-for` hop, falling back to `x-real-ip`.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get(FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let real_ip = || {
        headers
            .get(REAL_IP)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    forwarded.or_else(real_ip).map(str::to_owned)
}
