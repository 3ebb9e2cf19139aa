use crate::domain::FailurePolicy;
use anyhow::{Context, Result, anyhow};
use shared::config::RedisConfig;

const DEFAULT_OTEL_ENDPOINT: &str = "http://otel-collector:4317";

#[derive(Debug, Clone)]
pub enum StoreBackend {
    Redis(RedisConfig),
    Memory,
}

impl StoreBackend {
    pub fn label(&self) -> &'static str {
        match self {
            StoreBackend::Redis(_) => "redis",
            StoreBackend::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub store: StoreBackend,
    pub failure_policy: FailurePolicy,
    pub otel_endpoint: String,
    pub is_dev: bool,
    pub enable_file_log: bool,
    pub trust_user_id_header: bool,
}

impl Config {
    pub fn init() -> Result<Self> {
        let port = std::env::var("PORT")
            .context("Missing environment variable: PORT")?
            .parse::<u16>()
            .context("PORT must be a valid u16 integer")?;

        let store_kind = std::env::var("RATE_LIMIT_STORE").unwrap_or_else(|_| "redis".to_string());

        let store = match store_kind.as_str() {
            "redis" => StoreBackend::Redis(redis_config()?),
            "memory" => StoreBackend::Memory,
            other => {
                return Err(anyhow!(
                    "RATE_LIMIT_STORE must be 'redis' or 'memory', got '{}'",
                    other
                ));
            }
        };

        let failure_policy = match std::env::var("RATE_LIMIT_FAILURE_POLICY") {
            Ok(value) => value
                .parse::<FailurePolicy>()
                .context("RATE_LIMIT_FAILURE_POLICY must be 'open' or 'closed'")?,
            Err(_) => FailurePolicy::default(),
        };

        let otel_endpoint =
            std::env::var("OTEL_ENDPOINT").unwrap_or_else(|_| DEFAULT_OTEL_ENDPOINT.to_string());

        let is_dev = flag("DEV_MODE");
        let enable_file_log = flag("ENABLE_FILE_LOG");
        let trust_user_id_header = flag("TRUST_USER_ID_HEADER");

        Ok(Self {
            port,
            store,
            failure_policy,
            otel_endpoint,
            is_dev,
            enable_file_log,
            trust_user_id_header,
        })
    }
}

fn redis_config() -> Result<RedisConfig> {
    let host =
        std::env::var("REDIS_HOST").context("Missing environment variable: REDIS_HOST")?;

    let port = match std::env::var("REDIS_PORT") {
        Ok(port) => port
            .parse::<u16>()
            .context("REDIS_PORT must be a valid u16 integer")?,
        Err(_) => 6379,
    };

    let db = match std::env::var("REDIS_DB") {
        Ok(db) => db
            .parse::<u8>()
            .context("REDIS_DB must be a valid u8 integer")?,
        Err(_) => 0,
    };

    let password = std::env::var("REDIS_PASSWORD")
        .ok()
        .filter(|pw| !pw.is_empty());

    Ok(RedisConfig::new(host, port, db, password))
}

fn flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false)
}
