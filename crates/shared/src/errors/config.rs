use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Policy '{0}' must have a window longer than zero")]
    InvalidWindow(String),

    #[error("Policy '{0}' must allow at least one request per window")]
    InvalidQuota(String),

    #[error("Policies '{first}' and '{second}' share the key namespace '{namespace}'")]
    DuplicateNamespace {
        namespace: String,
        first: String,
        second: String,
    },

    #[error("Invalid value for {name}: '{value}'")]
    InvalidValue { name: String, value: String },
}
