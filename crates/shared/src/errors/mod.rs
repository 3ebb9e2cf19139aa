mod config;
mod error;
mod http;
mod rate_limit;
mod store;

pub use self::config::ConfigError;
pub use self::error::ErrorResponse;
pub use self::http::HttpError;
pub use self::rate_limit::{DEFAULT_RETRY_AFTER_SECS, RateLimitError};
pub use self::store::StoreError;
