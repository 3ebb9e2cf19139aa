pub mod api;
pub mod rate_limit;

pub use self::api::ApiResponse;
pub use self::rate_limit::{RateLimitResult, RateLimitStatusResponse};
