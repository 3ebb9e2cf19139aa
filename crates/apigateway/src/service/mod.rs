mod ai_limiter;
mod guard;
mod registry;

pub use self::ai_limiter::AiServiceRateLimiter;
pub use self::guard::RateLimitGuard;
pub use self::registry::RateLimiterRegistry;
