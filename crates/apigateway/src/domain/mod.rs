pub mod identity;
pub mod policy;
pub mod response;

pub use self::identity::{CallerIdentity, Identity};
pub use self::policy::{FailurePolicy, KeyStrategy, PolicyName, RateLimitPolicy};
