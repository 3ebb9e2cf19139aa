pub mod identity;
pub mod rate_limit;

pub use self::identity::identity_middleware;
pub use self::rate_limit::{PolicyGuard, rate_limit_middleware};
