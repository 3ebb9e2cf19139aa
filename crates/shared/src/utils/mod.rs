mod logs;
mod metrics;
mod otel;
mod shutdown;
mod time;

pub use self::logs::init_logger;
pub use self::metrics::{Decision, DecisionLabels, PolicyLabels, RateLimitMetrics};
pub use self::otel::Telemetry;
pub use self::shutdown::shutdown_signal;
pub use self::time::{now_millis, to_iso_millis};
