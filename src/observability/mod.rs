// Request statistics
pub mod stats;

// Structured logging
pub mod logging;

pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use stats::{RouteStats, ServiceStats, StatsCollector, StatsSnapshot};
