//! Shared utilities for rollcall.

pub mod format;
pub mod logging;
pub mod stats;

pub use format::{format_duration, format_meters, format_percent};
pub use logging::{init_logging, LogFormat, LoggingError};
pub use stats::StatsCounter;
