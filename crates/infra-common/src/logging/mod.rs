/*!
Logging

`tracing` subscriber setup shared by every fdport binary and test harness.
*/

pub mod setup;

pub use setup::{parse_log_level, setup_logging, LoggingConfig};
