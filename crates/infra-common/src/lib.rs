/*!
Common infrastructure for the fdport workspace.

- [`errors`]: the shared error type
- [`logging`]: `tracing` subscriber setup
- [`config`]: layered configuration loading (defaults, TOML file, environment)
*/

pub mod config;
pub mod errors;
pub mod logging;

pub use config::ConfigLoader;
pub use errors::{Error, Result};
pub use logging::{parse_log_level, setup_logging, LoggingConfig};
