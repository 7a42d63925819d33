use crate::errors::types::{Error, Result};
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

/// How a binary wants its logs
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Base level; `RUST_LOG` directives refine it
    pub level: Level,
    /// JSON lines on stdout instead of the human format
    pub json: bool,
    /// Include file and line of each event
    pub file_info: bool,
    /// Log span enter/exit
    pub log_spans: bool,
    /// Name announced in the startup line
    pub app_name: String,
    /// Version announced in the startup line
    pub version: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: Level::INFO,
            json: false,
            file_info: false,
            log_spans: false,
            app_name: "fdport".to_string(),
            version: None,
        }
    }
}

impl LoggingConfig {
    pub fn new(level: Level, app_name: impl Into<String>) -> Self {
        LoggingConfig {
            level,
            app_name: app_name.into(),
            ..Default::default()
        }
    }

    pub fn with_json(mut self) -> Self {
        self.json = true;
        self
    }

    pub fn with_file_info(mut self) -> Self {
        self.file_info = true;
        self
    }

    pub fn with_spans(mut self) -> Self {
        self.log_spans = true;
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Line logged once the subscriber is installed
    pub fn startup_line(&self) -> String {
        match &self.version {
            Some(version) => format!("Starting {} v{}", self.app_name, version),
            None => format!("Starting {}", self.app_name),
        }
    }
}

/// Install the global subscriber and announce the application.
///
/// Fails if a global subscriber is already installed.
pub fn setup_logging(config: LoggingConfig) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive(config.level.into());
    let span_events = if config.log_spans {
        FmtSpan::ACTIVE
    } else {
        FmtSpan::NONE
    };

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_span_events(span_events)
        .with_file(config.file_info)
        .with_line_number(config.file_info);

    let installed = if config.json {
        builder.with_writer(std::io::stdout).json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| {
        Error::Logging(format!("{}: cannot install subscriber: {}", config.app_name, e))
    })?;

    tracing::info!("{}", config.startup_line());
    Ok(())
}

/// Parse a log level from a string
pub fn parse_log_level(level: &str) -> Result<Level> {
    Level::from_str(level).map_err(|_| Error::Config(format!("Invalid log level: {}", level)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("debug").unwrap(), Level::DEBUG);
        assert_eq!(parse_log_level("WARN").unwrap(), Level::WARN);
        assert!(matches!(parse_log_level("loud"), Err(Error::Config(_))));
    }

    #[test]
    fn test_startup_line_names_the_app() {
        let config = LoggingConfig::new(Level::TRACE, "fdport-test");
        assert_eq!(config.startup_line(), "Starting fdport-test");
        assert_eq!(
            config.with_version("1.2.3").startup_line(),
            "Starting fdport-test v1.2.3"
        );
    }

    #[test]
    fn test_second_install_fails_with_app_name() {
        // The first install may succeed or lose to another test; the second never succeeds
        let _ = setup_logging(LoggingConfig::new(Level::WARN, "first"));
        let err = setup_logging(LoggingConfig::new(Level::WARN, "second").with_json()).unwrap_err();
        assert!(matches!(&err, Error::Logging(msg) if msg.starts_with("second:")));
    }
}
