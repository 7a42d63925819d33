use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::errors::types::{Error, Result};

/// Default environment variable prefix
pub const DEFAULT_ENV_PREFIX: &str = "FDPORT";

/// Builder-style loader for any `serde` configuration type
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    file_required: bool,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self {
            file: None,
            file_required: false,
            env_prefix: Some(DEFAULT_ENV_PREFIX.to_string()),
        }
    }
}

impl ConfigLoader {
    /// Create a loader reading only from the default environment prefix
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a TOML file; a missing file is an error
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self.file_required = true;
        self
    }

    /// Read a TOML file if it exists
    pub fn with_optional_file(mut self, path: impl AsRef<Path>) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self.file_required = false;
        self
    }

    /// Change the environment prefix
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Ignore the environment entirely
    pub fn without_env(mut self) -> Self {
        self.env_prefix = None;
        self
    }

    /// Load and deserialize the configuration
    pub fn load<T: DeserializeOwned>(&self) -> Result<T> {
        let mut builder = Config::builder();

        if let Some(path) = &self.file {
            if self.file_required && !path.exists() {
                return Err(Error::Config(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
            debug!("Loading configuration file {}", path.display());
            builder = builder.add_source(
                File::from(path.as_path())
                    .format(FileFormat::Toml)
                    .required(self.file_required),
            );
        }

        if let Some(prefix) = &self.env_prefix {
            builder = builder.add_source(
                Environment::with_prefix(prefix)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let settings = builder.build()?;
        Ok(settings.try_deserialize::<T>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serial_test::serial;
    use std::io::Write;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(default)]
    struct Sample {
        clock_rate: u32,
        name: String,
        media: MediaSection,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(default)]
    struct MediaSection {
        ptime_ms: u32,
    }

    impl Default for Sample {
        fn default() -> Self {
            Self {
                clock_rate: 8000,
                name: "default".to_string(),
                media: MediaSection::default(),
            }
        }
    }

    impl Default for MediaSection {
        fn default() -> Self {
            Self { ptime_ms: 20 }
        }
    }

    #[test]
    fn test_defaults_without_sources() {
        let loaded: Sample = ConfigLoader::new().without_env().load().unwrap();
        assert_eq!(loaded, Sample::default());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "clock_rate = 16000\n[media]\nptime_ms = 10").unwrap();

        let loaded: Sample = ConfigLoader::new()
            .without_env()
            .with_file(file.path())
            .load()
            .unwrap();

        assert_eq!(loaded.clock_rate, 16000);
        assert_eq!(loaded.media.ptime_ms, 10);
        assert_eq!(loaded.name, "default");
    }

    #[test]
    fn test_missing_required_file() {
        let result: Result<Sample> = ConfigLoader::new()
            .without_env()
            .with_file("/nonexistent/fdport.toml")
            .load();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_optional_file_is_ignored() {
        let loaded: Sample = ConfigLoader::new()
            .without_env()
            .with_optional_file("/nonexistent/fdport.toml")
            .load()
            .unwrap();
        assert_eq!(loaded, Sample::default());
    }

    #[test]
    #[serial]
    fn test_environment_overrides() {
        std::env::set_var("FDPORTTEST__CLOCK_RATE", "32000");
        let loaded: Sample = ConfigLoader::new()
            .with_env_prefix("FDPORTTEST")
            .load()
            .unwrap();
        std::env::remove_var("FDPORTTEST__CLOCK_RATE");

        assert_eq!(loaded.clock_rate, 32000);
    }
}
