//! Command line and configuration file handling

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use fdport_infra_common::config::ConfigLoader;
use fdport_infra_common::errors::{Error, Result};
use fdport_media_core::BridgeConfig;
use fdport_session_core::HangupPolicy;
use serde::Deserialize;

/// Play a raw PCM file into a call and record the call into another
#[derive(Parser, Debug, Default)]
#[command(name = "fdport", version)]
#[command(about = "Bridge raw 16-bit PCM files to a call through a file-descriptor port")]
pub struct Args {
    /// File whose samples are sent to the call
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// File receiving the call audio
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, env = "FDPORT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Bridge clock rate in Hz
    #[arg(long)]
    pub clock_rate: Option<u32>,

    /// Frame duration in milliseconds
    #[arg(long)]
    pub ptime: Option<u32>,

    /// Use non-blocking, buffered descriptor I/O
    #[arg(long)]
    pub nonblocking: bool,

    /// Stop after this many seconds instead of waiting for Ctrl+C
    #[arg(short, long)]
    pub duration: Option<u64>,

    /// Frequency of the simulated caller's tone
    #[arg(long)]
    pub tone_hz: Option<f64>,

    /// Leave the call wired to the files until its port goes away
    #[arg(long)]
    pub keep_connected: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bridge: BridgeConfig,
    pub input: PathBuf,
    pub output: PathBuf,
    pub nonblocking: bool,
    pub hangup_policy: HangupPolicy,
    pub tone_hz: f64,
    pub duration_secs: Option<u64>,
    pub log_level: String,
    pub json_logs: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bridge: BridgeConfig::default(),
            input: PathBuf::from("in.pcm"),
            output: PathBuf::from("out.pcm"),
            nonblocking: false,
            hangup_policy: HangupPolicy::default(),
            tone_hz: 440.0,
            duration_secs: None,
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl AppConfig {
    /// Load the file and `FDPORT__*` environment layers, then apply `args`
    pub fn load(args: &Args) -> Result<Self> {
        let mut loader = ConfigLoader::new();
        if let Some(path) = &args.config {
            loader = loader.with_file(path);
        }
        let mut config: AppConfig = loader.load()?;
        config.apply(args);
        config
            .bridge
            .validate()
            .map_err(|e| Error::Validation(format!("bridge: {}", e)))?;
        Ok(config)
    }

    /// Command line flags win over every other layer
    pub fn apply(&mut self, args: &Args) {
        if let Some(input) = &args.input {
            self.input = input.clone();
        }
        if let Some(output) = &args.output {
            self.output = output.clone();
        }
        if let Some(rate) = args.clock_rate {
            self.bridge.clock_rate = rate;
        }
        if let Some(ptime) = args.ptime {
            self.bridge.ptime_ms = ptime;
        }
        if let Some(hz) = args.tone_hz {
            self.tone_hz = hz;
        }
        if let Some(secs) = args.duration {
            self.duration_secs = Some(secs);
        }
        if let Some(level) = &args.log_level {
            self.log_level = level.clone();
        }
        self.nonblocking |= args.nonblocking;
        self.json_logs |= args.json_logs;
        if args.keep_connected {
            self.hangup_policy = HangupPolicy::KeepConnected;
        }
    }

    /// How long to run, if bounded
    pub fn duration(&self) -> Option<Duration> {
        self.duration_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_defaults_match_sample_files() {
        let args = Args::parse_from(["fdport"]);
        let mut config = AppConfig::default();
        config.apply(&args);

        assert_eq!(config.input, PathBuf::from("in.pcm"));
        assert_eq!(config.output, PathBuf::from("out.pcm"));
        assert_eq!(config.bridge, BridgeConfig::default());
        assert_eq!(config.hangup_policy, HangupPolicy::Disconnect);
        assert!(config.duration().is_none());
    }

    #[test]
    fn test_flags_override() {
        let args = Args::parse_from([
            "fdport",
            "--input",
            "a.raw",
            "--clock-rate",
            "16000",
            "--ptime",
            "10",
            "--nonblocking",
            "--duration",
            "3",
            "--keep-connected",
            "--log-level",
            "debug",
        ]);
        let mut config = AppConfig::default();
        config.apply(&args);

        assert_eq!(config.input, PathBuf::from("a.raw"));
        assert_eq!(config.bridge.clock_rate, 16000);
        assert_eq!(config.bridge.samples_per_frame(), 160);
        assert!(config.nonblocking);
        assert_eq!(config.duration(), Some(Duration::from_secs(3)));
        assert_eq!(config.hangup_policy, HangupPolicy::KeepConnected);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    #[serial]
    fn test_file_then_flags() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "output = \"call.pcm\"\nhangup_policy = \"keep-connected\"\ntone_hz = 1000.0\n\n[bridge]\nptime_ms = 40"
        )
        .unwrap();

        let args = Args {
            config: Some(file.path().to_path_buf()),
            tone_hz: Some(300.0),
            ..Default::default()
        };
        let config = AppConfig::load(&args).unwrap();

        assert_eq!(config.output, PathBuf::from("call.pcm"));
        assert_eq!(config.hangup_policy, HangupPolicy::KeepConnected);
        assert_eq!(config.bridge.ptime_ms, 40);
        assert_eq!(config.bridge.clock_rate, 8000);
        assert_eq!(config.tone_hz, 300.0);
    }

    #[test]
    #[serial]
    fn test_unusable_bridge_settings_are_rejected() {
        let args = Args {
            ptime: Some(0),
            ..Default::default()
        };
        assert!(matches!(AppConfig::load(&args), Err(Error::Validation(_))));
    }

    #[test]
    #[serial]
    fn test_missing_config_file() {
        let args = Args {
            config: Some(PathBuf::from("/nonexistent/fdport.toml")),
            ..Default::default()
        };
        assert!(AppConfig::load(&args).is_err());
    }
}
