//! Command-line interface for roomscribe
//!
//! Provides argument parsing using clap derive macros.

use crate::config::Config;
use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;

/// Relay room audio to a streaming speech-recognition backend
#[derive(Parser, Debug)]
#[command(
    name = "roomscribe",
    version,
    about = "Relay room audio to a streaming speech-recognition backend"
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Recognition backend address (host:port)
    #[arg(long, value_name = "ADDR")]
    pub endpoint: Option<String>,

    /// Language code for recognition (e.g. en-US, tr, de)
    #[arg(long, value_name = "LANG")]
    pub language: Option<String>,

    /// Recognition model name
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Suppress all but error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Verbose output (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Log level implied by the quiet/verbose flags. Quiet wins.
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::Error;
        }
        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    /// Folds command-line overrides into a loaded configuration.
    pub fn apply_overrides(&self, mut config: Config) -> Config {
        if let Some(endpoint) = &self.endpoint {
            config.recognition.endpoint = endpoint.clone();
        }
        if let Some(language) = &self.language {
            config.recognition.language = language.clone();
        }
        if let Some(model) = &self.model {
            config.recognition.model = Some(model.clone());
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults() {
        let cli = Cli::try_parse_from(["roomscribe"]).unwrap();
        assert!(cli.config.is_none());
        assert!(cli.endpoint.is_none());
        assert!(cli.language.is_none());
        assert!(cli.model.is_none());
        assert!(!cli.quiet);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_parse_with_options() {
        let cli = Cli::try_parse_from([
            "roomscribe",
            "--endpoint",
            "stt.internal:7700",
            "--language",
            "tr",
            "--model",
            "meeting",
        ])
        .unwrap();

        assert_eq!(cli.endpoint.as_deref(), Some("stt.internal:7700"));
        assert_eq!(cli.language.as_deref(), Some("tr"));
        assert_eq!(cli.model.as_deref(), Some("meeting"));
    }

    #[test]
    fn test_parse_config_path() {
        let cli = Cli::try_parse_from(["roomscribe", "--config", "/etc/roomscribe.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/roomscribe.toml")));
    }

    #[test]
    fn test_log_level_default_is_info() {
        let cli = Cli::try_parse_from(["roomscribe"]).unwrap();
        assert_eq!(cli.log_level(), LevelFilter::Info);
    }

    #[test]
    fn test_log_level_verbose() {
        let cli = Cli::try_parse_from(["roomscribe", "-v"]).unwrap();
        assert_eq!(cli.log_level(), LevelFilter::Debug);

        let cli = Cli::try_parse_from(["roomscribe", "-vv"]).unwrap();
        assert_eq!(cli.log_level(), LevelFilter::Trace);
    }

    #[test]
    fn test_log_level_quiet_wins_over_verbose() {
        let cli = Cli::try_parse_from(["roomscribe", "-q", "-vv"]).unwrap();
        assert_eq!(cli.log_level(), LevelFilter::Error);
    }

    #[test]
    fn test_apply_overrides_replaces_recognition_settings() {
        let cli = Cli::try_parse_from([
            "roomscribe",
            "--endpoint",
            "stt:9",
            "--language",
            "de",
        ])
        .unwrap();

        let config = cli.apply_overrides(Config::default());
        assert_eq!(config.recognition.endpoint, "stt:9");
        assert_eq!(config.recognition.language, "de");
        assert_eq!(config.recognition.model, None); // Not overridden
    }

    #[test]
    fn test_apply_overrides_leaves_config_alone_without_flags() {
        let cli = Cli::try_parse_from(["roomscribe"]).unwrap();
        let config = cli.apply_overrides(Config::default());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_invalid_flag_returns_error() {
        assert!(Cli::try_parse_from(["roomscribe", "--nonsense"]).is_err());
    }

    #[test]
    fn test_version_flag() {
        let err = Cli::try_parse_from(["roomscribe", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }
}
