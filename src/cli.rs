//! Command-line interface for lipsynth
//!
//! Provides argument parsing using clap derive macros.

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;

/// Speech synthesis and lip-sync tracks for talking avatars
#[derive(Parser, Debug)]
#[command(
    name = "lipsynth",
    version,
    about = "Speech synthesis and lip-sync tracks for talking avatars"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose logging (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Overrides shared by `run` and `stream`.
#[derive(Args, Debug, Default, Clone, PartialEq)]
pub struct PipelineArgs {
    /// Use the built-in silent synthesizer instead of the HTTP provider
    #[arg(long)]
    pub offline: bool,

    /// Speaker id (see `lipsynth voices`)
    #[arg(long, value_name = "ID")]
    pub speaker: Option<String>,

    /// Target language code (e.g., hi-IN, en-IN)
    #[arg(long, value_name = "LANG")]
    pub language: Option<String>,

    /// Directory for audio and track artifacts
    #[arg(long, value_name = "DIR")]
    pub audio_dir: Option<PathBuf>,

    /// Attempts per synthesis call
    #[arg(long, value_name = "N")]
    pub max_attempts: Option<u32>,

    /// Backoff base delay. Examples: 500ms, 2s. Bare numbers are milliseconds
    #[arg(long, value_name = "DURATION", value_parser = parse_delay)]
    pub retry_delay: Option<Duration>,

    /// Concurrent synthesis calls in batch mode
    #[arg(long, value_name = "K")]
    pub concurrency: Option<usize>,
}

/// Parse a delay string into a duration.
///
/// Supports any format accepted by `humantime` (`500ms`, `2s`, `1m30s`);
/// bare numbers are milliseconds.
fn parse_delay(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if let Ok(millis) = s.parse::<u64>() {
        return Ok(Duration::from_millis(millis));
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Enrich a turn in batch mode and print it whole
    Run {
        /// JSON input file (`{"messages": [...]}` or an array); stdin when omitted
        #[arg(value_name = "INPUT")]
        input: Option<PathBuf>,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Enrich a turn progressively, printing one frame per message
    Stream {
        /// JSON input file (`{"messages": [...]}` or an array); stdin when omitted
        #[arg(value_name = "INPUT")]
        input: Option<PathBuf>,

        /// Frame output as Server-Sent Events (`data: ...`)
        #[arg(long)]
        sse: bool,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// List available speakers
    Voices,

    /// Check extractor binary, credentials and artifact directory
    Check,

    /// View configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug, PartialEq)]
pub enum ConfigAction {
    /// Print the effective configuration (API key masked)
    Show,
    /// Print the configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_defaults() {
        let cli = Cli::try_parse_from(["lipsynth", "run"]).unwrap();
        match cli.command {
            Commands::Run { input, pipeline } => {
                assert!(input.is_none());
                assert_eq!(pipeline, PipelineArgs::default());
            }
            other => panic!("Expected Run command, got {other:?}"),
        }
        assert!(!cli.quiet);
        assert_eq!(cli.verbose, 0);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_parse_stream_with_options() {
        let cli = Cli::try_parse_from([
            "lipsynth",
            "stream",
            "turn.json",
            "--sse",
            "--offline",
            "--speaker",
            "karun",
            "--retry-delay",
            "1s",
            "--max-attempts",
            "3",
        ])
        .unwrap();

        match cli.command {
            Commands::Stream {
                input,
                sse,
                pipeline,
            } => {
                assert_eq!(input, Some(PathBuf::from("turn.json")));
                assert!(sse);
                assert!(pipeline.offline);
                assert_eq!(pipeline.speaker.as_deref(), Some("karun"));
                assert_eq!(pipeline.retry_delay, Some(Duration::from_secs(1)));
                assert_eq!(pipeline.max_attempts, Some(3));
            }
            other => panic!("Expected Stream command, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_delay_formats() {
        assert_eq!(parse_delay("250"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_delay("500ms"), Ok(Duration::from_millis(500)));
        assert_eq!(parse_delay(" 2s "), Ok(Duration::from_secs(2)));
        assert_eq!(parse_delay("1m30s"), Ok(Duration::from_secs(90)));
        assert!(parse_delay("soon").is_err());
    }

    #[test]
    fn test_parse_verbose_double() {
        let cli = Cli::try_parse_from(["lipsynth", "-vv", "voices"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_global_options_after_command() {
        let cli = Cli::try_parse_from(["lipsynth", "check", "--config", "/tmp/config.toml", "-q"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/config.toml")));
        assert!(cli.quiet);
        assert!(matches!(cli.command, Commands::Check));
    }

    #[test]
    fn test_parse_config_actions() {
        let cli = Cli::try_parse_from(["lipsynth", "config", "path"]).unwrap();
        match cli.command {
            Commands::Config { action } => assert_eq!(action, ConfigAction::Path),
            other => panic!("Expected Config command, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_command_is_error() {
        assert!(Cli::try_parse_from(["lipsynth"]).is_err());
    }

    #[test]
    fn test_invalid_command_returns_error() {
        let err = Cli::try_parse_from(["lipsynth", "invalid"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidSubcommand);
    }

    #[test]
    fn test_version_flag() {
        let err = Cli::try_parse_from(["lipsynth", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }
}
