use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use lipsynth::cli::{Cli, Commands, ConfigAction, PipelineArgs};
use lipsynth::config::Config;
use lipsynth::diagnostics::check_dependencies;
use lipsynth::pipeline::{JsonLinesSink, Pipeline, PipelineConfig, Turn};
use lipsynth::store::ArtifactStore;
use lipsynth::tts::{SPEAKERS, SilentSynthesizer, SpeechSynthesizer, VoiceConfig};
use lipsynth::visemes::RhubarbExtractor;
use owo_colors::OwoColorize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    match cli.command {
        Commands::Run { input, pipeline } => {
            let config = apply_overrides(load_config(cli.config.as_deref())?, &pipeline);
            let messages = read_turn(input.as_deref())?;
            let pipeline = build_pipeline(&config, pipeline.offline)?;

            let messages = pipeline.run_all(messages).await;
            println!("{}", serde_json::to_string(&Turn { messages })?);
        }
        Commands::Stream {
            input,
            sse,
            pipeline,
        } => {
            let config = apply_overrides(load_config(cli.config.as_deref())?, &pipeline);
            let messages = read_turn(input.as_deref())?;
            let pipeline = build_pipeline(&config, pipeline.offline)?;

            let mut sink = JsonLinesSink::new(std::io::stdout()).sse(sse);
            pipeline.drive(messages, &mut sink).await?;
        }
        Commands::Voices => list_voices()?,
        Commands::Check => {
            let config = load_config(cli.config.as_deref())?;
            if !check_dependencies(&config) {
                std::process::exit(1);
            }
        }
        Commands::Config { action } => {
            handle_config_command(action, cli.config.as_deref())?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "lipsynth",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

/// Logs go to stderr so stdout stays a clean JSON stream.
/// `RUST_LOG` takes precedence over `-q`/`-v`.
fn init_logging(quiet: bool, verbose: u8) {
    let default_level = match (quiet, verbose) {
        (true, _) => "lipsynth=warn",
        (false, 0) => "lipsynth=info",
        (false, 1) => "lipsynth=debug",
        (false, _) => "lipsynth=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = match custom_path {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::load_or_default(&Config::default_path())?,
    };
    Ok(config.with_env_overrides())
}

/// Command-line flags win over file and environment.
fn apply_overrides(mut config: Config, args: &PipelineArgs) -> Config {
    if let Some(speaker) = &args.speaker {
        config.synthesis.speaker = speaker.to_lowercase();
    }
    if let Some(language) = &args.language {
        config.synthesis.language = language.clone();
    }
    if let Some(dir) = &args.audio_dir {
        config.storage.audio_dir = dir.clone();
    }
    if let Some(attempts) = args.max_attempts {
        config.pipeline.max_attempts = attempts;
    }
    if let Some(delay) = args.retry_delay {
        config.pipeline.retry_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
    }
    if let Some(concurrency) = args.concurrency {
        config.pipeline.synthesis_concurrency = concurrency;
    }
    config
}

fn build_pipeline(config: &Config, offline: bool) -> Result<Pipeline> {
    let synthesizer = build_synthesizer(config, offline);
    let extractor = RhubarbExtractor::from_config(&config.extraction);
    if let Err(expected) = extractor.locate() {
        warn!(
            expected = %expected.display(),
            "viseme extractor not found, messages will carry audio only (see `lipsynth check`)"
        );
    }

    std::fs::create_dir_all(&config.storage.audio_dir).with_context(|| {
        format!(
            "failed to create artifact directory {}",
            config.storage.audio_dir.display()
        )
    })?;

    info!(
        synthesizer = synthesizer.name(),
        speaker = %config.synthesis.speaker,
        audio_dir = %config.storage.audio_dir.display(),
        "pipeline ready"
    );

    Ok(Pipeline::new(
        PipelineConfig::from_config(&config.pipeline),
        synthesizer,
        Arc::new(extractor),
        ArtifactStore::new(config.storage.audio_dir.clone()),
    )
    .with_voice(VoiceConfig::from(&config.synthesis)))
}

#[cfg(feature = "http")]
fn build_synthesizer(config: &Config, offline: bool) -> Arc<dyn SpeechSynthesizer> {
    if offline {
        return Arc::new(SilentSynthesizer::new());
    }
    let http = lipsynth::tts::HttpSynthesizer::from_config(&config.synthesis);
    if !http.has_api_key() {
        warn!("no API key configured; synthesis will fail (use --offline for silent audio)");
    }
    Arc::new(http)
}

#[cfg(not(feature = "http"))]
fn build_synthesizer(_config: &Config, offline: bool) -> Arc<dyn SpeechSynthesizer> {
    if !offline {
        warn!("built without the `http` feature, using the silent synthesizer");
    }
    Arc::new(SilentSynthesizer::new())
}

/// Reads a turn from `input`, or stdin when absent.
fn read_turn(input: Option<&Path>) -> Result<Vec<lipsynth::Message>> {
    let text = match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read turn from stdin")?;
            buf
        }
    };
    Ok(Turn::parse(&text)?)
}

fn list_voices() -> Result<()> {
    println!("{}", serde_json::to_string_pretty(SPEAKERS)?);
    Ok(())
}

fn handle_config_command(action: ConfigAction, custom_path: Option<&Path>) -> Result<()> {
    let config_path = custom_path
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path);

    match action {
        ConfigAction::Show => {
            let config = load_config(custom_path)?;
            print!("{}", toml::to_string_pretty(&config.redacted())?);
        }
        ConfigAction::Path => {
            println!("{}", config_path.display());
            if !config_path.exists() {
                eprintln!("{}", "(file does not exist, defaults in use)".dimmed());
            }
        }
    }
    Ok(())
}
