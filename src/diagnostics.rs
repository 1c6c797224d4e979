//! System diagnostics for the `check` subcommand.
//!
//! Verifies the extractor binary, provider credentials and artifact directory.

use crate::config::Config;
use crate::tts::voices::find_speaker;
use crate::visemes::rhubarb::RhubarbExtractor;
use owo_colors::OwoColorize;
use std::path::Path;
use std::process::Command;

/// Result of a dependency check.
#[derive(Debug, PartialEq)]
pub enum CheckResult {
    /// Dependency is present and working
    Ok(String),
    /// Dependency is missing
    NotFound(String),
    /// Dependency is present but has issues
    Warning(String),
}

impl CheckResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, CheckResult::Ok(_))
    }
}

/// Locate the viseme extractor and confirm it runs.
pub fn check_extractor(config: &Config) -> CheckResult {
    let extractor = RhubarbExtractor::from_config(&config.extraction);
    let path = match extractor.locate() {
        Ok(path) => path,
        Err(expected) => {
            return CheckResult::NotFound(format!(
                "expected at {}\n\
                 Download Rhubarb Lip-Sync from https://github.com/DanielSWolf/rhubarb-lip-sync/releases\n\
                 and extract it into {}",
                expected.display(),
                config.extraction.bin_dir.display()
            ));
        }
    };

    match Command::new(&path).arg("--version").output() {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
            CheckResult::Ok(format!("{} ({})", path.display(), version))
        }
        Ok(_) => CheckResult::Warning(format!("{} found but --version failed", path.display())),
        Err(e) => CheckResult::Warning(format!("{} could not be run: {}", path.display(), e)),
    }
}

/// Confirm an API key is configured. The key itself is never printed.
pub fn check_credentials(config: &Config) -> CheckResult {
    match config.synthesis.api_key.as_deref() {
        Some(key) if !key.trim().is_empty() => {
            CheckResult::Ok(format!("API key set ({} chars)", key.trim().len()))
        }
        _ => CheckResult::NotFound(
            "no API key. Set LIPSYNTH_API_KEY or [synthesis].api_key, or run with --offline"
                .to_string(),
        ),
    }
}

/// Confirm the configured speaker is in the catalog.
pub fn check_speaker(config: &Config) -> CheckResult {
    match find_speaker(&config.synthesis.speaker) {
        Some(speaker) => CheckResult::Ok(format!("{} ({:?})", speaker.name, speaker.gender)),
        None => CheckResult::Warning(format!(
            "'{}' is not a known speaker; the provider may reject it",
            config.synthesis.speaker
        )),
    }
}

/// Confirm the artifact directory exists or can be created.
pub fn check_audio_dir(dir: &Path) -> CheckResult {
    match std::fs::create_dir_all(dir) {
        Ok(()) => match std::fs::metadata(dir) {
            Ok(meta) if meta.permissions().readonly() => {
                CheckResult::Warning(format!("{} is read-only", dir.display()))
            }
            Ok(_) => CheckResult::Ok(dir.display().to_string()),
            Err(e) => CheckResult::Warning(format!("{}: {}", dir.display(), e)),
        },
        Err(e) => CheckResult::NotFound(format!("cannot create {}: {}", dir.display(), e)),
    }
}

fn print_result(label: &str, result: &CheckResult) {
    print!("{label}: ");
    match result {
        CheckResult::Ok(detail) => println!("{} {}", "✓ OK".green(), detail),
        CheckResult::NotFound(detail) => {
            println!("{}", "✗ NOT FOUND".red());
            for line in detail.lines() {
                println!("  {line}");
            }
        }
        CheckResult::Warning(detail) => {
            println!("{}", "⚠ WARNING".yellow());
            for line in detail.lines() {
                println!("  {line}");
            }
        }
    }
}

/// Run all checks and print results. Returns true when the pipeline can run online.
pub fn check_dependencies(config: &Config) -> bool {
    println!("Checking lipsynth dependencies...\n");

    let extractor = check_extractor(config);
    print_result("Viseme extractor", &extractor);

    let credentials = check_credentials(config);
    print_result("Synthesis credentials", &credentials);

    print_result("Speaker", &check_speaker(config));
    let audio_dir = check_audio_dir(&config.storage.audio_dir);
    print_result("Artifact directory", &audio_dir);

    println!();
    let ready = extractor.is_ok() && credentials.is_ok() && !matches!(audio_dir, CheckResult::NotFound(_));
    if ready {
        println!("{}", "✓ Ready to synthesize and lip-sync.".green());
    } else if extractor.is_ok() {
        println!("⚠ Synthesis is not configured; `--offline` still produces silent tracks.");
    } else {
        println!("⚠ Lip sync will fail until the extractor is installed.");
    }
    ready
}
