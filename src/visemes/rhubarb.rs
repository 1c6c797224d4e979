//! Rhubarb Lip-Sync adapter.
//!
//! Runs the extractor as a child process with a fixed argument contract:
//! `-f json -r <recognizer> -o <output> <input>`. The process is spawned
//! directly from an argument vector, never through a shell.
//!
//! The `CommandRunner` trait keeps the adapter testable without the binary.

use crate::config::ExtractionConfig;
use crate::pipeline::error::StageError;
use crate::visemes::extractor::VisemeExtractor;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tracing::debug;

/// Captured result of a finished child process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Trait for running external programs.
///
/// Object-safe, Send + Sync for use from concurrent stage tasks.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` to completion and capture its output.
    async fn run(&self, program: &Path, args: &[String]) -> std::io::Result<CommandOutput>;
}

/// Production runner using `tokio::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioCommandRunner;

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, program: &Path, args: &[String]) -> std::io::Result<CommandOutput> {
        let output = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await?;
        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Platform executable name.
pub fn executable_name() -> &'static str {
    if cfg!(windows) { "rhubarb.exe" } else { "rhubarb" }
}

/// Viseme extractor backed by the Rhubarb Lip-Sync binary.
///
/// The binary is resolved once, at construction; extraction never scans
/// the filesystem for it.
pub struct RhubarbExtractor<R: CommandRunner = TokioCommandRunner> {
    resolved: Result<PathBuf, PathBuf>,
    recognizer: String,
    runner: R,
}

impl RhubarbExtractor<TokioCommandRunner> {
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::with_runner(config, TokioCommandRunner)
    }
}

impl<R: CommandRunner> RhubarbExtractor<R> {
    pub fn with_runner(config: &ExtractionConfig, runner: R) -> Self {
        Self {
            resolved: resolve(config.executable.as_deref(), &config.bin_dir),
            recognizer: config.recognizer.clone(),
            runner,
        }
    }

    /// The resolved extractor binary, or the path that was expected.
    pub fn locate(&self) -> Result<PathBuf, PathBuf> {
        self.resolved.clone()
    }

    /// Argument vector for one extraction.
    pub fn args(&self, audio: &Path, output: &Path) -> Vec<String> {
        vec![
            "-f".to_string(),
            "json".to_string(),
            "-r".to_string(),
            self.recognizer.clone(),
            "-o".to_string(),
            output.display().to_string(),
            audio.display().to_string(),
        ]
    }
}

/// Resolves the extractor binary. Called once per extractor.
///
/// Order: explicit path, `<bin_dir>/rhubarb`, then a `*rhubarb*`
/// subdirectory of `bin_dir` (release archives unpack into one).
/// On failure returns the path that was expected.
fn resolve(explicit: Option<&Path>, bin_dir: &Path) -> Result<PathBuf, PathBuf> {
    if let Some(explicit) = explicit {
        return if explicit.is_file() {
            Ok(explicit.to_path_buf())
        } else {
            Err(explicit.to_path_buf())
        };
    }

    let direct = bin_dir.join(executable_name());
    if direct.is_file() {
        return Ok(direct);
    }

    let nested = std::fs::read_dir(bin_dir).ok().and_then(|entries| {
        entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .to_lowercase()
                    .contains("rhubarb")
            })
            .map(|entry| entry.path().join(executable_name()))
            .find(|candidate| candidate.is_file())
    });

    nested.ok_or(direct)
}

#[async_trait]
impl<R: CommandRunner> VisemeExtractor for RhubarbExtractor<R> {
    async fn extract(&self, audio: &Path, output: &Path) -> Result<(), StageError> {
        let executable = match &self.resolved {
            Ok(path) => path,
            Err(expected) => {
                return Err(StageError::ExtractorNotFound {
                    path: expected.display().to_string(),
                });
            }
        };
        let args = self.args(audio, output);
        debug!(executable = %executable.display(), args = ?args, "running extractor");

        let started = Instant::now();
        let result = self.runner.run(executable, &args).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StageError::ExtractorNotFound {
                    path: executable.display().to_string(),
                }
            } else {
                StageError::ExtractionFailed {
                    message: format!("failed to spawn {}: {e}", executable.display()),
                }
            }
        })?;

        if !result.success {
            let stderr = result.stderr.trim();
            let message = if stderr.is_empty() {
                match result.code {
                    Some(code) => format!("process exited with code {code}"),
                    None => "process terminated by signal".to_string(),
                }
            } else {
                stderr.to_string()
            };
            return Err(StageError::ExtractionFailed { message });
        }

        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            return Err(StageError::ExtractionFailed {
                message: format!("no track written to {}", output.display()),
            });
        }

        debug!(
            audio = %audio.display(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "extraction done"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "rhubarb"
    }
}
