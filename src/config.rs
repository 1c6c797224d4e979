use crate::defaults;
use crate::error::{LipsynthError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineSection,
    pub synthesis: SynthesisConfig,
    pub extraction: ExtractionConfig,
    pub storage: StorageConfig,
}

/// Orchestration limits: retries, concurrency, pacing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineSection {
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub synthesis_concurrency: usize,
    pub batch_pacing_ms: u64,
}

/// Speech-synthesis provider configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SynthesisConfig {
    pub api_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub speaker: String,
    pub language: String,
    pub model: String,
    pub pitch: f32,
    pub pace: f32,
    pub loudness: f32,
    pub sample_rate: u32,
    pub enable_preprocessing: bool,
    pub codec: String,
}

/// Viseme extractor configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Explicit extractor path; skips the `bin_dir` search when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable: Option<PathBuf>,
    pub bin_dir: PathBuf,
    pub recognizer: String,
}

/// Artifact storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub audio_dir: PathBuf,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            max_attempts: defaults::MAX_ATTEMPTS,
            retry_delay_ms: defaults::RETRY_DELAY_MS,
            synthesis_concurrency: defaults::SYNTHESIS_CONCURRENCY,
            batch_pacing_ms: defaults::BATCH_PACING_MS,
        }
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            api_url: defaults::SYNTHESIS_API_URL.to_string(),
            api_key: None,
            speaker: defaults::SPEAKER.to_string(),
            language: defaults::LANGUAGE.to_string(),
            model: defaults::SYNTHESIS_MODEL.to_string(),
            pitch: 0.0,
            pace: 1.0,
            loudness: 1.0,
            sample_rate: defaults::SAMPLE_RATE,
            enable_preprocessing: true,
            codec: defaults::AUDIO_CODEC.to_string(),
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            executable: None,
            bin_dir: PathBuf::from(defaults::EXTRACTOR_BIN_DIR),
            recognizer: defaults::RECOGNIZER.to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            audio_dir: PathBuf::from(defaults::AUDIO_DIR),
        }
    }
}

/// Returns the first non-empty value among `keys`.
fn first_env(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| std::env::var(key).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values. Invalid TOML is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LipsynthError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                LipsynthError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file doesn't exist
    ///
    /// Only a missing file falls back to defaults; parse errors propagate.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(LipsynthError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.max_attempts == 0 {
            return Err(LipsynthError::ConfigInvalidValue {
                key: "pipeline.max_attempts".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.pipeline.synthesis_concurrency == 0 {
            return Err(LipsynthError::ConfigInvalidValue {
                key: "pipeline.synthesis_concurrency".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.synthesis.sample_rate == 0 {
            return Err(LipsynthError::ConfigInvalidValue {
                key: "synthesis.sample_rate".to_string(),
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - LIPSYNTH_API_KEY (or SARVAM_API_KEY) → synthesis.api_key
    /// - LIPSYNTH_SPEAKER (or SARVAM_SPEAKER) → synthesis.speaker
    /// - LIPSYNTH_LANGUAGE (or SARVAM_LANGUAGE) → synthesis.language
    /// - LIPSYNTH_AUDIO_DIR → storage.audio_dir
    /// - LIPSYNTH_RHUBARB → extraction.executable
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(key) = first_env(&["LIPSYNTH_API_KEY", "SARVAM_API_KEY"]) {
            self.synthesis.api_key = Some(key);
        }

        if let Some(speaker) = first_env(&["LIPSYNTH_SPEAKER", "SARVAM_SPEAKER"]) {
            self.synthesis.speaker = speaker.to_lowercase();
        }

        if let Some(language) = first_env(&["LIPSYNTH_LANGUAGE", "SARVAM_LANGUAGE"]) {
            self.synthesis.language = language;
        }

        if let Some(dir) = first_env(&["LIPSYNTH_AUDIO_DIR"]) {
            self.storage.audio_dir = PathBuf::from(dir);
        }

        if let Some(executable) = first_env(&["LIPSYNTH_RHUBARB"]) {
            self.extraction.executable = Some(PathBuf::from(executable));
        }

        self
    }

    /// Copy with the API key masked, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.synthesis.api_key.is_some() {
            copy.synthesis.api_key = Some("********".to_string());
        }
        copy
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/lipsynth/config.toml on Linux, or a path relative to
    /// the working directory when no config directory is known.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lipsynth")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // SAFETY: These helpers are only used in tests with ENV_LOCK held,
    // ensuring no concurrent access to environment variables.
    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    fn clear_lipsynth_env() {
        for key in [
            "LIPSYNTH_API_KEY",
            "SARVAM_API_KEY",
            "LIPSYNTH_SPEAKER",
            "SARVAM_SPEAKER",
            "LIPSYNTH_LANGUAGE",
            "SARVAM_LANGUAGE",
            "LIPSYNTH_AUDIO_DIR",
            "LIPSYNTH_RHUBARB",
        ] {
            remove_env(key);
        }
    }

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config_has_correct_values() {
        let config = Config::default();

        assert_eq!(config.pipeline.max_attempts, 10);
        assert_eq!(config.pipeline.retry_delay_ms, 2000);
        assert_eq!(config.pipeline.synthesis_concurrency, 2);
        assert_eq!(config.pipeline.batch_pacing_ms, 100);

        assert_eq!(config.synthesis.speaker, "anushka");
        assert_eq!(config.synthesis.model, "bulbul:v2");
        assert_eq!(config.synthesis.sample_rate, 22050);
        assert_eq!(config.synthesis.api_key, None);

        assert_eq!(config.extraction.executable, None);
        assert_eq!(config.extraction.bin_dir, PathBuf::from("bin"));
        assert_eq!(config.extraction.recognizer, "pocketSphinx");

        assert_eq!(config.storage.audio_dir, PathBuf::from("audios"));
    }

    #[test]
    fn test_load_from_toml_file() {
        let file = write_config(
            r#"
            [pipeline]
            max_attempts = 3
            retry_delay_ms = 50
            synthesis_concurrency = 4

            [synthesis]
            speaker = "karun"
            language = "en-IN"
            pace = 1.2

            [extraction]
            executable = "/opt/rhubarb/rhubarb"

            [storage]
            audio_dir = "/tmp/artifacts"
            "#,
        );

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.pipeline.max_attempts, 3);
        assert_eq!(config.pipeline.retry_delay_ms, 50);
        assert_eq!(config.pipeline.synthesis_concurrency, 4);
        assert_eq!(config.pipeline.batch_pacing_ms, 100);
        assert_eq!(config.synthesis.speaker, "karun");
        assert_eq!(config.synthesis.language, "en-IN");
        assert_eq!(config.synthesis.pace, 1.2);
        assert_eq!(
            config.extraction.executable,
            Some(PathBuf::from("/opt/rhubarb/rhubarb"))
        );
        assert_eq!(config.storage.audio_dir, PathBuf::from("/tmp/artifacts"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let file = write_config("[synthesis]\nspeaker = \"vidya\"\n");
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.synthesis.speaker, "vidya");
        assert_eq!(config.pipeline, PipelineSection::default());
        assert_eq!(config.storage, StorageConfig::default());
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let file = write_config("[pipeline\nmax_attempts = ");
        assert!(matches!(
            Config::load(file.path()),
            Err(LipsynthError::Config(_))
        ));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let file = write_config("[pipeline]\nsynthesis_concurrency = 0\n");
        let error = Config::load(file.path()).unwrap_err();
        assert!(error.to_string().contains("pipeline.synthesis_concurrency"));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let file = write_config("[pipeline]\nmax_attempts = 0\n");
        let error = Config::load(file.path()).unwrap_err();
        assert!(error.to_string().contains("pipeline.max_attempts"));
    }

    #[test]
    fn test_load_missing_file_is_not_found() {
        let result = Config::load(Path::new("/nonexistent/lipsynth/config.toml"));
        assert!(matches!(
            result,
            Err(LipsynthError::ConfigFileNotFound { .. })
        ));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = Config::load_or_default(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_or_default_propagates_parse_error() {
        let file = write_config("not = [valid");
        assert!(Config::load_or_default(file.path()).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_lipsynth_env();

        set_env("LIPSYNTH_API_KEY", "  secret-key \n");
        set_env("LIPSYNTH_SPEAKER", "Hitesh");
        set_env("LIPSYNTH_LANGUAGE", "ta-IN");
        set_env("LIPSYNTH_AUDIO_DIR", "/var/lib/lipsynth");
        set_env("LIPSYNTH_RHUBARB", "/usr/local/bin/rhubarb");

        let config = Config::default().with_env_overrides();
        clear_lipsynth_env();

        assert_eq!(config.synthesis.api_key.as_deref(), Some("secret-key"));
        assert_eq!(config.synthesis.speaker, "hitesh");
        assert_eq!(config.synthesis.language, "ta-IN");
        assert_eq!(config.storage.audio_dir, PathBuf::from("/var/lib/lipsynth"));
        assert_eq!(
            config.extraction.executable,
            Some(PathBuf::from("/usr/local/bin/rhubarb"))
        );
    }

    #[test]
    fn test_env_fallback_names() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_lipsynth_env();

        set_env("SARVAM_API_KEY", "legacy");
        set_env("SARVAM_SPEAKER", "ARYA");

        let config = Config::default().with_env_overrides();
        clear_lipsynth_env();

        assert_eq!(config.synthesis.api_key.as_deref(), Some("legacy"));
        assert_eq!(config.synthesis.speaker, "arya");
    }

    #[test]
    fn test_primary_env_wins_over_fallback() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_lipsynth_env();

        set_env("LIPSYNTH_API_KEY", "primary");
        set_env("SARVAM_API_KEY", "legacy");

        let config = Config::default().with_env_overrides();
        clear_lipsynth_env();

        assert_eq!(config.synthesis.api_key.as_deref(), Some("primary"));
    }

    #[test]
    fn test_empty_env_ignored() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_lipsynth_env();

        set_env("LIPSYNTH_SPEAKER", "");
        set_env("LIPSYNTH_API_KEY", "   ");

        let config = Config::default().with_env_overrides();
        clear_lipsynth_env();

        assert_eq!(config.synthesis.speaker, "anushka");
        assert_eq!(config.synthesis.api_key, None);
    }

    #[test]
    fn test_redacted_masks_api_key() {
        let mut config = Config::default();
        config.synthesis.api_key = Some("secret".to_string());
        let shown = toml::to_string(&config.redacted()).unwrap();
        assert!(!shown.contains("secret"));
        assert!(shown.contains("********"));
    }

    #[test]
    fn test_default_path_ends_with_lipsynth_config() {
        let path = Config::default_path();
        assert!(path.ends_with("lipsynth/config.toml"));
    }
}
