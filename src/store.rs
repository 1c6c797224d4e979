//! File-backed artifact slots, one per utterance index.
//!
//! Slot `i` holds `message_{i}.wav` (synthesized audio) and, after extraction,
//! `message_{i}.json` (viseme track sidecar). Only existence is checked;
//! contents are not validated.

use crate::error::{LipsynthError, Result};
use crate::visemes::track::VisemeTrack;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Creates a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn audio_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("message_{index}.wav"))
    }

    pub fn track_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("message_{index}.json"))
    }

    /// Writes raw audio into slot `index`, replacing any previous artifact.
    pub async fn write_audio(&self, index: usize, audio: &[u8]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.audio_path(index);
        tokio::fs::write(&path, audio).await?;
        Ok(path)
    }

    pub async fn audio_exists(&self, index: usize) -> bool {
        tokio::fs::try_exists(self.audio_path(index))
            .await
            .unwrap_or(false)
    }

    pub async fn track_exists(&self, index: usize) -> bool {
        tokio::fs::try_exists(self.track_path(index))
            .await
            .unwrap_or(false)
    }

    /// Reads the audio artifact back as bytes.
    pub async fn read_audio(&self, index: usize) -> Result<Vec<u8>> {
        let path = self.audio_path(index);
        tokio::fs::read(&path).await.map_err(|e| not_found_or_io(&path, e))
    }

    /// Reads and parses the viseme track sidecar.
    pub async fn read_track(&self, index: usize) -> Result<VisemeTrack> {
        let path = self.track_path(index);
        let data = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| not_found_or_io(&path, e))?;
        serde_json::from_str(&data).map_err(|e| LipsynthError::TrackParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Removes both artifacts of slot `index`; missing files are not an error.
    pub async fn clear(&self, index: usize) -> Result<()> {
        for path in [self.audio_path(index), self.track_path(index)] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

fn not_found_or_io(path: &Path, e: std::io::Error) -> LipsynthError {
    if e.kind() == std::io::ErrorKind::NotFound {
        LipsynthError::ArtifactNotFound {
            path: path.display().to_string(),
        }
    } else {
        LipsynthError::Io(e)
    }
}
