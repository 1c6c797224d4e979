use crate::pipeline::error::StageError;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Trait for viseme extraction tools.
///
/// Reads the audio at `audio` and writes a JSON [`VisemeTrack`] to `output`.
/// A missing output file after `Ok` is treated as a failure by the caller.
///
/// [`VisemeTrack`]: crate::visemes::track::VisemeTrack
#[async_trait]
pub trait VisemeExtractor: Send + Sync {
    async fn extract(&self, audio: &Path, output: &Path) -> Result<(), StageError>;

    /// Tool name for logging.
    fn name(&self) -> &str;
}

#[async_trait]
impl<T: VisemeExtractor + ?Sized> VisemeExtractor for Arc<T> {
    async fn extract(&self, audio: &Path, output: &Path) -> Result<(), StageError> {
        (**self).extract(audio, output).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
