//! Viseme extraction: audio artifact → timed mouth-shape track.

pub mod extractor;
pub mod mock;
pub mod rhubarb;
pub mod track;

pub use extractor::VisemeExtractor;
pub use mock::MockExtractor;
pub use rhubarb::{CommandOutput, CommandRunner, RhubarbExtractor, TokioCommandRunner};
pub use track::{MouthCue, MouthShape, TrackMetadata, VisemeTrack};
