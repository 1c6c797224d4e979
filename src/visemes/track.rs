//! Timed mouth-shape track produced by the viseme extractor.
//!
//! Mirrors the extractor's JSON export:
//! `{ "metadata": { "soundFile", "duration" }, "mouthCues": [{ "start", "end", "value" }] }`.

use serde::{Deserialize, Serialize};

/// Mouth shapes A–H plus X (idle/closed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouthShape {
    /// Closed mouth for P, B, M.
    A,
    /// Slightly open, clenched teeth (most consonants).
    B,
    /// Open mouth (EH, AE).
    C,
    /// Wide open (AA).
    D,
    /// Slightly rounded (AO, ER).
    E,
    /// Puckered (UW, OW, W).
    F,
    /// Upper teeth on lower lip (F, V).
    G,
    /// Tongue raised (long L).
    H,
    /// Idle / rest position.
    X,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackMetadata {
    pub sound_file: String,
    /// Audio duration in seconds.
    pub duration: f64,
}

/// One mouth shape held over `[start, end)` seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MouthCue {
    pub start: f64,
    pub end: f64,
    pub value: MouthShape,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisemeTrack {
    pub metadata: TrackMetadata,
    pub mouth_cues: Vec<MouthCue>,
}

impl VisemeTrack {
    /// Duration in seconds, falling back to the last cue end when metadata is zero.
    pub fn duration(&self) -> f64 {
        if self.metadata.duration > 0.0 {
            return self.metadata.duration;
        }
        self.mouth_cues.last().map(|cue| cue.end).unwrap_or(0.0)
    }

    /// Mouth shape active at `t` seconds; idle outside every cue.
    pub fn shape_at(&self, t: f64) -> MouthShape {
        self.mouth_cues
            .iter()
            .find(|cue| cue.start <= t && t < cue.end)
            .map(|cue| cue.value)
            .unwrap_or(MouthShape::X)
    }
}
