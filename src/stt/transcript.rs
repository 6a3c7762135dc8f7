use std::time::Duration;

use crate::audio::Utterance;

/// Sanitised text plus where it came from.
///
/// Built only from responses with `had_speech == true`; quiet utterances
/// are rejected before transcription, so a `Transcript` always cleared the
/// energy gate.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub text: String,
    /// First and last frame sequence number of the source utterance.
    pub frames: (u64, u64),
    pub duration: Duration,
    /// Peak amplitude of the utterance before normalisation.
    pub peak: f32,
}

impl Transcript {
    pub fn new(text: String, utterance: &Utterance, peak: f32) -> Self {
        Self {
            text,
            frames: utterance.seq_range(),
            duration: utterance.duration(),
            peak,
        }
    }
}
