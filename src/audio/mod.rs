//! Audio front-end and output.
//!
//! # Capture path
//!
//! ```text
//! Microphone → cpal callback → AudioChunk (mpsc) → downmix → StreamResampler (16 kHz)
//!           → FrameChunker (30 ms AudioFrame) → VoiceActivityGate → UtteranceSegmenter
//!           → AudioQuality → transcription
//! ```
//!
//! # Playback path
//!
//! ```text
//! synthesised PCM / Cue tones → PcmSink (CpalOutput) → speaker
//! ```

pub mod capture;
pub mod frame;
pub mod playback;
pub mod quality;
pub mod resample;
pub mod segment;
pub mod vad;

pub use capture::{AudioCapture, AudioChunk, CaptureError, StreamHandle};
pub use frame::{AudioFrame, FrameChunker};
pub use playback::{CpalOutput, Cue, OutputError, PcmSink};
pub use quality::{normalize_peak, peak, AudioError, AudioQuality};
pub use resample::{downmix, resample, upmix, StreamResampler};
pub use segment::{SegmenterConfig, Utterance, UtteranceSegmenter};
pub use vad::VoiceActivityGate;
