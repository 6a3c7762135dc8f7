//! Speech-to-text client.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │               TranscriptionClient (trait)                  │
//! │                                                            │
//! │  Utterance ─► AudioClip ─► HttpTranscriber                 │
//! │                             │  encode_wav (hound)          │
//! │                             │  POST multipart (reqwest)    │
//! │                             ▼                              │
//! │                     sanitize_transcript / is_noise         │
//! │                             │                              │
//! │                             ▼                              │
//! │                 TranscriptionResponse {text, had_speech}   │
//! └────────────────────────────────────────────────────────────┘
//! ```

pub mod engine;
pub mod sanitize;
pub mod transcript;

pub use engine::{
    encode_wav, AudioClip, HttpTranscriber, SttError, TranscriptionClient, TranscriptionResponse,
};
pub use sanitize::{is_noise, sanitize_transcript};
pub use transcript::Transcript;

#[cfg(test)]
pub use engine::MockTranscriber;
