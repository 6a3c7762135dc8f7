//! Hands-free voice front-end for text-based AI assistants.
//!
//! The crate listens to a continuously sampled microphone, detects a spoken
//! wake phrase, captures what the speaker says until they pause, transcribes
//! it through a local speech-to-text service and delivers the text into the
//! application window that is running the assistant.  Replies handed back by
//! the assistant are spoken through a local text-to-speech service, and the
//! speaker can interrupt, skip or redirect them by voice.
//!
//! # Module map
//!
//! | Module | Role |
//! |--------|------|
//! | [`audio`] | capture, framing, VAD gate, utterance segmentation, output |
//! | [`stt`] | transcription client and transcript sanitising |
//! | [`tts`] | speech synthesis client |
//! | [`keyword`] | wake / deactivation / control phrase matching |
//! | [`session`] | state machine, playback queue, echo suppression, runner |
//! | [`inject`] | injection target resolution and text injection |
//! | [`config`] | settings, immutable session snapshot, instance lock |

pub mod audio;
pub mod config;
pub mod health;
pub mod inject;
pub mod keyword;
pub mod lock;
pub mod session;
pub mod stt;
pub mod tts;
