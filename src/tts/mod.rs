//! Speech synthesis client.
//!
//! [`SpeechSynthesizer::synthesize`] returns a [`PcmStream`]: a lazy, finite,
//! non-restartable sequence of mono `f32` chunks at
//! [`SpeechSynthesizer::sample_rate`].  The playback worker pulls chunks as
//! it writes them to the output device and simply drops the stream to
//! abandon the rest of a reply.

pub mod http;

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use thiserror::Error;

pub use http::{HttpSynthesizer, PcmDecoder};

#[derive(Debug, Error)]
pub enum TtsError {
    #[error("speech service request failed: {0}")]
    Request(String),

    #[error("speech service timed out")]
    Timeout,

    #[error("speech service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("speech stream broke off: {0}")]
    Stream(String),
}

impl From<reqwest::Error> for TtsError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TtsError::Timeout
        } else {
            TtsError::Request(e.to_string())
        }
    }
}

/// Ready-to-play mono PCM chunks.
pub type PcmStream = Pin<Box<dyn Stream<Item = Result<Vec<f32>, TtsError>> + Send>>;

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Start synthesising `text`.  Resolves once the service has accepted
    /// the request; audio then arrives through the stream.
    async fn synthesize(&self, text: &str) -> Result<PcmStream, TtsError>;

    /// Sample rate of the produced chunks.
    fn sample_rate(&self) -> u32;
}

// ---------------------------------------------------------------------------
// MockSynthesizer (tests)
// ---------------------------------------------------------------------------

/// Produces `chunks` chunks of `chunk_len` samples per request, each after
/// `delay`, and records every requested text.
#[cfg(test)]
pub struct MockSynthesizer {
    pub chunks: usize,
    pub chunk_len: usize,
    pub delay: std::time::Duration,
    pub requests: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl MockSynthesizer {
    pub fn new(chunks: usize, delay: std::time::Duration) -> Self {
        Self {
            chunks,
            chunk_len: 240,
            delay,
            requests: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl SpeechSynthesizer for MockSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<PcmStream, TtsError> {
        self.requests.lock().unwrap().push(text.to_string());
        let delay = self.delay;
        let chunk_len = self.chunk_len;
        let stream = futures_util::stream::unfold(self.chunks, move |left| async move {
            if left == 0 {
                return None;
            }
            tokio::time::sleep(delay).await;
            Some((Ok(vec![0.1_f32; chunk_len]), left - 1))
        });
        Ok(Box::pin(stream))
    }

    fn sample_rate(&self) -> u32 {
        24_000
    }
}
