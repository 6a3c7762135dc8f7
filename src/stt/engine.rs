//! Transcription client trait and the HTTP implementation.
//!
//! [`TranscriptionClient`] is the interface the session uses.  It is
//! object-safe and `Send + Sync` so it can be held behind an
//! `Arc<dyn TranscriptionClient>` and called from spawned tasks.
//!
//! [`HttpTranscriber`] talks to any OpenAI-compatible
//! `/v1/audio/transcriptions` endpoint (whisper.cpp server, faster-whisper,
//! speaches, …).  It uploads the utterance as a 16-bit mono WAV and returns
//! sanitised text.

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use super::sanitize::{is_noise, sanitize_transcript};
use crate::config::SessionSnapshot;
use crate::health::{wait_healthy, ServiceUnavailable};

// ---------------------------------------------------------------------------
// SttError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SttError {
    /// Connection refused, DNS failure, reset, …
    #[error("transcription service unreachable: {0}")]
    Unavailable(String),

    #[error("transcription request timed out")]
    Timeout,

    #[error("transcription service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed transcription response: {0}")]
    BadResponse(String),

    #[error("failed to encode audio: {0}")]
    Encode(String),
}

impl From<reqwest::Error> for SttError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SttError::Timeout
        } else if e.is_decode() {
            SttError::BadResponse(e.to_string())
        } else {
            SttError::Unavailable(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Request / response
// ---------------------------------------------------------------------------

/// Utterance audio as sent to the recogniser.
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Recogniser answer.  `had_speech == false` means the audio held nothing
/// worth acting on; `text` is then empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptionResponse {
    pub text: String,
    pub had_speech: bool,
}

impl TranscriptionResponse {
    pub fn speech(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            had_speech: true,
        }
    }

    pub fn silence() -> Self {
        Self {
            text: String::new(),
            had_speech: false,
        }
    }
}

// ---------------------------------------------------------------------------
// TranscriptionClient trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait TranscriptionClient: Send + Sync {
    async fn transcribe(&self, clip: &AudioClip) -> Result<TranscriptionResponse, SttError>;
}

// ---------------------------------------------------------------------------
// HttpTranscriber
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct TranscriptionBody {
    #[serde(default)]
    text: String,
}

pub struct HttpTranscriber {
    client: reqwest::Client,
    url: String,
    health_url: Option<String>,
    model: String,
    language: Option<String>,
    /// Normalised keyword phrases; text containing one is never noise.
    keywords: Vec<String>,
}

impl HttpTranscriber {
    /// Build from the session snapshot.  The HTTP client's own timeout is the
    /// session's transcription timeout, so a hung service fails the request
    /// rather than the whole utterance pipeline.
    pub fn from_snapshot(snapshot: &SessionSnapshot) -> Self {
        let client = reqwest::Client::builder()
            .timeout(snapshot.transcription_timeout())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            url: snapshot.stt.url.clone(),
            health_url: snapshot.stt.health_url.clone(),
            model: snapshot.stt.model.clone(),
            language: snapshot.stt.language.clone(),
            keywords: snapshot.keywords.all_phrases().map(str::to_string).collect(),
        }
    }

    /// Probe the health endpoint, retrying for a few seconds.
    pub async fn health_check(&self) -> Result<(), ServiceUnavailable> {
        match &self.health_url {
            Some(url) => wait_healthy(&self.client, "speech-to-text", url, 5, Duration::from_secs(1)).await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl TranscriptionClient for HttpTranscriber {
    async fn transcribe(&self, clip: &AudioClip) -> Result<TranscriptionResponse, SttError> {
        let wav = encode_wav(clip)?;

        let file = reqwest::multipart::Part::bytes(wav)
            .file_name("utterance.wav")
            .mime_str("audio/wav")
            .map_err(|e| SttError::Encode(e.to_string()))?;
        let mut form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("model", self.model.clone())
            .text("response_format", "json");
        if let Some(lang) = &self.language {
            form = form.text("language", lang.clone());
        }

        let response = self.client.post(&self.url).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SttError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: TranscriptionBody = response
            .json()
            .await
            .map_err(|e| SttError::BadResponse(e.to_string()))?;

        let text = sanitize_transcript(&body.text);
        if is_noise(&text, self.keywords.iter().map(String::as_str)) {
            log::debug!("stt: discarded noise {:?}", body.text);
            return Ok(TranscriptionResponse::silence());
        }
        log::debug!("stt: heard {text:?}");
        Ok(TranscriptionResponse::speech(text))
    }
}

/// Encode `clip` as 16-bit PCM WAV in memory.
pub fn encode_wav(clip: &AudioClip) -> Result<Vec<u8>, SttError> {
    let spec = hound::WavSpec {
        channels: clip.channels.max(1),
        sample_rate: clip.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::with_capacity(clip.samples.len() * 2 + 44));
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| SttError::Encode(e.to_string()))?;
        for &s in &clip.samples {
            let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer
                .write_sample(v)
                .map_err(|e| SttError::Encode(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| SttError::Encode(e.to_string()))?;
    }
    Ok(cursor.into_inner())
}

// ---------------------------------------------------------------------------
// MockTranscriber (tests)
// ---------------------------------------------------------------------------

/// Scripted transcriber: answers calls in order, each after an optional
/// delay.  Once the script runs out every call is silence.
#[cfg(test)]
pub struct MockTranscriber {
    script: std::sync::Mutex<std::collections::VecDeque<(Duration, Result<TranscriptionResponse, SttError>)>>,
    pub calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockTranscriber {
    pub fn new(script: Vec<(Duration, Result<TranscriptionResponse, SttError>)>) -> Self {
        Self {
            script: std::sync::Mutex::new(script.into()),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Immediate answers with the given texts.
    pub fn texts(texts: &[&str]) -> Self {
        Self::new(
            texts
                .iter()
                .map(|t| (Duration::ZERO, Ok(TranscriptionResponse::speech(*t))))
                .collect(),
        )
    }
}

#[cfg(test)]
#[async_trait]
impl TranscriptionClient for MockTranscriber {
    async fn transcribe(&self, _clip: &AudioClip) -> Result<TranscriptionResponse, SttError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some((delay, result)) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                result
            }
            None => Ok(TranscriptionResponse::silence()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn clip(len: usize) -> AudioClip {
        AudioClip {
            samples: vec![0.25; len],
            sample_rate: 16_000,
            channels: 1,
        }
    }

    #[test]
    fn wav_has_header_and_pcm16_body() {
        let bytes = encode_wav(&clip(1_600)).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(bytes.len(), 44 + 1_600 * 2);

        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.spec().sample_rate, 16_000);
        assert_eq!(reader.spec().bits_per_sample, 16);
    }

    #[test]
    fn wav_clamps_out_of_range_samples() {
        let loud = AudioClip {
            samples: vec![2.0, -2.0],
            sample_rate: 16_000,
            channels: 1,
        };
        let bytes = encode_wav(&loud).unwrap();
        let mut reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        let samples: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
        assert_eq!(samples, vec![i16::MAX, -i16::MAX]);
    }

    #[test]
    fn client_is_object_safe() {
        let snapshot = AppConfig::default().validate().unwrap();
        let client: Box<dyn TranscriptionClient> = Box::new(HttpTranscriber::from_snapshot(&snapshot));
        drop(client);
    }

    #[tokio::test]
    async fn unreachable_service_is_unavailable() {
        let mut cfg = AppConfig::default();
        cfg.stt.url = "http://127.0.0.1:9/v1/audio/transcriptions".into();
        let snapshot = cfg.validate().unwrap();
        let err = HttpTranscriber::from_snapshot(&snapshot)
            .transcribe(&clip(4_800))
            .await
            .unwrap_err();
        assert!(matches!(err, SttError::Unavailable(_) | SttError::Timeout), "{err}");
    }

    #[tokio::test]
    async fn mock_follows_script_then_goes_silent() {
        let mock = MockTranscriber::texts(&["hello"]);
        assert_eq!(mock.transcribe(&clip(10)).await.unwrap().text, "hello");
        assert!(!mock.transcribe(&clip(10)).await.unwrap().had_speech);
        assert_eq!(mock.calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
