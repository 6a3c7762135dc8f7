//! OpenAI-compatible `/v1/audio/speech` client (Kokoro-FastAPI and friends).
//!
//! The request asks for raw 16-bit little-endian PCM, streamed.  Network
//! chunks do not respect sample boundaries, so [`PcmDecoder`] carries an odd
//! trailing byte over to the next chunk.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};

use super::{PcmStream, SpeechSynthesizer, TtsError};
use crate::config::SessionSnapshot;
use crate::health::{wait_healthy, ServiceUnavailable};

// ---------------------------------------------------------------------------
// PcmDecoder
// ---------------------------------------------------------------------------

/// Incremental i16 LE → f32 decoder.
#[derive(Debug, Default)]
pub struct PcmDecoder {
    carry: Option<u8>,
}

impl PcmDecoder {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<f32> {
        let mut buf: Vec<u8> = Vec::with_capacity(bytes.len() + 1);
        if let Some(b) = self.carry.take() {
            buf.push(b);
        }
        buf.extend_from_slice(bytes);

        if buf.len() % 2 == 1 {
            self.carry = buf.pop();
        }
        buf.chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32_768.0)
            .collect()
    }
}

/// Turn a response body into a [`PcmStream`], skipping empty chunks.
fn decode_body<S>(body: S) -> PcmStream
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
{
    let stream = futures_util::stream::unfold(
        (Box::pin(body), PcmDecoder::default()),
        |(mut body, mut decoder)| async move {
            loop {
                match body.next().await? {
                    Ok(bytes) => {
                        let samples = decoder.push(&bytes);
                        if !samples.is_empty() {
                            return Some((Ok(samples), (body, decoder)));
                        }
                    }
                    Err(e) => return Some((Err(TtsError::Stream(e.to_string())), (body, decoder))),
                }
            }
        },
    );
    Box::pin(stream)
}

// ---------------------------------------------------------------------------
// HttpSynthesizer
// ---------------------------------------------------------------------------

pub struct HttpSynthesizer {
    client: reqwest::Client,
    url: String,
    health_url: Option<String>,
    model: String,
    voice: String,
    speed: f32,
    sample_rate: u32,
}

impl HttpSynthesizer {
    pub fn from_snapshot(snapshot: &SessionSnapshot) -> Self {
        // Only the connection is bounded; a long reply may stream for minutes.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            url: snapshot.tts.url.clone(),
            health_url: snapshot.tts.health_url.clone(),
            model: snapshot.tts.model.clone(),
            voice: snapshot.voice.clone(),
            speed: snapshot.tts.speed,
            sample_rate: snapshot.tts.sample_rate,
        }
    }

    pub async fn health_check(&self) -> Result<(), ServiceUnavailable> {
        match &self.health_url {
            Some(url) => wait_healthy(&self.client, "text-to-speech", url, 5, Duration::from_secs(1)).await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<PcmStream, TtsError> {
        let body = serde_json::json!({
            "model":           self.model,
            "input":           text,
            "voice":           self.voice,
            "speed":           self.speed,
            "response_format": "pcm",
            "stream":          true
        });

        let response = self.client.post(&self.url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TtsError::Status {
                status: status.as_u16(),
                body,
            });
        }

        log::debug!("tts: streaming {} chars with voice {}", text.len(), self.voice);
        Ok(decode_body(response.bytes_stream()))
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn decoder_converts_little_endian() {
        let mut d = PcmDecoder::default();
        let out = d.push(&[0x00, 0x40, 0x00, 0xC0]);
        assert_eq!(out, vec![0.5, -0.5]);
    }

    #[test]
    fn decoder_carries_odd_byte() {
        let mut d = PcmDecoder::default();
        assert!(d.push(&[0x00]).is_empty());
        assert_eq!(d.push(&[0x40, 0xFF]), vec![0.5]);
        assert_eq!(d.push(&[0x7F]), vec![32_767.0 / 32_768.0]);
    }

    #[tokio::test]
    async fn body_stream_skips_empty_chunks() {
        let chunks: Vec<Result<Bytes, reqwest::Error>> = vec![
            Ok(Bytes::from_static(&[0x00])),
            Ok(Bytes::from_static(&[0x40])),
            Ok(Bytes::new()),
            Ok(Bytes::from_static(&[0x00, 0xC0])),
        ];
        let stream = decode_body(futures_util::stream::iter(chunks));
        let out: Vec<Vec<f32>> = stream.map(Result::unwrap).collect().await;
        assert_eq!(out, vec![vec![0.5], vec![-0.5]]);
    }

    #[test]
    fn synthesizer_uses_profile_voice() {
        let snapshot = AppConfig::default().validate().unwrap();
        let synth = HttpSynthesizer::from_snapshot(&snapshot);
        assert_eq!(synth.voice, "af_aoede");
        assert_eq!(synth.sample_rate(), 24_000);
    }

    #[tokio::test]
    async fn unreachable_service_errors() {
        let mut cfg = AppConfig::default();
        cfg.tts.url = "http://127.0.0.1:9/v1/audio/speech".into();
        let snapshot = cfg.validate().unwrap();
        let result = HttpSynthesizer::from_snapshot(&snapshot).synthesize("hello").await;
        assert!(matches!(result, Err(TtsError::Request(_)) | Err(TtsError::Timeout)));
    }
}
