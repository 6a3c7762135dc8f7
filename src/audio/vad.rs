//! Energy + zero-crossing voice-activity gate.
//!
//! [`VoiceActivityGate::is_speech`] classifies a single frame; it keeps no
//! state between frames.  A frame is speech when
//!
//! * its RMS amplitude exceeds the configured threshold, and
//! * its zero-crossing rate stays below a ceiling.
//!
//! Voiced speech crosses zero far less often than hiss, fans or keyboard
//! clatter of the same loudness, so the ZCR ceiling rejects broadband noise
//! that the energy test alone would accept.

/// Stateless per-frame speech classifier.
///
/// ```rust
/// use voice_relay::audio::VoiceActivityGate;
///
/// let gate = VoiceActivityGate::new(0.01, 0.35);
/// let hum: Vec<f32> = (0..480)
///     .map(|i| 0.3 * (2.0 * std::f32::consts::PI * 200.0 * i as f32 / 16_000.0).sin())
///     .collect();
/// assert!(gate.is_speech(&hum));
/// assert!(!gate.is_speech(&[0.0; 480]));
/// ```
#[derive(Debug, Clone)]
pub struct VoiceActivityGate {
    rms_threshold: f32,
    max_zcr: f32,
}

impl VoiceActivityGate {
    pub fn new(rms_threshold: f32, max_zcr: f32) -> Self {
        Self { rms_threshold, max_zcr }
    }

    pub fn is_speech(&self, frame: &[f32]) -> bool {
        !frame.is_empty() && rms(frame) > self.rms_threshold && zero_crossing_rate(frame) < self.max_zcr
    }
}

/// Root-mean-square amplitude.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

/// Fraction of adjacent sample pairs whose signs differ.
pub fn zero_crossing_rate(samples: &[f32]) -> f32 {
    if samples.len() < 2 {
        return 0.0;
    }
    let crossings = samples
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    crossings as f32 / (samples.len() - 1) as f32
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
