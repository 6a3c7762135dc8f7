//! Pre-transcription utterance checks and level normalisation.
//!
//! | Check    | Rejects                                           |
//! |----------|---------------------------------------------------|
//! | Duration | utterances shorter than `min_duration` (coughs)   |
//! | Energy   | utterances whose peak never reaches `min_peak`    |
//!
//! A rejected utterance is a "no speech" result: it never reaches the
//! transcription service and does not change the session state.
//!
//! ```rust
//! use std::time::Duration;
//! use voice_relay::audio::{AudioError, AudioQuality};
//!
//! let gate = AudioQuality::new(Duration::from_millis(300), 0.05);
//! assert!(gate.check(&vec![0.2_f32; 8_000], 16_000).is_ok());
//! assert!(matches!(
//!     gate.check(&vec![0.2_f32; 1_000], 16_000),
//!     Err(AudioError::TooShort { .. })
//! ));
//! ```

use std::time::Duration;

use thiserror::Error;

/// Peak level quiet utterances are lifted to (≈ 20 000 on the i16 scale).
pub const NORMALIZE_TARGET_PEAK: f32 = 20_000.0 / 32_768.0;
/// Upper bound on the normalisation gain.
pub const NORMALIZE_MAX_GAIN: f32 = 20.0;
/// Gains at or below this are not worth applying.
const NORMALIZE_MIN_GAIN: f32 = 1.5;

// ---------------------------------------------------------------------------
// AudioError
// ---------------------------------------------------------------------------

/// Reason an utterance was rejected before transcription.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AudioError {
    #[error("utterance too short: {got_secs:.2}s (minimum {min_secs:.2}s)")]
    TooShort { min_secs: f32, got_secs: f32 },

    #[error("utterance too quiet: peak {peak:.4} (threshold {threshold:.4})")]
    TooQuiet { peak: f32, threshold: f32 },
}

// ---------------------------------------------------------------------------
// AudioQuality
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AudioQuality {
    pub min_duration: Duration,
    /// Minimum peak amplitude on the `f32` scale.
    pub min_peak: f32,
}

impl AudioQuality {
    pub fn new(min_duration: Duration, min_peak: f32) -> Self {
        Self {
            min_duration,
            min_peak,
        }
    }

    /// Duration first, then energy.
    pub fn check(&self, samples: &[f32], sample_rate: u32) -> Result<(), AudioError> {
        let got_secs = samples.len() as f32 / sample_rate.max(1) as f32;
        let min_secs = self.min_duration.as_secs_f32();
        if got_secs < min_secs {
            return Err(AudioError::TooShort { min_secs, got_secs });
        }

        let peak = peak(samples);
        if peak < self.min_peak {
            return Err(AudioError::TooQuiet {
                peak,
                threshold: self.min_peak,
            });
        }
        Ok(())
    }
}

/// Largest absolute sample value.
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0_f32, f32::max)
}

/// Lift a quiet utterance towards [`NORMALIZE_TARGET_PEAK`].
///
/// Returns the gain applied (`1.0` when the level was already adequate).
/// Loud audio is never attenuated.
pub fn normalize_peak(samples: &mut [f32]) -> f32 {
    let current = peak(samples);
    if current <= f32::EPSILON {
        return 1.0;
    }
    let gain = (NORMALIZE_TARGET_PEAK / current).min(NORMALIZE_MAX_GAIN);
    if gain <= NORMALIZE_MIN_GAIN {
        return 1.0;
    }
    for s in samples.iter_mut() {
        *s = (*s * gain).clamp(-1.0, 1.0);
    }
    gain
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
