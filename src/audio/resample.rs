//! Sample-rate conversion and channel mixing.
//!
//! Capture runs at whatever rate the microphone offers (commonly 44.1 or
//! 48 kHz) and is brought down to the 16 kHz mono stream the VAD gate and
//! the transcription service expect.  Playback goes the other way: 24 kHz
//! speech from the synthesis service is brought up to the output device's
//! rate.  Both use the same linear interpolator.

// ---------------------------------------------------------------------------
// downmix
// ---------------------------------------------------------------------------

/// Mix interleaved multi-channel audio to mono by averaging each frame.
///
/// ```rust
/// use voice_relay::audio::downmix;
///
/// let stereo = vec![0.5_f32, -0.5, 0.2, 0.4]; // L R L R
/// let mono = downmix(&stereo, 2);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[1] - 0.3).abs() < 1e-6);
/// ```
pub fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

/// Duplicate mono samples into `channels` interleaved channels.
pub fn upmix(samples: &[f32], channels: u16) -> Vec<f32> {
    let n = channels.max(1) as usize;
    if n == 1 {
        return samples.to_vec();
    }
    samples
        .iter()
        .flat_map(|&s| std::iter::repeat(s).take(n))
        .collect()
}

// ---------------------------------------------------------------------------
// resample
// ---------------------------------------------------------------------------

/// Resample mono `samples` from `from_rate` to `to_rate` Hz with linear
/// interpolation.  Equal rates return a copy.
///
/// ```rust
/// use voice_relay::audio::resample;
///
/// let hi = vec![0.5_f32; 480]; // 10 ms @ 48 kHz
/// assert_eq!(resample(&hi, 48_000, 16_000).len(), 160);
/// ```
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }
    if samples.is_empty() {
        return Vec::new();
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let output_len = (samples.len() as f64 * ratio).ceil() as usize;
    let last = samples.len() - 1;

    (0..output_len)
        .map(|i| {
            let src_pos = i as f64 / ratio;
            let idx = src_pos as usize;
            let frac = (src_pos - idx as f64) as f32;
            if idx < last {
                samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
            } else {
                samples[idx.min(last)]
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// StreamResampler
// ---------------------------------------------------------------------------

/// Resampler for a continuous stream delivered in arbitrary chunk sizes.
///
/// Resampling each chunk independently would drift and click at chunk
/// edges; this keeps the fractional read position and the last input sample
/// across calls.
#[derive(Debug, Clone)]
pub struct StreamResampler {
    from_rate: u32,
    to_rate: u32,
    /// Read position relative to the start of the next chunk, in input
    /// samples.  `-1.0 ..= 0.0` points into the carried sample.
    position: f64,
    carry: Option<f32>,
}

impl StreamResampler {
    pub fn new(from_rate: u32, to_rate: u32) -> Self {
        Self {
            from_rate,
            to_rate,
            position: 0.0,
            carry: None,
        }
    }

    pub fn process(&mut self, chunk: &[f32]) -> Vec<f32> {
        if self.from_rate == self.to_rate || self.from_rate == 0 || self.to_rate == 0 {
            return chunk.to_vec();
        }
        if chunk.is_empty() {
            return Vec::new();
        }

        let step = self.from_rate as f64 / self.to_rate as f64;
        let sample_at = |i: isize| -> f32 {
            if i < 0 {
                self.carry.unwrap_or(chunk[0])
            } else {
                chunk[i as usize]
            }
        };

        let mut out = Vec::with_capacity((chunk.len() as f64 / step).ceil() as usize + 1);
        let last = chunk.len() as f64 - 1.0;
        while self.position < last {
            let base = self.position.floor();
            let frac = (self.position - base) as f32;
            let i = base as isize;
            out.push(sample_at(i) * (1.0 - frac) + sample_at(i + 1) * frac);
            self.position += step;
        }

        self.carry = chunk.last().copied();
        self.position -= chunk.len() as f64;
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
