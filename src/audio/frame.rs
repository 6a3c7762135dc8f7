//! Fixed-duration analysis frames.
//!
//! The capture path delivers buffers of whatever size the driver chooses.
//! [`FrameChunker`] re-cuts that stream into equal [`AudioFrame`]s (30 ms at
//! 16 kHz by default) numbered with a monotonic sequence, which is the unit
//! the VAD gate and the segmenter work in.

use std::sync::Arc;
use std::time::Duration;

/// One fixed-size block of mono PCM.  Immutable once produced; the samples
/// are shared so frames can be cloned into utterances cheaply.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub seq: u64,
    pub sample_rate: u32,
    pub samples: Arc<[f32]>,
}

impl AudioFrame {
    pub fn new(seq: u64, sample_rate: u32, samples: Vec<f32>) -> Self {
        Self {
            seq,
            sample_rate,
            samples: samples.into(),
        }
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.samples.len() as u64 * 1_000_000_000 / u64::from(self.sample_rate))
    }
}

/// Cuts a continuous mono stream into [`AudioFrame`]s of `frame_len` samples.
#[derive(Debug)]
pub struct FrameChunker {
    sample_rate: u32,
    frame_len: usize,
    pending: Vec<f32>,
    next_seq: u64,
}

impl FrameChunker {
    pub fn new(sample_rate: u32, frame_len: usize) -> Self {
        Self {
            sample_rate,
            frame_len: frame_len.max(1),
            pending: Vec::with_capacity(frame_len * 2),
            next_seq: 0,
        }
    }

    /// Append samples and return every complete frame they finish.
    pub fn push(&mut self, samples: &[f32]) -> Vec<AudioFrame> {
        self.pending.extend_from_slice(samples);
        let complete = self.pending.len() / self.frame_len;
        let mut frames = Vec::with_capacity(complete);
        for chunk in self.pending.chunks_exact(self.frame_len) {
            frames.push(AudioFrame::new(self.next_seq, self.sample_rate, chunk.to_vec()));
            self.next_seq += 1;
        }
        self.pending.drain(..complete * self.frame_len);
        frames
    }

    /// Samples waiting for the next frame to fill.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_are_fixed_size_and_numbered() {
        let mut chunker = FrameChunker::new(16_000, 480);
        let mut frames = chunker.push(&vec![0.1; 700]);
        frames.extend(chunker.push(&vec![0.1; 800]));

        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f.samples.len() == 480));
        let seqs: Vec<u64> = frames.iter().map(|f| f.seq).collect();
        assert_eq!(seqs, [0, 1, 2]);
        assert_eq!(chunker.pending(), 60);
    }

    #[test]
    fn frame_duration() {
        let frame = AudioFrame::new(0, 16_000, vec![0.0; 480]);
        assert_eq!(frame.duration(), Duration::from_millis(30));
    }
}
