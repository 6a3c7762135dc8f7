//! Silence-bounded utterance segmentation.
//!
//! ```text
//!            speech frame                      silence run ≥ threshold
//!   Waiting ─────────────► Buffering ─────────────────────────────────► emit Utterance
//!      ▲   (silence: drop)     │   (only once grace period has elapsed)       │
//!      │                       │   length ≥ max_utterance ───────────────────►│
//!      └───────────────────────┴──────────────────────────────────────────────┘
//! ```
//!
//! All timing is measured in audio time (sum of frame durations), never wall
//! clock, so the segmenter behaves identically on a live stream and in tests.

use std::time::Duration;

use super::frame::AudioFrame;

/// One continuous span of speech bounded by silence.
///
/// Frames are kept in capture order from the first speech frame up to and
/// including the silence run that ended it.
#[derive(Debug, Clone)]
pub struct Utterance {
    pub frames: Vec<AudioFrame>,
    pub sample_rate: u32,
}

impl Utterance {
    /// Concatenated samples.
    pub fn samples(&self) -> Vec<f32> {
        let total = self.frames.iter().map(|f| f.samples.len()).sum();
        let mut out = Vec::with_capacity(total);
        for frame in &self.frames {
            out.extend_from_slice(&frame.samples);
        }
        out
    }

    pub fn duration(&self) -> Duration {
        self.frames.iter().map(AudioFrame::duration).sum()
    }

    /// Sequence numbers of the first and last frame.
    pub fn seq_range(&self) -> (u64, u64) {
        let first = self.frames.first().map_or(0, |f| f.seq);
        let last = self.frames.last().map_or(first, |f| f.seq);
        (first, last)
    }
}

/// Timing parameters for [`UtteranceSegmenter`].
#[derive(Debug, Clone, Copy)]
pub struct SegmenterConfig {
    pub silence_threshold: Duration,
    pub grace_period: Duration,
    pub max_utterance: Duration,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            silence_threshold: Duration::from_millis(1_000),
            grace_period: Duration::from_millis(1_000),
            max_utterance: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
pub struct UtteranceSegmenter {
    config: SegmenterConfig,
    frames: Vec<AudioFrame>,
    /// Audio time since the first speech frame.
    elapsed: Duration,
    /// Length of the current run of non-speech frames.
    silence_run: Duration,
}

impl UtteranceSegmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self {
            config,
            frames: Vec::new(),
            elapsed: Duration::ZERO,
            silence_run: Duration::ZERO,
        }
    }

    /// Feed one classified frame.  Returns the finished utterance when this
    /// frame completes one.
    pub fn push(&mut self, frame: AudioFrame, is_speech: bool) -> Option<Utterance> {
        if self.frames.is_empty() && !is_speech {
            return None;
        }

        let length = frame.duration();
        self.frames.push(frame);
        self.elapsed += length;
        if is_speech {
            self.silence_run = Duration::ZERO;
        } else {
            self.silence_run += length;
        }

        let paused = self.silence_run >= self.config.silence_threshold
            && self.elapsed >= self.config.grace_period;
        if paused || self.elapsed >= self.config.max_utterance {
            if !paused {
                log::debug!("segment: utterance reached {:?}, forcing end", self.elapsed);
            }
            return self.take();
        }
        None
    }

    /// End the current utterance now, e.g. when the input stream closes.
    pub fn flush(&mut self) -> Option<Utterance> {
        self.take()
    }

    /// Switch the silence threshold, e.g. to the shorter barge-in value while
    /// a reply is playing.  Applies to the utterance in progress.
    pub fn set_silence_threshold(&mut self, threshold: Duration) {
        self.config.silence_threshold = threshold;
    }

    pub fn silence_threshold(&self) -> Duration {
        self.config.silence_threshold
    }

    /// `true` while an utterance is being accumulated.
    pub fn is_buffering(&self) -> bool {
        !self.frames.is_empty()
    }

    fn take(&mut self) -> Option<Utterance> {
        self.elapsed = Duration::ZERO;
        self.silence_run = Duration::ZERO;
        if self.frames.is_empty() {
            return None;
        }
        let frames = std::mem::take(&mut self.frames);
        let sample_rate = frames[0].sample_rate;
        Some(Utterance { frames, sample_rate })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
