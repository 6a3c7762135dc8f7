//! Audio output: the PCM sink abstraction, the cpal-backed device, and the
//! short notification cues.
//!
//! # Threading
//!
//! ```text
//!  playback worker ──write()──► Arc<Mutex<VecDeque<f32>>> ──► cpal callback
//!        │                               ▲                    (output thread)
//!        └──────────halt()───── clear ───┘
//! ```
//!
//! The cpal stream is built and kept on a dedicated OS thread because
//! `cpal::Stream` is not `Send` on every platform.  `halt()` empties the
//! shared buffer, so cancelled speech goes silent within one device
//! callback instead of after the queued audio drains.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

use super::resample::StreamResampler;
use crate::lock::lock_or_recover;

// ---------------------------------------------------------------------------
// PcmSink
// ---------------------------------------------------------------------------

/// Destination for mono PCM audio.
pub trait PcmSink: Send + Sync {
    /// Queue `samples` (mono, `sample_rate` Hz) for playback.
    fn write(&self, samples: &[f32], sample_rate: u32);

    /// Audio queued but not yet played.
    fn queued(&self) -> Duration;

    /// Drop everything queued and go silent now.
    fn halt(&self);
}

// ---------------------------------------------------------------------------
// Cue
// ---------------------------------------------------------------------------

/// Short notification sounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    Activate,
    Deactivate,
    Skip,
    Stop,
    /// A forwarded message could not be delivered.
    Undelivered,
}

impl Cue {
    /// `(frequency Hz, duration ms)` notes.
    fn notes(self) -> &'static [(f32, u32)] {
        match self {
            Cue::Activate => &[(660.0, 90), (880.0, 120)],
            Cue::Deactivate => &[(880.0, 90), (660.0, 120)],
            Cue::Skip => &[(740.0, 70)],
            Cue::Stop => &[(440.0, 70), (0.0, 40), (440.0, 70)],
            Cue::Undelivered => &[(330.0, 250)],
        }
    }

    /// Render the cue as mono samples at `sample_rate`.
    pub fn render(self, sample_rate: u32) -> Vec<f32> {
        const AMPLITUDE: f32 = 0.25;
        const FADE_MS: u32 = 8;

        let mut out = Vec::new();
        for &(freq, ms) in self.notes() {
            let len = (sample_rate * ms / 1_000) as usize;
            let fade = ((sample_rate * FADE_MS / 1_000) as usize).min(len / 2).max(1);
            out.extend((0..len).map(|i| {
                let envelope = (i.min(len - 1 - i) as f32 / fade as f32).min(1.0);
                let phase = 2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32;
                AMPLITUDE * envelope * phase.sin()
            }));
        }
        out
    }
}

// ---------------------------------------------------------------------------
// OutputError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("no output device found on the default audio host")]
    NoDevice,

    #[error("output device {0:?} not found")]
    DeviceNotFound(String),

    #[error("failed to enumerate output devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("failed to query default output config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("output thread failed: {0}")]
    Thread(String),
}

// ---------------------------------------------------------------------------
// CpalOutput
// ---------------------------------------------------------------------------

type SharedBuffer = Arc<Mutex<VecDeque<f32>>>;

/// The single owner of the audio output device.
pub struct CpalOutput {
    buffer: SharedBuffer,
    device_rate: u32,
    resampler: Mutex<Option<(u32, StreamResampler)>>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl CpalOutput {
    /// Open the named output device (or the default) on a dedicated thread.
    pub fn open(name: Option<String>) -> Result<Self, OutputError> {
        let buffer: SharedBuffer = Arc::new(Mutex::new(VecDeque::new()));
        let stop = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::channel::<Result<u32, OutputError>>();

        let thread_buffer = Arc::clone(&buffer);
        let thread_stop = Arc::clone(&stop);
        let thread = std::thread::Builder::new()
            .name("audio-output".into())
            .spawn(move || {
                let (stream, rate) = match build_stream(name.as_deref(), thread_buffer) {
                    Ok(ok) => ok,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(rate));
                while !thread_stop.load(Ordering::Acquire) {
                    std::thread::park_timeout(Duration::from_millis(250));
                }
                drop(stream);
            })
            .map_err(|e| OutputError::Thread(e.to_string()))?;

        let device_rate = ready_rx
            .recv()
            .map_err(|_| OutputError::Thread("output thread exited during setup".into()))??;

        Ok(Self {
            buffer,
            device_rate,
            resampler: Mutex::new(None),
            stop,
            thread: Some(thread),
        })
    }

    pub fn device_rate(&self) -> u32 {
        self.device_rate
    }
}

impl PcmSink for CpalOutput {
    fn write(&self, samples: &[f32], sample_rate: u32) {
        let converted = {
            let mut slot = lock_or_recover(&self.resampler, "output resampler");
            let (rate, rs) = slot.get_or_insert_with(|| {
                (sample_rate, StreamResampler::new(sample_rate, self.device_rate))
            });
            if *rate != sample_rate {
                *rate = sample_rate;
                *rs = StreamResampler::new(sample_rate, self.device_rate);
            }
            rs.process(samples)
        };
        lock_or_recover(&self.buffer, "output buffer").extend(converted);
    }

    fn queued(&self) -> Duration {
        let len = lock_or_recover(&self.buffer, "output buffer").len() as u64;
        Duration::from_nanos(len * 1_000_000_000 / u64::from(self.device_rate.max(1)))
    }

    fn halt(&self) {
        lock_or_recover(&self.buffer, "output buffer").clear();
        *lock_or_recover(&self.resampler, "output resampler") = None;
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            thread.thread().unpark();
            let _ = thread.join();
        }
    }
}

fn build_stream(name: Option<&str>, buffer: SharedBuffer) -> Result<(cpal::Stream, u32), OutputError> {
    let host = cpal::default_host();
    let device = match name {
        Some(wanted) => host
            .output_devices()?
            .find(|d| d.name().is_ok_and(|n| n.eq_ignore_ascii_case(wanted)))
            .ok_or_else(|| OutputError::DeviceNotFound(wanted.to_string()))?,
        None => host.default_output_device().ok_or(OutputError::NoDevice)?,
    };

    let supported = device.default_output_config()?;
    let channels = supported.channels().max(1) as usize;
    let rate = supported.sample_rate().0;
    let config: cpal::StreamConfig = supported.into();

    let stream = device.build_output_stream(
        &config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            let mut queue = lock_or_recover(&buffer, "output callback");
            for frame in data.chunks_mut(channels) {
                frame.fill(queue.pop_front().unwrap_or(0.0));
            }
        },
        |err: cpal::StreamError| {
            log::error!("playback: output stream error: {err}");
        },
        None,
    )?;
    stream.play()?;

    log::info!(
        "playback: {} @ {rate} Hz, {channels} ch",
        device.name().unwrap_or_else(|_| "<unnamed>".into())
    );
    Ok((stream, rate))
}

// ---------------------------------------------------------------------------
// MemorySink (tests)
// ---------------------------------------------------------------------------

/// In-memory sink that "plays" instantly and records what it was given.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct MemorySink {
    pub written: Mutex<Vec<f32>>,
    pub halts: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl PcmSink for MemorySink {
    fn write(&self, samples: &[f32], _sample_rate: u32) {
        self.written.lock().unwrap().extend_from_slice(samples);
    }

    fn queued(&self) -> Duration {
        Duration::ZERO
    }

    fn halt(&self) {
        self.halts.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
