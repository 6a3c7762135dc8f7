//! Reply playback: the FIFO queue and the worker that drains it.
//!
//! ```text
//!  SessionHandle::speak ─► PlaybackQueue ─► PlaybackWorker ─► SpeechSynthesizer
//!                            ▲    │                │                 │ PcmStream
//!        interrupt / skip ───┘    │ CancellationToken               ▼
//!                                 └───────────────► select! ──► PcmSink (halt on cancel)
//!                                                      │
//!                                   PlaybackEvent ◄────┘  (Started / Finished)
//! ```
//!
//! The queue holds the "currently playing" pointer under the same lock as the
//! pending items, so a skip can never race a natural completion: the worker
//! clears the pointer through [`PlaybackQueue::finish`], which only succeeds
//! for the item that is still current.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;

use crate::audio::{Cue, PcmSink};
use crate::lock::lock_or_recover;
use crate::tts::SpeechSynthesizer;

/// Output buffer kept ahead of the speaker before the worker stops pulling
/// chunks from the synthesiser.
const MAX_LEAD: Duration = Duration::from_millis(500);
const POLL: Duration = Duration::from_millis(20);

// ---------------------------------------------------------------------------
// PlaybackQueue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackItem {
    pub id: u64,
    pub text: String,
}

#[derive(Debug, Default)]
struct QueueInner {
    pending: VecDeque<PlaybackItem>,
    current: Option<(PlaybackItem, CancellationToken)>,
    next_id: u64,
    closed: bool,
}

#[derive(Debug, Default)]
pub struct PlaybackQueue {
    inner: Mutex<QueueInner>,
    notify: Notify,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueInner> {
        lock_or_recover(&self.inner, "playback queue")
    }

    /// Append a reply; returns its id.
    pub fn enqueue(&self, text: impl Into<String>) -> u64 {
        let id = {
            let mut inner = self.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.pending.push_back(PlaybackItem {
                id,
                text: text.into(),
            });
            id
        };
        self.notify.notify_one();
        id
    }

    /// Stop the current reply and drop every queued one.  Returns how many
    /// items were dropped, the playing one included.
    pub fn interrupt(&self) -> usize {
        let mut inner = self.lock();
        let mut dropped = inner.pending.len();
        inner.pending.clear();
        if let Some((item, token)) = inner.current.take() {
            log::debug!("playback: interrupting #{}", item.id);
            token.cancel();
            dropped += 1;
        }
        dropped
    }

    /// Drop the playing reply so the next queued one starts.  Returns the
    /// dropped item, or `None` (queue untouched) when nothing is playing.
    pub fn skip(&self) -> Option<PlaybackItem> {
        let (item, token) = self.lock().current.take()?;
        log::debug!("playback: skipping #{}", item.id);
        token.cancel();
        Some(item)
    }

    /// Wait for the next item and mark it as playing.  `None` once the queue
    /// is closed.
    pub async fn drain(&self) -> Option<(PlaybackItem, CancellationToken)> {
        loop {
            {
                let mut inner = self.lock();
                if inner.closed {
                    return None;
                }
                if let Some(item) = inner.pending.pop_front() {
                    let token = CancellationToken::new();
                    inner.current = Some((item.clone(), token.clone()));
                    return Some((item, token));
                }
            }
            self.notify.notified().await;
        }
    }

    /// Clear the playing pointer if `id` is still the current item.
    pub fn finish(&self, id: u64) -> bool {
        let mut inner = self.lock();
        match &inner.current {
            Some((item, _)) if item.id == id => {
                inner.current = None;
                true
            }
            _ => false,
        }
    }

    /// Items waiting behind the current one.
    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Nothing playing and nothing queued.
    pub fn is_idle(&self) -> bool {
        let inner = self.lock();
        inner.current.is_none() && inner.pending.is_empty()
    }

    pub fn current_text(&self) -> Option<String> {
        self.lock().current.as_ref().map(|(item, _)| item.text.clone())
    }

    /// Stop the worker after the current item.
    pub fn close(&self) {
        self.lock().closed = true;
        self.notify.notify_one();
    }
}

// ---------------------------------------------------------------------------
// PlaybackWorker
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Completed,
    Cancelled,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    Started { id: u64, text: String },
    Finished { id: u64, text: String, outcome: PlaybackOutcome },
}

/// The single owner of the output path: synthesises queued replies, streams
/// them into the sink and plays notification cues in between.
pub struct PlaybackWorker {
    queue: Arc<PlaybackQueue>,
    synth: Arc<dyn SpeechSynthesizer>,
    sink: Arc<dyn PcmSink>,
    cues: mpsc::UnboundedReceiver<Cue>,
    events: mpsc::Sender<PlaybackEvent>,
}

impl PlaybackWorker {
    pub fn new(
        queue: Arc<PlaybackQueue>,
        synth: Arc<dyn SpeechSynthesizer>,
        sink: Arc<dyn PcmSink>,
        cues: mpsc::UnboundedReceiver<Cue>,
        events: mpsc::Sender<PlaybackEvent>,
    ) -> Self {
        Self {
            queue,
            synth,
            sink,
            cues,
            events,
        }
    }

    /// Run until the queue is closed.
    pub async fn run(mut self) {
        loop {
            let next = tokio::select! {
                biased;
                Some(cue) = self.cues.recv() => {
                    self.play_cue(cue);
                    continue;
                }
                next = self.queue.drain() => next,
            };
            let Some((item, token)) = next else {
                break;
            };

            let _ = self
                .events
                .send(PlaybackEvent::Started {
                    id: item.id,
                    text: item.text.clone(),
                })
                .await;

            let outcome = self.play(&item, &token).await;
            match &outcome {
                PlaybackOutcome::Completed => log::debug!("playback: #{} done", item.id),
                PlaybackOutcome::Cancelled => log::debug!("playback: #{} cancelled", item.id),
                PlaybackOutcome::Failed(e) => log::warn!("playback: #{} failed: {e}", item.id),
            }
            self.queue.finish(item.id);

            let _ = self
                .events
                .send(PlaybackEvent::Finished {
                    id: item.id,
                    text: item.text,
                    outcome,
                })
                .await;
        }
        log::debug!("playback: worker stopped");
    }

    async fn play(&mut self, item: &PlaybackItem, token: &CancellationToken) -> PlaybackOutcome {
        let rate = self.synth.sample_rate();

        let mut stream = tokio::select! {
            biased;
            _ = token.cancelled() => return PlaybackOutcome::Cancelled,
            result = self.synth.synthesize(&item.text) => match result {
                Ok(stream) => stream,
                Err(e) => return PlaybackOutcome::Failed(e.to_string()),
            },
        };

        loop {
            if self.sink.queued() > MAX_LEAD {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return self.halt(),
                    _ = tokio::time::sleep(POLL) => continue,
                }
            }

            tokio::select! {
                biased;
                _ = token.cancelled() => return self.halt(),
                Some(cue) = self.cues.recv() => self.play_cue(cue),
                chunk = stream.next() => match chunk {
                    Some(Ok(samples)) => self.sink.write(&samples, rate),
                    Some(Err(e)) => {
                        self.sink.halt();
                        return PlaybackOutcome::Failed(e.to_string());
                    }
                    None => break,
                },
            }
        }

        // Let the tail of the reply reach the speaker.
        while !self.sink.queued().is_zero() {
            tokio::select! {
                biased;
                _ = token.cancelled() => return self.halt(),
                _ = tokio::time::sleep(POLL) => {}
            }
        }
        PlaybackOutcome::Completed
    }

    fn halt(&self) -> PlaybackOutcome {
        self.sink.halt();
        PlaybackOutcome::Cancelled
    }

    fn play_cue(&self, cue: Cue) {
        let rate = self.synth.sample_rate();
        self.sink.write(&cue.render(rate), rate);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
