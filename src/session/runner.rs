//! Session runner: the single consumer of every session event.
//!
//! # Event flow
//!
//! ```text
//!  capture thread ──Frame──────────┐
//!  transcription jobs ──Transcribed┤   (reordered by TranscriptSequencer)
//!  delivery worker ──Delivered/────┤
//!                   DeliveryFailed ├──► SessionRunner ──► SessionStateMachine
//!  SessionHandle ──Speak/Shutdown──┤        │                  │ Effects
//!  PlaybackWorker ──PlaybackEvent──┤        │                  ▼
//!  interval ──tick─────────────────┘        │   Chime ─► cue channel ─► PlaybackWorker
//!                                           │   Forward ─► DeliveryWorker ─► TextSink
//!                                           │   Interrupt / Skip ─► PlaybackQueue
//!                                           ▼
//!                                     SharedStatus / Journal
//! ```
//!
//! Nothing blocks inside the loop: transcription runs in spawned tasks with
//! a timeout, delivery in its own worker, synthesis in the playback worker.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::delivery::{DeliveryWorker, TextSink};
use super::echo::EchoSuppressor;
use super::journal::{EntryKind, Journal};
use super::machine::{Effect, SessionStateMachine};
use super::playback::{PlaybackEvent, PlaybackOutcome, PlaybackQueue, PlaybackWorker};
use super::sequencer::TranscriptSequencer;
use super::state::{new_shared_status, update_status, SessionState, SharedStatus};
use crate::audio::{
    normalize_peak, peak, AudioFrame, AudioQuality, Cue, PcmSink, SegmenterConfig, Utterance,
    UtteranceSegmenter, VoiceActivityGate,
};
use crate::config::SessionSnapshot;
use crate::keyword::{Classification, KeywordMatcher};
use crate::stt::{AudioClip, SttError, Transcript, TranscriptionClient};
use crate::tts::SpeechSynthesizer;

const TICK: Duration = Duration::from_secs(1);
const EVENT_CAPACITY: usize = 512;

/// Spoken when forwarded speech could not be delivered.
const UNDELIVERED_NOTICE: &str = "Sorry, I couldn't deliver your last message.";

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Result of one transcription job.
#[derive(Debug, Clone)]
pub enum TranscriptOutcome {
    Speech(Transcript),
    /// Rejected by the quality gate or judged silent by the recogniser.
    NoSpeech,
    /// Recogniser unreachable, failed or timed out.
    Unavailable(String),
}

#[derive(Debug)]
pub enum SessionEvent {
    Frame(AudioFrame),
    /// The input stream ended; flush any partial utterance.
    CaptureClosed,
    Transcribed { ticket: u64, outcome: TranscriptOutcome },
    /// An assistant reply to be spoken.
    Speak(String),
    Delivered { text: String },
    DeliveryFailed { text: String, error: String },
    Shutdown,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session has stopped")]
    Closed,

    #[error("session task failed: {0}")]
    Task(String),
}

// ---------------------------------------------------------------------------
// SessionHandle
// ---------------------------------------------------------------------------

/// Cloneable front door to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    events: mpsc::Sender<SessionEvent>,
}

impl SessionHandle {
    /// Queue an assistant reply for playback.
    pub async fn speak(&self, text: impl Into<String>) -> Result<(), SessionError> {
        self.send(SessionEvent::Speak(text.into())).await
    }

    pub async fn send_frame(&self, frame: AudioFrame) -> Result<(), SessionError> {
        self.send(SessionEvent::Frame(frame)).await
    }

    /// For the capture thread, which is not inside the runtime.
    pub fn blocking_send_frame(&self, frame: AudioFrame) -> Result<(), SessionError> {
        self.events
            .blocking_send(SessionEvent::Frame(frame))
            .map_err(|_| SessionError::Closed)
    }

    pub fn blocking_capture_closed(&self) -> Result<(), SessionError> {
        self.events
            .blocking_send(SessionEvent::CaptureClosed)
            .map_err(|_| SessionError::Closed)
    }

    pub async fn capture_closed(&self) -> Result<(), SessionError> {
        self.send(SessionEvent::CaptureClosed).await
    }

    /// Ask the session to stop.  In-flight transcriptions are still applied
    /// and delivered before [`Session::join`] returns.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.send(SessionEvent::Shutdown).await
    }

    async fn send(&self, event: SessionEvent) -> Result<(), SessionError> {
        self.events.send(event).await.map_err(|_| SessionError::Closed)
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// External collaborators of a session.
pub struct SessionServices {
    pub stt: Arc<dyn TranscriptionClient>,
    pub synth: Arc<dyn SpeechSynthesizer>,
    pub output: Arc<dyn PcmSink>,
    pub text_sink: Arc<dyn TextSink>,
}

/// A running session: the runner plus its playback and delivery workers.
pub struct Session {
    handle: SessionHandle,
    status: SharedStatus,
    queue: Arc<PlaybackQueue>,
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    /// Spawn the session onto the current tokio runtime.
    pub fn start(snapshot: Arc<SessionSnapshot>, services: SessionServices, journal: Journal) -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CAPACITY);
        let (playback_tx, playback_rx) = mpsc::channel(32);
        let (cue_tx, cue_rx) = mpsc::unbounded_channel();
        let (text_tx, text_rx) = mpsc::unbounded_channel();

        let status = new_shared_status();
        let queue = Arc::new(PlaybackQueue::new());

        let playback = PlaybackWorker::new(
            Arc::clone(&queue),
            services.synth,
            services.output,
            cue_rx,
            playback_tx,
        );
        let delivery = DeliveryWorker::new(text_rx, services.text_sink, event_tx.clone());
        let runner = SessionRunner::new(
            snapshot,
            services.stt,
            Arc::clone(&queue),
            Channels {
                events_tx: event_tx.clone(),
                events_rx: event_rx,
                playback_rx,
                cues: cue_tx,
                deliveries: text_tx,
            },
            Arc::clone(&status),
            journal,
        );

        let tasks = vec![
            tokio::spawn(runner.run()),
            tokio::spawn(playback.run()),
            tokio::spawn(delivery.run()),
        ];
        log::info!("session: started");

        Self {
            handle: SessionHandle { events: event_tx },
            status,
            queue,
            tasks,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn status(&self) -> SharedStatus {
        Arc::clone(&self.status)
    }

    pub fn playback(&self) -> Arc<PlaybackQueue> {
        Arc::clone(&self.queue)
    }

    /// Wait for every session task to finish (after a shutdown request).
    pub async fn join(self) -> Result<(), SessionError> {
        drop(self.handle);
        for task in self.tasks {
            task.await.map_err(|e| SessionError::Task(e.to_string()))?;
        }
        log::info!("session: stopped");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SessionRunner
// ---------------------------------------------------------------------------

struct Channels {
    events_tx: mpsc::Sender<SessionEvent>,
    events_rx: mpsc::Receiver<SessionEvent>,
    playback_rx: mpsc::Receiver<PlaybackEvent>,
    cues: mpsc::UnboundedSender<Cue>,
    deliveries: mpsc::UnboundedSender<String>,
}

struct SessionRunner {
    snapshot: Arc<SessionSnapshot>,
    machine: SessionStateMachine,
    matcher: KeywordMatcher,
    echo: EchoSuppressor,
    vad: VoiceActivityGate,
    segmenter: UtteranceSegmenter,
    quality: AudioQuality,
    sequencer: TranscriptSequencer<TranscriptOutcome>,
    stt: Arc<dyn TranscriptionClient>,
    queue: Arc<PlaybackQueue>,
    channels: Channels,
    status: SharedStatus,
    journal: Journal,
    shutting_down: bool,
}

impl SessionRunner {
    fn new(
        snapshot: Arc<SessionSnapshot>,
        stt: Arc<dyn TranscriptionClient>,
        queue: Arc<PlaybackQueue>,
        channels: Channels,
        status: SharedStatus,
        journal: Journal,
    ) -> Self {
        let segmenter = UtteranceSegmenter::new(SegmenterConfig {
            silence_threshold: snapshot.silence_threshold(),
            grace_period: snapshot.grace_period(),
            max_utterance: snapshot.max_utterance(),
        });
        Self {
            machine: SessionStateMachine::from_snapshot(&snapshot, Instant::now()),
            matcher: KeywordMatcher::new(snapshot.keywords.clone()),
            echo: EchoSuppressor::new(snapshot.echo_tail(), snapshot.session.echo_overlap),
            vad: VoiceActivityGate::new(snapshot.audio.vad_rms_threshold, snapshot.audio.vad_max_zcr),
            segmenter,
            quality: AudioQuality::new(snapshot.min_utterance(), snapshot.audio.min_audio_energy),
            sequencer: TranscriptSequencer::new(),
            stt,
            queue,
            channels,
            status,
            journal,
            shutting_down: false,
            snapshot,
        }
    }

    async fn run(mut self) {
        let mut tick = tokio::time::interval(TICK);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if self.shutting_down && self.sequencer.outstanding() == 0 {
                break;
            }
            tokio::select! {
                Some(event) = self.channels.events_rx.recv() => self.handle(event),
                Some(event) = self.channels.playback_rx.recv() => self.on_playback(event),
                _ = tick.tick() => {
                    let effects = self.machine.on_tick(Instant::now());
                    self.apply(effects);
                }
            }
            self.sync_status();
        }

        self.queue.interrupt();
        self.queue.close();
        log::debug!("session: runner stopped");
    }

    fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Frame(frame) => self.on_frame(frame),
            SessionEvent::CaptureClosed => {
                log::info!("session: capture closed");
                self.flush_segmenter();
            }
            SessionEvent::Transcribed { ticket, outcome } => {
                for outcome in self.sequencer.complete(ticket, outcome) {
                    self.on_outcome(outcome);
                }
            }
            SessionEvent::Speak(text) => {
                let text = text.trim();
                if !text.is_empty() && !self.shutting_down {
                    self.queue.enqueue(text);
                }
            }
            SessionEvent::Delivered { .. } => update_status(&self.status, |s| {
                s.delivered += 1;
                s.last_error = None;
            }),
            SessionEvent::DeliveryFailed { text, error } => {
                self.journal.record(EntryKind::Undelivered, &text);
                update_status(&self.status, |s| s.last_error = Some(format!("not delivered: {error}")));
                let _ = self.channels.cues.send(Cue::Undelivered);
                if !self.shutting_down {
                    self.queue.enqueue(UNDELIVERED_NOTICE);
                }
            }
            SessionEvent::Shutdown => {
                log::info!("session: shutting down");
                self.flush_segmenter();
                self.shutting_down = true;
                self.queue.interrupt();
            }
        }
    }

    // -----------------------------------------------------------------------
    // Capture path
    // -----------------------------------------------------------------------

    fn on_frame(&mut self, frame: AudioFrame) {
        if self.shutting_down {
            return;
        }
        let threshold = if self.machine.state() == SessionState::Speaking {
            self.snapshot.barge_in_silence()
        } else {
            self.snapshot.silence_threshold()
        };
        self.segmenter.set_silence_threshold(threshold);

        let speech = self.vad.is_speech(&frame.samples);
        if let Some(utterance) = self.segmenter.push(frame, speech) {
            self.submit(utterance);
        }
    }

    fn flush_segmenter(&mut self) {
        if let Some(utterance) = self.segmenter.flush() {
            self.submit(utterance);
        }
    }

    /// Gate the utterance and start its transcription job.
    fn submit(&mut self, utterance: Utterance) {
        let ticket = self.sequencer.issue();
        let mut samples = utterance.samples();

        if let Err(e) = self.quality.check(&samples, utterance.sample_rate) {
            log::debug!("session: dropped utterance: {e}");
            for outcome in self.sequencer.complete(ticket, TranscriptOutcome::NoSpeech) {
                self.on_outcome(outcome);
            }
            return;
        }

        let level = peak(&samples);
        let gain = normalize_peak(&mut samples);
        log::debug!(
            "session: utterance #{ticket} {:?}, peak {level:.3}, gain {gain:.1}",
            utterance.duration()
        );

        let stt = Arc::clone(&self.stt);
        let events = self.channels.events_tx.clone();
        let limit = self.snapshot.transcription_timeout();
        tokio::spawn(async move {
            let clip = AudioClip {
                samples,
                sample_rate: utterance.sample_rate,
                channels: 1,
            };
            let outcome = match tokio::time::timeout(limit, stt.transcribe(&clip)).await {
                Ok(Ok(response)) if response.had_speech => {
                    TranscriptOutcome::Speech(Transcript::new(response.text, &utterance, level))
                }
                Ok(Ok(_)) => TranscriptOutcome::NoSpeech,
                Ok(Err(e)) => TranscriptOutcome::Unavailable(e.to_string()),
                Err(_) => TranscriptOutcome::Unavailable(SttError::Timeout.to_string()),
            };
            let _ = events.send(SessionEvent::Transcribed { ticket, outcome }).await;
        });
    }

    fn on_outcome(&mut self, outcome: TranscriptOutcome) {
        match outcome {
            TranscriptOutcome::NoSpeech => {}
            TranscriptOutcome::Unavailable(reason) => {
                log::warn!("session: transcription unavailable: {reason}");
                update_status(&self.status, |s| {
                    s.last_error = Some(format!("transcription unavailable: {reason}"));
                });
            }
            TranscriptOutcome::Speech(transcript) => self.on_transcript(transcript),
        }
    }

    fn on_transcript(&mut self, transcript: Transcript) {
        let now = Instant::now();
        let text = transcript.text.as_str();
        let class = self
            .matcher
            .classify(text, self.machine.state(), self.echo.audible_text(now));

        // Control words already had self-spoken phrases filtered out.
        let control = matches!(
            class,
            Classification::Interrupt | Classification::Skip | Classification::FinishNow { .. }
        );
        if !control && self.echo.is_echo(text, now) {
            log::debug!("session: ignoring echo {text:?}");
            return;
        }

        log::debug!("session: heard {text:?} as {class:?} in {}", self.machine.state());
        let effects = self.machine.on_transcript(text, class, now);
        self.apply(effects);
    }

    // -----------------------------------------------------------------------
    // Effects and playback
    // -----------------------------------------------------------------------

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Chime(cue) => {
                    let _ = self.channels.cues.send(cue);
                }
                Effect::Forward(text) => {
                    self.journal.record(EntryKind::User, &text);
                    update_status(&self.status, |s| s.last_forwarded = Some(text.clone()));
                    if self.channels.deliveries.send(text).is_err() {
                        log::error!("session: delivery worker has stopped");
                    }
                }
                Effect::Interrupt => {
                    if let Some(text) = self.queue.current_text() {
                        self.journal.record(EntryKind::Interrupt, &text);
                    }
                    let dropped = self.queue.interrupt();
                    log::debug!("session: interrupt dropped {dropped} replies");
                }
                Effect::Skip => {
                    if let Some(item) = self.queue.skip() {
                        self.journal.record(EntryKind::Skip, &item.text);
                    }
                    if self.queue.is_idle() {
                        self.machine.on_playback_drained(Instant::now());
                    }
                }
            }
        }
    }

    fn on_playback(&mut self, event: PlaybackEvent) {
        let now = Instant::now();
        match event {
            PlaybackEvent::Started { text, .. } => {
                self.echo.on_started(&text);
                self.machine.on_playback_started(now);
            }
            PlaybackEvent::Finished { text, outcome, .. } => {
                self.echo.on_finished(now);
                match outcome {
                    PlaybackOutcome::Completed => self.journal.record(EntryKind::Assistant, &text),
                    PlaybackOutcome::Cancelled => {}
                    PlaybackOutcome::Failed(e) => {
                        update_status(&self.status, |s| s.last_error = Some(format!("speech failed: {e}")));
                    }
                }
                if self.queue.is_idle() {
                    self.machine.on_playback_drained(now);
                }
            }
        }
    }

    fn sync_status(&self) {
        let state = self.machine.state();
        let pending = self.queue.len();
        update_status(&self.status, |s| {
            s.state = state;
            s.pending_playback = pending;
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::playback::MemorySink;
    use crate::config::AppConfig;
    use crate::session::delivery::RecordingSink;
    use crate::session::state::read_status;
    use crate::stt::{MockTranscriber, TranscriptionResponse};
    use crate::tts::MockSynthesizer;

    struct Rig {
        session: Session,
        handle: SessionHandle,
        sink: Arc<RecordingSink>,
        synth: Arc<MockSynthesizer>,
        seq: u64,
    }

    fn rig(stt: MockTranscriber, synth: MockSynthesizer, sink: RecordingSink) -> Rig {
        let snapshot = Arc::new(AppConfig::default().validate().unwrap());
        let sink = Arc::new(sink);
        let synth = Arc::new(synth);
        let session = Session::start(
            snapshot,
            SessionServices {
                stt: Arc::new(stt),
                synth: synth.clone(),
                output: Arc::new(MemorySink::default()),
                text_sink: sink.clone(),
            },
            Journal::disabled(),
        );
        let handle = session.handle();
        Rig {
            session,
            handle,
            sink,
            synth,
            seq: 0,
        }
    }

    impl Rig {
        /// 600 ms of speech followed by enough silence to end it.
        async fn say(&mut self) {
            for i in 0..54 {
                let level = if i < 20 { 0.3 } else { 0.0 };
                let frame = AudioFrame::new(self.seq, 16_000, vec![level; 480]);
                self.seq += 1;
                self.handle.send_frame(frame).await.unwrap();
            }
        }

        fn status(&self) -> crate::session::SessionStatus {
            read_status(&self.session.status())
        }

        async fn wait_for(&self, what: &str, cond: impl Fn(&Rig) -> bool) {
            let deadline = Instant::now() + Duration::from_secs(5);
            while !cond(self) {
                assert!(Instant::now() < deadline, "timed out waiting for {what}");
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }

        async fn stop(self) -> Vec<String> {
            self.handle.shutdown().await.unwrap();
            self.session.join().await.unwrap();
            self.sink.texts()
        }
    }

    fn quick_synth() -> MockSynthesizer {
        MockSynthesizer::new(2, Duration::from_millis(1))
    }

    fn long_synth() -> MockSynthesizer {
        MockSynthesizer::new(500, Duration::from_millis(10))
    }

    #[tokio::test]
    async fn wake_phrase_forwards_the_rest() {
        let mut rig = rig(
            MockTranscriber::texts(&["hey samantha what's the weather"]),
            quick_synth(),
            RecordingSink::default(),
        );
        rig.say().await;
        rig.wait_for("delivery", |r| !r.sink.texts().is_empty()).await;

        let status = rig.status();
        assert_eq!(status.state, SessionState::Active);
        assert_eq!(status.last_forwarded.as_deref(), Some("what's the weather"));
        assert_eq!(rig.stop().await, vec!["what's the weather"]);
    }

    #[tokio::test]
    async fn speech_before_wake_is_not_forwarded() {
        let mut rig = rig(
            MockTranscriber::texts(&["open the file", "samantha", "open the file"]),
            quick_synth(),
            RecordingSink::default(),
        );
        rig.say().await;
        rig.say().await;
        rig.say().await;
        rig.wait_for("delivery", |r| !r.sink.texts().is_empty()).await;
        assert_eq!(rig.stop().await, vec!["open the file"]);
    }

    #[tokio::test]
    async fn transcripts_are_applied_in_utterance_order() {
        let mut rig = rig(
            MockTranscriber::new(vec![
                (
                    Duration::from_millis(300),
                    Ok(TranscriptionResponse::speech("hey samantha first")),
                ),
                (Duration::ZERO, Ok(TranscriptionResponse::speech("second"))),
                (Duration::ZERO, Ok(TranscriptionResponse::speech("third"))),
            ]),
            quick_synth(),
            RecordingSink::default(),
        );
        rig.say().await;
        rig.say().await;
        rig.say().await;
        rig.wait_for("three deliveries", |r| r.sink.texts().len() == 3).await;
        assert_eq!(rig.stop().await, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn unavailable_transcription_keeps_state() {
        let mut rig = rig(
            MockTranscriber::new(vec![
                (Duration::ZERO, Ok(TranscriptionResponse::speech("hey samantha"))),
                (Duration::ZERO, Err(SttError::Unavailable("connection refused".into()))),
            ]),
            quick_synth(),
            RecordingSink::default(),
        );
        rig.say().await;
        rig.say().await;
        rig.wait_for("error status", |r| r.status().last_error.is_some()).await;

        let status = rig.status();
        assert_eq!(status.state, SessionState::Active);
        assert!(status.last_error.unwrap().contains("transcription unavailable"));
        assert!(rig.stop().await.is_empty());
    }

    #[tokio::test]
    async fn quiet_utterance_is_never_transcribed() {
        let stt = Arc::new(MockTranscriber::texts(&["hey samantha"]));
        let snapshot = Arc::new(AppConfig::default().validate().unwrap());
        let session = Session::start(
            snapshot,
            SessionServices {
                stt: stt.clone(),
                synth: Arc::new(quick_synth()),
                output: Arc::new(MemorySink::default()),
                text_sink: Arc::new(RecordingSink::default()),
            },
            Journal::disabled(),
        );
        let handle = session.handle();
        // Above the VAD gate, below the energy gate.
        for seq in 0..54 {
            let level = if seq < 20 { 0.02 } else { 0.0 };
            handle
                .send_frame(AudioFrame::new(seq, 16_000, vec![level; 480]))
                .await
                .unwrap();
        }
        handle.shutdown().await.unwrap();
        session.join().await.unwrap();
        assert_eq!(stt.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_delivery_is_reported_and_spoken() {
        let mut rig = rig(
            MockTranscriber::texts(&["hey samantha deploy it"]),
            quick_synth(),
            RecordingSink::failing(),
        );
        rig.say().await;
        rig.wait_for("notice", |r| !r.synth.requests().is_empty()).await;

        assert_eq!(rig.synth.requests(), vec![UNDELIVERED_NOTICE.to_string()]);
        assert!(rig.status().last_error.unwrap().starts_with("not delivered"));
        rig.stop().await;
    }

    #[tokio::test]
    async fn interrupt_stops_reply_and_empties_queue() {
        let mut rig = rig(
            MockTranscriber::texts(&["hey samantha", "stop"]),
            long_synth(),
            RecordingSink::default(),
        );
        rig.say().await;
        rig.wait_for("active", |r| r.status().state == SessionState::Active).await;

        rig.handle.speak("first long reply").await.unwrap();
        rig.handle.speak("second long reply").await.unwrap();
        rig.wait_for("speaking", |r| r.status().state == SessionState::Speaking).await;

        rig.say().await;
        rig.wait_for("interrupted", |r| r.status().state == SessionState::Active).await;
        assert!(rig.session.playback().is_idle());
        assert_eq!(rig.status().pending_playback, 0);
        rig.stop().await;
    }

    #[tokio::test]
    async fn skip_advances_to_next_reply() {
        let mut rig = rig(
            MockTranscriber::texts(&["hey samantha", "skip"]),
            long_synth(),
            RecordingSink::default(),
        );
        rig.say().await;
        rig.wait_for("active", |r| r.status().state == SessionState::Active).await;

        rig.handle.speak("first reply").await.unwrap();
        rig.handle.speak("second reply").await.unwrap();
        rig.handle.speak("third reply").await.unwrap();
        rig.wait_for("speaking", |r| r.status().state == SessionState::Speaking).await;
        assert_eq!(rig.status().pending_playback, 2);

        rig.say().await;
        rig.wait_for("second reply", |r| {
            r.session.playback().current_text().as_deref() == Some("second reply")
        })
        .await;
        assert_eq!(rig.session.playback().len(), 1);
        assert_eq!(rig.status().state, SessionState::Speaking);
        rig.stop().await;
    }

    #[tokio::test]
    async fn reply_heard_back_is_not_forwarded() {
        let reply = "the build finished without any errors today";
        let mut rig = rig(
            MockTranscriber::texts(&["hey samantha", reply, "ship it now"]),
            quick_synth(),
            RecordingSink::default(),
        );
        rig.say().await;
        rig.wait_for("active", |r| r.status().state == SessionState::Active).await;

        rig.handle.speak(reply).await.unwrap();
        rig.wait_for("reply played", |r| !r.synth.requests().is_empty() && r.session.playback().is_idle())
            .await;
        rig.wait_for("active again", |r| r.status().state == SessionState::Active).await;

        rig.say().await;
        rig.say().await;
        rig.wait_for("delivery", |r| !r.sink.texts().is_empty()).await;
        assert_eq!(rig.stop().await, vec!["ship it now"]);
    }

    #[tokio::test]
    async fn shutdown_waits_for_outstanding_transcription() {
        let mut rig = rig(
            MockTranscriber::new(vec![(
                Duration::from_millis(200),
                Ok(TranscriptionResponse::speech("hey samantha late words")),
            )]),
            quick_synth(),
            RecordingSink::default(),
        );
        rig.say().await;
        assert_eq!(rig.stop().await, vec!["late words"]);
    }

    #[tokio::test]
    async fn capture_close_flushes_partial_utterance() {
        let mut rig = rig(
            MockTranscriber::texts(&["hey samantha half a sentence"]),
            quick_synth(),
            RecordingSink::default(),
        );
        for seq in 0..20 {
            rig.handle
                .send_frame(AudioFrame::new(seq, 16_000, vec![0.3; 480]))
                .await
                .unwrap();
        }
        rig.seq = 20;
        rig.handle.capture_closed().await.unwrap();
        rig.wait_for("delivery", |r| !r.sink.texts().is_empty()).await;
        assert_eq!(rig.stop().await, vec!["half a sentence"]);
    }
}
