//! The session state machine.
//!
//! Pure and clock-free: every input carries the `Instant` it happened at and
//! every decision comes back as a list of [`Effect`]s for the runner to carry
//! out.  Nothing else in the crate changes [`SessionState`].
//!
//! ```text
//!  state     input                     next      effects
//!  ───────── ───────────────────────── ───────── ──────────────────────────────
//!  Idle      Wake{remainder}           Active*   Chime(Activate), Forward(rem)
//!  Active    plain speech              Active    Forward(text)  (after gap)
//!  Active    FinishNow{before}         Active    Forward(pending + before)
//!  Active/Sp Deactivate                Idle      Forward(pending), Chime(Deactivate)
//!  Speaking  Interrupt                 Active    Interrupt, Chime(Stop)
//!  Speaking  Skip                      Speaking  Skip, Chime(Skip)
//!  Speaking  Wake{remainder}           Active    Interrupt, Forward(rem)
//!  Speaking  plain speech              Speaking  (ignored)
//!  Active/Sp tick, idle ≥ timeout      Idle      (none, pending discarded)
//!
//!  * Speaking instead when a reply is already playing.
//! ```

use std::time::{Duration, Instant};

use crate::audio::Cue;
use crate::config::SessionSnapshot;
use crate::keyword::Classification;

use super::state::SessionState;

/// Something the runner must do as the result of a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Chime(Cue),
    /// Deliver this text to the assistant.
    Forward(String),
    /// Stop the current reply and drop every queued one.
    Interrupt,
    /// Drop the current reply only.
    Skip,
}

#[derive(Debug)]
pub struct SessionStateMachine {
    state: SessionState,
    last_activity: Instant,
    pending: Vec<String>,
    pending_since: Option<Instant>,
    playback_active: bool,
    activity_timeout: Duration,
    message_gap: Duration,
}

impl SessionStateMachine {
    pub fn new(activity_timeout: Duration, message_gap: Duration, now: Instant) -> Self {
        Self {
            state: SessionState::Idle,
            last_activity: now,
            pending: Vec::new(),
            pending_since: None,
            playback_active: false,
            activity_timeout,
            message_gap,
        }
    }

    pub fn from_snapshot(snapshot: &SessionSnapshot, now: Instant) -> Self {
        Self::new(snapshot.activity_timeout(), snapshot.message_gap(), now)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Speech accumulated but not yet forwarded.
    pub fn pending_text(&self) -> Option<String> {
        (!self.pending.is_empty()).then(|| self.pending.join(" "))
    }

    // -----------------------------------------------------------------------
    // Inputs
    // -----------------------------------------------------------------------

    /// A transcript, already echo-filtered and classified.
    pub fn on_transcript(&mut self, text: &str, class: Classification, now: Instant) -> Vec<Effect> {
        let mut effects = Vec::new();

        match (self.state, class) {
            (SessionState::Idle, Classification::Wake { remainder }) => {
                log::info!("session: wake phrase heard");
                self.state = if self.playback_active {
                    SessionState::Speaking
                } else {
                    SessionState::Active
                };
                self.touch(now);
                effects.push(Effect::Chime(Cue::Activate));
                self.accept(remainder, now, &mut effects);
            }
            (SessionState::Idle, _) => {}

            (_, Classification::Deactivate) => {
                log::info!("session: deactivated");
                self.flush(&mut effects);
                self.state = SessionState::Idle;
                effects.push(Effect::Chime(Cue::Deactivate));
            }

            (SessionState::Speaking, Classification::Interrupt) => {
                log::info!("session: reply interrupted");
                self.playback_active = false;
                self.state = SessionState::Active;
                self.touch(now);
                effects.push(Effect::Interrupt);
                effects.push(Effect::Chime(Cue::Stop));
            }
            (SessionState::Speaking, Classification::Skip) => {
                log::info!("session: reply skipped");
                self.touch(now);
                effects.push(Effect::Skip);
                effects.push(Effect::Chime(Cue::Skip));
            }
            (SessionState::Speaking, Classification::Wake { remainder }) => {
                log::info!("session: redirected during reply");
                self.playback_active = false;
                self.state = SessionState::Active;
                self.touch(now);
                effects.push(Effect::Interrupt);
                self.accept(remainder, now, &mut effects);
            }

            (_, Classification::FinishNow { before }) => {
                self.touch(now);
                if !before.is_empty() {
                    self.pending.push(before);
                }
                self.flush(&mut effects);
            }

            (SessionState::Active, Classification::Wake { remainder }) => {
                self.touch(now);
                self.accept(remainder, now, &mut effects);
            }
            (SessionState::Active, Classification::None) => {
                self.touch(now);
                self.accept(text.trim().to_string(), now, &mut effects);
            }

            // Interrupt / Skip are not listened for outside a reply, and
            // plain speech over a reply is not forwarded.
            (SessionState::Active, Classification::Interrupt | Classification::Skip)
            | (SessionState::Speaking, Classification::None) => {}
        }

        effects
    }

    /// A reply started playing.
    pub fn on_playback_started(&mut self, now: Instant) {
        self.playback_active = true;
        if self.state == SessionState::Active {
            self.state = SessionState::Speaking;
        }
        self.touch(now);
    }

    /// The playback queue ran dry.
    pub fn on_playback_drained(&mut self, now: Instant) {
        self.playback_active = false;
        if self.state == SessionState::Speaking {
            self.state = SessionState::Active;
        }
        self.touch(now);
    }

    /// Periodic timer: message-gap flush and the inactivity timeout.
    pub fn on_tick(&mut self, now: Instant) -> Vec<Effect> {
        let mut effects = Vec::new();

        if self.state.is_listening()
            && !self.playback_active
            && now.saturating_duration_since(self.last_activity) >= self.activity_timeout
        {
            log::info!(
                "session: no activity for {:?}; returning to idle",
                self.activity_timeout
            );
            self.state = SessionState::Idle;
            self.pending.clear();
            self.pending_since = None;
            return effects;
        }

        if let Some(since) = self.pending_since {
            if now.saturating_duration_since(since) >= self.message_gap {
                self.flush(&mut effects);
            }
        }
        effects
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn touch(&mut self, now: Instant) {
        self.last_activity = now;
    }

    fn accept(&mut self, text: String, now: Instant, effects: &mut Vec<Effect>) {
        if text.is_empty() {
            return;
        }
        self.pending.push(text);
        self.pending_since = Some(now);
        if self.message_gap.is_zero() {
            self.flush(effects);
        }
    }

    fn flush(&mut self, effects: &mut Vec<Effect>) {
        self.pending_since = None;
        if let Some(text) = self.pending_text() {
            self.pending.clear();
            effects.push(Effect::Forward(text));
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
    use crate::keyword::KeywordMatcher;

    const TIMEOUT: Duration = Duration::from_secs(30 * 60);

    struct Harness {
        machine: SessionStateMachine,
        matcher: KeywordMatcher,
        now: Instant,
    }

    impl Harness {
        fn new(gap: Duration) -> Self {
            let now = Instant::now();
            let snapshot = AppConfig::default().validate().unwrap();
            Self {
                machine: SessionStateMachine::new(TIMEOUT, gap, now),
                matcher: KeywordMatcher::new(snapshot.keywords),
                now,
            }
        }

        fn hear(&mut self, text: &str) -> Vec<Effect> {
            let class = self.matcher.classify(text, self.machine.state(), None);
            self.machine.on_transcript(text, class, self.now)
        }

        fn advance(&mut self, by: Duration) -> Vec<Effect> {
            self.now += by;
            self.machine.on_tick(self.now)
        }
    }

    fn forwarded(effects: &[Effect]) -> Vec<&str> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Forward(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn wake_mid_text_activates_and_forwards_rest() {
        let mut h = Harness::new(Duration::ZERO);
        let effects = h.hear("hey samantha what's the weather");
        assert_eq!(h.machine.state(), SessionState::Active);
        assert_eq!(effects[0], Effect::Chime(Cue::Activate));
        assert_eq!(forwarded(&effects), vec!["what's the weather"]);
    }

    #[test]
    fn idle_ignores_plain_speech() {
        let mut h = Harness::new(Duration::ZERO);
        assert!(h.hear("what's the weather").is_empty());
        assert_eq!(h.machine.state(), SessionState::Idle);
    }

    #[test]
    fn active_forwards_plain_speech() {
        let mut h = Harness::new(Duration::ZERO);
        h.hear("hey samantha");
        assert_eq!(forwarded(&h.hear("run the tests")), vec!["run the tests"]);
        assert_eq!(h.machine.state(), SessionState::Active);
    }

    #[test]
    fn deactivate_returns_to_idle_with_chime() {
        let mut h = Harness::new(Duration::ZERO);
        h.hear("hey samantha");
        let effects = h.hear("that's all samantha");
        assert_eq!(h.machine.state(), SessionState::Idle);
        assert_eq!(effects, vec![Effect::Chime(Cue::Deactivate)]);
    }

    #[test]
    fn deactivate_keeps_playback_running() {
        let mut h = Harness::new(Duration::ZERO);
        h.hear("hey samantha");
        h.machine.on_playback_started(h.now);
        let effects = h.hear("that's all samantha");
        assert_eq!(h.machine.state(), SessionState::Idle);
        assert!(!effects.contains(&Effect::Interrupt));
        assert!(!effects.contains(&Effect::Skip));
    }

    #[test]
    fn interrupt_while_speaking_returns_to_active() {
        let mut h = Harness::new(Duration::ZERO);
        h.hear("hey samantha");
        h.machine.on_playback_started(h.now);
        assert_eq!(h.machine.state(), SessionState::Speaking);
        let effects = h.hear("please STOP now");
        assert_eq!(effects, vec![Effect::Interrupt, Effect::Chime(Cue::Stop)]);
        assert_eq!(h.machine.state(), SessionState::Active);
    }

    #[test]
    fn skip_stays_speaking_until_queue_drains() {
        let mut h = Harness::new(Duration::ZERO);
        h.hear("hey samantha");
        h.machine.on_playback_started(h.now);
        let effects = h.hear("skip");
        assert_eq!(effects, vec![Effect::Skip, Effect::Chime(Cue::Skip)]);
        assert_eq!(h.machine.state(), SessionState::Speaking);
        h.machine.on_playback_drained(h.now);
        assert_eq!(h.machine.state(), SessionState::Active);
    }

    #[test]
    fn control_words_outside_reply_are_plain_speech() {
        let mut h = Harness::new(Duration::ZERO);
        h.hear("hey samantha");
        assert_eq!(forwarded(&h.hear("stop the server")), vec!["stop the server"]);
    }

    #[test]
    fn speech_over_reply_is_not_forwarded() {
        let mut h = Harness::new(Duration::ZERO);
        h.hear("hey samantha");
        h.machine.on_playback_started(h.now);
        assert!(h.hear("and also the tests").is_empty());
    }

    #[test]
    fn wake_during_reply_redirects() {
        let mut h = Harness::new(Duration::ZERO);
        h.hear("hey samantha");
        h.machine.on_playback_started(h.now);
        let effects = h.hear("hey samantha actually use python");
        assert_eq!(effects[0], Effect::Interrupt);
        assert_eq!(forwarded(&effects), vec!["actually use python"]);
        assert_eq!(h.machine.state(), SessionState::Active);
    }

    #[test]
    fn message_gap_batches_until_finish_now() {
        let mut h = Harness::new(Duration::from_secs(5));
        assert!(forwarded(&h.hear("hey samantha write a function")).is_empty());
        assert!(forwarded(&h.hear("that parses dates")).is_empty());
        let effects = h.hear("and returns utc send it");
        assert_eq!(
            forwarded(&effects),
            vec!["write a function that parses dates and returns utc"]
        );
        assert_eq!(h.machine.pending_text(), None);
    }

    #[test]
    fn message_gap_flushes_on_tick() {
        let mut h = Harness::new(Duration::from_secs(5));
        h.hear("hey samantha first part");
        assert!(h.advance(Duration::from_secs(2)).is_empty());
        let effects = h.advance(Duration::from_secs(3));
        assert_eq!(forwarded(&effects), vec!["first part"]);
    }

    #[test]
    fn deactivate_flushes_pending_text_first() {
        let mut h = Harness::new(Duration::from_secs(5));
        h.hear("hey samantha rename the module");
        let effects = h.hear("that's all samantha");
        assert_eq!(
            effects,
            vec![
                Effect::Forward("rename the module".into()),
                Effect::Chime(Cue::Deactivate)
            ]
        );
    }

    #[test]
    fn inactivity_timeout_is_silent() {
        let mut h = Harness::new(Duration::ZERO);
        h.hear("hey samantha");
        assert!(h.advance(Duration::from_secs(29 * 60)).is_empty());
        assert_eq!(h.machine.state(), SessionState::Active);
        let effects = h.advance(Duration::from_secs(60));
        assert!(effects.is_empty());
        assert_eq!(h.machine.state(), SessionState::Idle);
    }

    #[test]
    fn timeout_discards_pending_text() {
        let mut h = Harness::new(Duration::from_secs(60 * 60));
        h.hear("hey samantha half a thought");
        assert!(h.advance(TIMEOUT).is_empty());
        assert_eq!(h.machine.pending_text(), None);
    }

    #[test]
    fn no_timeout_while_reply_plays() {
        let mut h = Harness::new(Duration::ZERO);
        h.hear("hey samantha");
        h.machine.on_playback_started(h.now);
        h.advance(TIMEOUT * 2);
        assert_eq!(h.machine.state(), SessionState::Speaking);
    }

    #[test]
    fn reply_while_idle_does_not_activate() {
        let mut h = Harness::new(Duration::ZERO);
        h.machine.on_playback_started(h.now);
        assert_eq!(h.machine.state(), SessionState::Idle);
        h.hear("hey samantha");
        assert_eq!(h.machine.state(), SessionState::Speaking);
    }
}
