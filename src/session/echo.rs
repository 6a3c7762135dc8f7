//! Self-echo detection.
//!
//! The microphone stays open while replies play, so the assistant's own
//! voice comes back as transcripts.  [`EchoSuppressor`] remembers the reply
//! that is playing (and, for `tail` afterwards, the one that just finished)
//! and flags transcripts that are a close match of it.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use crate::keyword::text;

/// Fewer transcript words than this are judged by containment only.
const MIN_OVERLAP_WORDS: usize = 4;

#[derive(Debug)]
pub struct EchoSuppressor {
    tail: Duration,
    overlap: f32,
    current: Option<String>,
    last: Option<(String, Instant)>,
}

impl EchoSuppressor {
    /// `tail`: how long a finished reply can still be heard (room echo,
    /// device latency).  `overlap`: fraction of transcript words found in the
    /// reply at or above which the transcript counts as echo.
    pub fn new(tail: Duration, overlap: f32) -> Self {
        Self {
            tail,
            overlap,
            current: None,
            last: None,
        }
    }

    pub fn on_started(&mut self, text: &str) {
        self.current = Some(text.to_string());
    }

    pub fn on_finished(&mut self, now: Instant) {
        if let Some(text) = self.current.take() {
            self.last = Some((text, now));
        }
    }

    /// Reply text that may still reach the microphone at `now`.
    pub fn audible_text(&self, now: Instant) -> Option<&str> {
        if let Some(text) = &self.current {
            return Some(text);
        }
        match &self.last {
            Some((text, finished)) if now.saturating_duration_since(*finished) <= self.tail => Some(text),
            _ => None,
        }
    }

    /// `true` when `transcript` is most likely the reply heard back.
    pub fn is_echo(&self, transcript: &str, now: Instant) -> bool {
        let Some(reply) = self.audible_text(now) else {
            return false;
        };
        let heard = text::normalize(transcript);
        let spoken = text::normalize(reply);
        if heard.is_empty() || spoken.is_empty() {
            return false;
        }

        // Only the heard text inside the reply counts; a reply inside a longer
        // transcript is the speaker talking over it.
        if format!(" {spoken} ").contains(&format!(" {heard} ")) {
            return true;
        }
        let words: Vec<&str> = heard.split(' ').collect();
        if words.len() < MIN_OVERLAP_WORDS {
            return false;
        }

        let vocabulary: HashSet<&str> = spoken.split(' ').collect();
        let shared = words.iter().filter(|w| vocabulary.contains(*w)).count();
        shared as f32 / words.len() as f32 >= self.overlap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPLY: &str = "The forecast for tomorrow is sunny with a light breeze from the west.";

    fn playing() -> EchoSuppressor {
        let mut echo = EchoSuppressor::new(Duration::from_secs(10), 0.6);
        echo.on_started(REPLY);
        echo
    }

    #[test]
    fn nothing_playing_is_never_echo() {
        let echo = EchoSuppressor::new(Duration::from_secs(10), 0.6);
        assert!(!echo.is_echo("the forecast for tomorrow", Instant::now()));
    }

    #[test]
    fn fragment_of_reply_is_echo() {
        assert!(playing().is_echo("forecast for tomorrow is sunny", Instant::now()));
    }

    #[test]
    fn near_copy_is_echo() {
        // Recogniser dropped and garbled a few words.
        let heard = "the forecast for tomorrow is sunny with light breeze from west wind";
        assert!(playing().is_echo(heard, Instant::now()));
    }

    #[test]
    fn unrelated_speech_is_not_echo() {
        assert!(!playing().is_echo("open the settings file and add a test", Instant::now()));
    }

    #[test]
    fn partial_word_match_is_not_containment() {
        let mut echo = EchoSuppressor::new(Duration::from_secs(10), 0.6);
        echo.on_started("westward");
        assert!(!echo.is_echo("west", Instant::now()));
    }

    #[test]
    fn speech_containing_a_short_reply_is_forwarded() {
        let mut echo = EchoSuppressor::new(Duration::from_secs(10), 0.6);
        echo.on_started("Done.");
        let now = Instant::now();
        assert!(echo.is_echo("done", now));
        assert!(!echo.is_echo("done now run the tests and deploy to staging", now));
        assert!(!echo.is_echo("samantha next one", now));
    }

    #[test]
    fn follow_up_sharing_some_reply_words_is_not_echo() {
        assert!(!playing().is_echo("what is the forecast for next week", Instant::now()));
    }

    #[test]
    fn short_reply_tail_keeps_user_speech() {
        let mut echo = EchoSuppressor::new(Duration::from_secs(10), 0.6);
        echo.on_started("Okay.");
        let done = Instant::now();
        echo.on_finished(done);
        let later = done + Duration::from_secs(1);
        assert!(echo.is_echo("okay", later));
        assert!(!echo.is_echo("okay samantha skip the tests", later));
    }

    #[test]
    fn finished_reply_expires_after_tail() {
        let mut echo = playing();
        let done = Instant::now();
        echo.on_finished(done);
        assert!(echo.is_echo("sunny with a light breeze", done + Duration::from_secs(5)));
        assert!(!echo.is_echo("sunny with a light breeze", done + Duration::from_secs(11)));
        assert_eq!(echo.audible_text(done + Duration::from_secs(11)), None);
    }
}
