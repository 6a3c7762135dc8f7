//! Keyword phrase sets and transcript classification.
//!
//! Activation is lexical: every transcript is scanned for the configured
//! phrases after it has been normalised (see [`text`]).  The five phrase
//! lists are disjoint; a phrase configured in two lists is rejected when the
//! [`KeywordSet`] is built.
//!
//! ```text
//!   transcript ──► normalise ──► KeywordMatcher::classify(text, state, audible)
//!                                       │
//!                                       ▼
//!        Interrupt > Skip > FinishNow > Deactivate > Wake > None
//! ```

pub mod matcher;
pub mod profile;
pub mod text;

pub use matcher::{Classification, KeywordMatcher};
pub use profile::Profile;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeywordError {
    /// The same normalised phrase is configured in two lists.
    #[error("phrase {phrase:?} appears in both the {first} and {second} lists")]
    AmbiguousKeywordConfig {
        phrase: String,
        first: KeywordKind,
        second: KeywordKind,
    },

    #[error("the {0} list contains a phrase with no words")]
    EmptyPhrase(KeywordKind),

    #[error("at least one wake phrase is required")]
    NoWakePhrases,
}

// ---------------------------------------------------------------------------
// KeywordKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeywordKind {
    Wake,
    Deactivation,
    Interrupt,
    Skip,
    FinishNow,
}

impl KeywordKind {
    pub const ALL: [KeywordKind; 5] = [
        KeywordKind::Wake,
        KeywordKind::Deactivation,
        KeywordKind::Interrupt,
        KeywordKind::Skip,
        KeywordKind::FinishNow,
    ];

    /// Interrupt, skip and finish-now phrases.
    pub fn is_control(self) -> bool {
        matches!(self, Self::Interrupt | Self::Skip | Self::FinishNow)
    }
}

impl std::fmt::Display for KeywordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Wake => "wake",
            Self::Deactivation => "deactivation",
            Self::Interrupt => "interrupt",
            Self::Skip => "skip",
            Self::FinishNow => "finish-now",
        };
        f.write_str(label)
    }
}

// ---------------------------------------------------------------------------
// Phrase
// ---------------------------------------------------------------------------

/// A configured phrase in normalised form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phrase {
    text: String,
}

impl Phrase {
    fn parse(raw: &str) -> Option<Self> {
        let text = text::normalize(raw);
        if text.is_empty() {
            return None;
        }
        Some(Self { text })
    }

    /// Normalised phrase text (`"that's all"` → `"thats all"`).
    pub fn text(&self) -> &str {
        &self.text
    }
}

// ---------------------------------------------------------------------------
// KeywordSet
// ---------------------------------------------------------------------------

/// The five disjoint phrase lists, normalised at load time.
#[derive(Debug, Clone)]
pub struct KeywordSet {
    wake: Vec<Phrase>,
    deactivation: Vec<Phrase>,
    interrupt: Vec<Phrase>,
    skip: Vec<Phrase>,
    finish: Vec<Phrase>,
}

impl KeywordSet {
    /// Normalise and de-duplicate each list, then check that no phrase is in
    /// two lists.
    pub fn new<S: AsRef<str>>(
        wake: &[S],
        deactivation: &[S],
        interrupt: &[S],
        skip: &[S],
        finish: &[S],
    ) -> Result<Self, KeywordError> {
        let set = Self {
            wake: parse_list(KeywordKind::Wake, wake)?,
            deactivation: parse_list(KeywordKind::Deactivation, deactivation)?,
            interrupt: parse_list(KeywordKind::Interrupt, interrupt)?,
            skip: parse_list(KeywordKind::Skip, skip)?,
            finish: parse_list(KeywordKind::FinishNow, finish)?,
        };
        if set.wake.is_empty() {
            return Err(KeywordError::NoWakePhrases);
        }

        let mut seen: std::collections::HashMap<&str, KeywordKind> = std::collections::HashMap::new();
        for kind in KeywordKind::ALL {
            for phrase in set.phrases(kind) {
                if let Some(first) = seen.insert(phrase.text(), kind) {
                    return Err(KeywordError::AmbiguousKeywordConfig {
                        phrase: phrase.text().to_string(),
                        first,
                        second: kind,
                    });
                }
            }
        }
        Ok(set)
    }

    pub fn phrases(&self, kind: KeywordKind) -> &[Phrase] {
        match kind {
            KeywordKind::Wake => &self.wake,
            KeywordKind::Deactivation => &self.deactivation,
            KeywordKind::Interrupt => &self.interrupt,
            KeywordKind::Skip => &self.skip,
            KeywordKind::FinishNow => &self.finish,
        }
    }

    pub fn wake(&self) -> &[Phrase] {
        &self.wake
    }

    /// Every configured phrase, all lists.
    pub fn all_phrases(&self) -> impl Iterator<Item = &str> {
        KeywordKind::ALL
            .into_iter()
            .flat_map(move |kind| self.phrases(kind).iter().map(Phrase::text))
    }
}

fn parse_list<S: AsRef<str>>(kind: KeywordKind, raw: &[S]) -> Result<Vec<Phrase>, KeywordError> {
    let mut out: Vec<Phrase> = Vec::with_capacity(raw.len());
    for item in raw {
        let phrase = Phrase::parse(item.as_ref()).ok_or(KeywordError::EmptyPhrase(kind))?;
        if !out.contains(&phrase) {
            out.push(phrase);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phrases_are_normalised_and_deduplicated() {
        let set = KeywordSet::new(
            &["Hey Samantha", "  samantha "],
            &["That's all, Samantha", "thats all samantha"],
            &["STOP"],
            &["skip"],
            &["send it"],
        )
        .unwrap();

        let wake: Vec<_> = set.wake().iter().map(Phrase::text).collect();
        assert_eq!(wake, ["hey samantha", "samantha"]);
        assert_eq!(set.phrases(KeywordKind::Deactivation).len(), 1);
        assert_eq!(set.phrases(KeywordKind::Interrupt)[0].text(), "stop");
    }

    #[test]
    fn overlapping_lists_fail() {
        let err = KeywordSet::new(&["samantha"], &["bye"], &["stop"], &["Stop!"], &["send it"])
            .unwrap_err();
        assert_eq!(
            err,
            KeywordError::AmbiguousKeywordConfig {
                phrase: "stop".into(),
                first: KeywordKind::Interrupt,
                second: KeywordKind::Skip,
            }
        );
    }

    #[test]
    fn empty_phrase_fails() {
        let err = KeywordSet::new(&["samantha"], &["bye"], &["stop"], &["?!"], &["send it"])
            .unwrap_err();
        assert_eq!(err, KeywordError::EmptyPhrase(KeywordKind::Skip));
    }

    #[test]
    fn wake_list_is_required() {
        let empty: [&str; 0] = [];
        let err = KeywordSet::new(&empty, &["bye"], &["stop"], &["skip"], &["send it"]).unwrap_err();
        assert_eq!(err, KeywordError::NoWakePhrases);
    }

    #[test]
    fn all_phrases_covers_every_list() {
        let set = KeywordSet::new(&["samantha"], &["bye"], &["stop"], &["skip"], &["send it"])
            .unwrap();
        let all: Vec<_> = set.all_phrases().collect();
        assert_eq!(all, ["samantha", "bye", "stop", "skip", "send it"]);
    }
}
