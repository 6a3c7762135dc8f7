use super::text::{self, Normalized};
use super::{KeywordKind, KeywordSet, Phrase};
use crate::session::SessionState;

/// What a transcript means to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    None,
    /// A wake phrase; `remainder` is the speech that followed it, already cut
    /// before any finish-now phrase.
    Wake { remainder: String },
    Deactivate,
    Interrupt,
    Skip,
    /// A finish-now phrase; `before` is the speech that preceded it.
    FinishNow { before: String },
}

/// Category precedence, highest first.
const PRIORITY: [KeywordKind; 5] = [
    KeywordKind::Interrupt,
    KeywordKind::Skip,
    KeywordKind::FinishNow,
    KeywordKind::Deactivation,
    KeywordKind::Wake,
];

/// Categories listened for in each session state.
fn enabled(kind: KeywordKind, state: SessionState) -> bool {
    match state {
        SessionState::Idle => matches!(kind, KeywordKind::Wake | KeywordKind::Deactivation),
        SessionState::Active => !matches!(kind, KeywordKind::Interrupt | KeywordKind::Skip),
        SessionState::Speaking => true,
    }
}

#[derive(Debug, Clone, Copy)]
struct Span {
    start: usize,
    len: usize,
}

impl Span {
    fn end(self) -> usize {
        self.start + self.len
    }

    fn strictly_inside(self, outer: Span) -> bool {
        outer.start <= self.start && self.end() <= outer.end() && outer.len > self.len
    }
}

/// Classifies transcripts against a [`KeywordSet`].
///
/// Matching is case-insensitive and position-independent: a phrase counts
/// wherever it occurs as a substring of the normalised transcript, so
/// `"stopped"` carries `"stop"` and `"heysamantha"` carries `"samantha"`.
/// Two refinements apply on top of the category precedence:
///
/// * a control phrase that only occurs as part of a longer wake or
///   deactivation phrase does not count (`"that's all samantha"` is a
///   deactivation, not a finish-now);
/// * a control phrase that is present in `audible` (the reply currently or
///   recently played) is ignored unless the speaker said it at least twice.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    keywords: KeywordSet,
}

impl KeywordMatcher {
    pub fn new(keywords: KeywordSet) -> Self {
        Self { keywords }
    }

    pub fn keywords(&self) -> &KeywordSet {
        &self.keywords
    }

    pub fn classify(&self, transcript: &str, state: SessionState, audible: Option<&str>) -> Classification {
        let heard = Normalized::new(transcript);
        if heard.is_empty() {
            return Classification::None;
        }
        let audible = audible.map(Normalized::new).unwrap_or_default();

        let shells: Vec<Span> = [KeywordKind::Wake, KeywordKind::Deactivation]
            .into_iter()
            .flat_map(|kind| self.occurrences(kind, &heard))
            .collect();

        for kind in PRIORITY.into_iter().filter(|k| enabled(*k, state)) {
            let Some(span) = self.first_hit(kind, &heard, &audible, &shells) else {
                continue;
            };
            return match kind {
                KeywordKind::Interrupt => Classification::Interrupt,
                KeywordKind::Skip => Classification::Skip,
                KeywordKind::Deactivation => Classification::Deactivate,
                KeywordKind::FinishNow => Classification::FinishNow {
                    before: text::tidy(&transcript[..heard.source_start(span.start)]),
                },
                KeywordKind::Wake => {
                    let rest = &transcript[heard.source_end(span.end())..];
                    Classification::Wake {
                        remainder: self.cut_at_finish(rest),
                    }
                }
            };
        }
        Classification::None
    }

    fn occurrences<'a>(&'a self, kind: KeywordKind, heard: &'a Normalized) -> impl Iterator<Item = Span> + 'a {
        self.keywords.phrases(kind).iter().flat_map(move |p| {
            heard.find_all(p.text()).map(move |start| Span {
                start,
                len: p.text().len(),
            })
        })
    }

    /// Earliest qualifying occurrence of `kind`, longest phrase on ties.
    fn first_hit(&self, kind: KeywordKind, heard: &Normalized, audible: &Normalized, shells: &[Span]) -> Option<Span> {
        self.keywords
            .phrases(kind)
            .iter()
            .filter(|p| !kind.is_control() || !self_spoken(p, heard, audible))
            .flat_map(|p| {
                heard.find_all(p.text()).map(move |start| Span {
                    start,
                    len: p.text().len(),
                })
            })
            .filter(|span| !kind.is_control() || !shells.iter().any(|s| span.strictly_inside(*s)))
            .min_by(|a, b| a.start.cmp(&b.start).then(b.len.cmp(&a.len)))
    }

    fn cut_at_finish(&self, fragment: &str) -> String {
        let heard = Normalized::new(fragment);
        let cut = self
            .occurrences(KeywordKind::FinishNow, &heard)
            .map(|s| s.start)
            .min();
        match cut {
            Some(pos) => text::tidy(&fragment[..heard.source_start(pos)]),
            None => text::tidy(fragment),
        }
    }
}

fn self_spoken(phrase: &Phrase, heard: &Normalized, audible: &Normalized) -> bool {
    audible.contains(phrase.text()) && heard.count(phrase.text()) < 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyword::Profile;

    fn matcher() -> KeywordMatcher {
        let p = Profile::named("samantha").unwrap();
        KeywordMatcher::new(KeywordSet::new(p.wake, p.deactivation, p.interrupt, p.skip, p.finish).unwrap())
    }

    #[test]
    fn interrupt_is_case_and_position_insensitive() {
        let m = matcher();
        assert_eq!(m.classify("please STOP now", SessionState::Speaking, None), Classification::Interrupt);
        assert_eq!(m.classify("stop", SessionState::Speaking, None), Classification::Interrupt);
    }

    #[test]
    fn control_words_are_ignored_outside_playback() {
        let m = matcher();
        assert_eq!(m.classify("stop", SessionState::Active, None), Classification::None);
        assert_eq!(m.classify("skip", SessionState::Idle, None), Classification::None);
    }

    #[test]
    fn wake_mid_text_strips_the_phrase() {
        let m = matcher();
        assert_eq!(
            m.classify("hey samantha what's the weather", SessionState::Idle, None),
            Classification::Wake {
                remainder: "what's the weather".into()
            }
        );
        assert_eq!(
            m.classify("so, Samantha, open the file", SessionState::Idle, None),
            Classification::Wake {
                remainder: "open the file".into()
            }
        );
    }

    #[test]
    fn similar_words_do_not_wake() {
        let m = matcher();
        assert_eq!(m.classify("the same as before", SessionState::Idle, None), Classification::None);
    }

    #[test]
    fn inflected_control_word_interrupts() {
        let m = matcher();
        assert_eq!(
            m.classify("okay it stopped there", SessionState::Speaking, None),
            Classification::Interrupt
        );
        assert_eq!(
            m.classify("please skipping ahead", SessionState::Speaking, None),
            Classification::Skip
        );
    }

    #[test]
    fn wake_inside_a_longer_word() {
        let m = matcher();
        assert_eq!(
            m.classify("samantha's here, open the file", SessionState::Idle, None),
            Classification::Wake {
                remainder: "here, open the file".into()
            }
        );
        assert_eq!(
            m.classify("heysamantha open the file", SessionState::Idle, None),
            Classification::Wake {
                remainder: "open the file".into()
            }
        );
    }

    #[test]
    fn finish_now_inside_a_word_cuts_at_word_start() {
        let m = matcher();
        assert_eq!(
            m.classify("rename the module, resend it", SessionState::Active, None),
            Classification::FinishNow {
                before: "rename the module".into()
            }
        );
    }

    #[test]
    fn wake_remainder_stops_at_finish_phrase() {
        let m = matcher();
        assert_eq!(
            m.classify("samantha fix the tests send it please", SessionState::Idle, None),
            Classification::Wake {
                remainder: "fix the tests".into()
            }
        );
    }

    #[test]
    fn deactivate_outranks_wake() {
        let m = matcher();
        assert_eq!(
            m.classify("okay samantha go to sleep", SessionState::Active, None),
            Classification::Deactivate
        );
        assert_eq!(
            m.classify("samantha sleep", SessionState::Idle, None),
            Classification::Deactivate
        );
    }

    #[test]
    fn control_inside_deactivation_phrase_is_not_control() {
        let m = matcher();
        assert_eq!(
            m.classify("that's all samantha", SessionState::Active, None),
            Classification::Deactivate
        );
        assert_eq!(
            m.classify("that's all", SessionState::Active, None),
            Classification::FinishNow { before: String::new() }
        );
    }

    #[test]
    fn finish_now_keeps_preceding_text() {
        let m = matcher();
        assert_eq!(
            m.classify("refactor the parser, over and out", SessionState::Active, None),
            Classification::FinishNow {
                before: "refactor the parser".into()
            }
        );
    }

    #[test]
    fn control_outranks_wake_during_playback() {
        let m = matcher();
        assert_eq!(
            m.classify("samantha skip", SessionState::Speaking, None),
            Classification::Skip
        );
    }

    #[test]
    fn self_spoken_control_word_is_excluded() {
        let m = matcher();
        let audible = Some("You can stop the server with control C.");
        assert_eq!(m.classify("stop the server", SessionState::Speaking, audible), Classification::None);
        assert_eq!(m.classify("stop stop", SessionState::Speaking, audible), Classification::Interrupt);
        assert_eq!(m.classify("quiet", SessionState::Speaking, audible), Classification::Interrupt);
    }

    #[test]
    fn empty_text_is_none() {
        let m = matcher();
        assert_eq!(m.classify("  ...  ", SessionState::Speaking, None), Classification::None);
    }
}
