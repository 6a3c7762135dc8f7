//! Clean-up of recogniser output.
//!
//! Whisper-style recognisers annotate non-speech with tags such as
//! `[BLANK_AUDIO]`, `(coughing)` or `♪♪`, and hallucinate stock phrases on
//! near-silent input.  The transcription client strips the tags and flags
//! the hallucinations so the session only ever sees real speech.

use std::sync::OnceLock;

use regex::Regex;

use crate::keyword::text;

fn sound_tags() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[.*?\]|\(.*?\)|♪+").expect("static regex"))
}

fn punctuation() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s']").expect("static regex"))
}

const NOISE_PHRASES: &[&str] = &["thank you for watching", "look at the next video"];

const NOISE_WORDS: &[&str] = &[
    "click", "clap", "ding", "bell", "tick", "thud", "bang", "engine", "revving", "keyboard",
    "typing", "noise", "silence", "static", "hum", "buzz", "music",
];

/// Remove sound tags and punctuation (apostrophes kept), collapse
/// whitespace, lowercase.
///
/// ```rust
/// use voice_relay::stt::sanitize_transcript;
///
/// assert_eq!(
///     sanitize_transcript(" [Music] Hey, Samantha!  What's up? (laughs) ♪♪"),
///     "hey samantha what's up"
/// );
/// ```
pub fn sanitize_transcript(raw: &str) -> String {
    let stripped = sound_tags().replace_all(raw, " ");
    let stripped = punctuation().replace_all(&stripped, "");
    stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// `true` when sanitised text is background noise rather than speech.
///
/// Text containing any configured keyword phrase is always speech, however
/// short.
pub fn is_noise<'a, I>(sanitized: &str, keywords: I) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    if sanitized.chars().count() < 3 {
        return !contains_keyword(sanitized, keywords);
    }
    if contains_keyword(sanitized, keywords) {
        return false;
    }
    if NOISE_PHRASES.iter().any(|p| sanitized.contains(p)) {
        return true;
    }
    NOISE_WORDS.contains(&sanitized)
}

fn contains_keyword<'a, I>(sanitized: &str, keywords: I) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    let normalized = format!(" {} ", text::normalize(sanitized));
    keywords
        .into_iter()
        .any(|k| !k.is_empty() && normalized.contains(&format!(" {k} ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_and_punctuation() {
        assert_eq!(sanitize_transcript("[BLANK_AUDIO]"), "");
        assert_eq!(sanitize_transcript("Stop. Stop!"), "stop stop");
        assert_eq!(sanitize_transcript("it's (sigh) fine"), "it's fine");
    }

    #[test]
    fn short_text_is_noise() {
        assert!(is_noise("", ["samantha"]));
        assert!(is_noise("uh", ["samantha"]));
    }

    #[test]
    fn hallucinated_phrases_are_noise() {
        assert!(is_noise("thank you for watching", ["samantha"]));
        assert!(is_noise("music", ["samantha"]));
    }

    #[test]
    fn keywords_are_never_noise() {
        assert!(!is_noise("hum samantha", ["samantha"]));
        assert!(!is_noise("ok", ["ok"]));
    }

    #[test]
    fn ordinary_speech_is_not_noise() {
        assert!(!is_noise("open the readme", ["samantha"]));
        assert!(!is_noise("typing is slow today", ["samantha"]));
    }
}
