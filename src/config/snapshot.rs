//! Immutable, validated configuration handed to every session component.
//!
//! `SessionSnapshot` is built once at startup by [`AppConfig::validate`] and
//! shared as `Arc<SessionSnapshot>`.  Components never read the TOML structs
//! or the environment directly.

use std::time::Duration;

use regex::{Regex, RegexBuilder};
use thiserror::Error;

use super::settings::{AppConfig, AudioConfig, InjectionConfig, SessionConfig, SttConfig, TtsConfig};
use crate::inject::resolver::{KnownApp, ResolveError};
use crate::keyword::{KeywordError, KeywordSet, Profile};

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Configuration problems.  All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Keywords(#[from] KeywordError),

    #[error(transparent)]
    Target(#[from] ResolveError),

    #[error("invalid AI process pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("unknown keyword profile {0:?}")]
    UnknownProfile(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// SessionSnapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub audio: AudioConfig,
    pub session: SessionConfig,
    pub stt: SttConfig,
    pub tts: TtsConfig,
    pub injection: InjectionConfig,
    /// Normalised, disjoint phrase sets.
    pub keywords: KeywordSet,
    /// Resolved voice identity (explicit setting or the profile's voice).
    pub voice: String,
    /// Compiled, case-insensitive AI process pattern.
    pub ai_process: Regex,
    /// Validated target override.
    pub target_override: Option<&'static KnownApp>,
}

impl SessionSnapshot {
    pub(crate) fn build(config: &AppConfig) -> Result<Self, ConfigError> {
        check_audio(&config.audio)?;
        check_session(&config.session)?;

        let profile = Profile::named(&config.keywords.profile)
            .ok_or_else(|| ConfigError::UnknownProfile(config.keywords.profile.clone()))?;
        let kw = &config.keywords;
        let pick = |explicit: &Option<Vec<String>>, builtin: &[&str]| -> Vec<String> {
            explicit
                .clone()
                .unwrap_or_else(|| builtin.iter().map(|s| s.to_string()).collect())
        };
        let keywords = KeywordSet::new(
            &pick(&kw.wake_phrases, profile.wake)[..],
            &pick(&kw.deactivation_phrases, profile.deactivation)[..],
            &pick(&kw.interrupt_phrases, profile.interrupt)[..],
            &pick(&kw.skip_phrases, profile.skip)[..],
            &pick(&kw.finish_phrases, profile.finish)[..],
        )?;

        let pattern = config.injection.ai_process_pattern.clone();
        let ai_process = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .map_err(|source| ConfigError::Pattern { pattern, source })?;

        let target_override = match config.injection.target_override.as_deref() {
            Some(name) => Some(
                KnownApp::find(name).ok_or_else(|| ResolveError::UnknownOverride(name.into()))?,
            ),
            None => None,
        };

        let voice = config
            .tts
            .voice
            .clone()
            .unwrap_or_else(|| profile.voice.to_string());

        Ok(Self {
            audio: config.audio.clone(),
            session: config.session.clone(),
            stt: config.stt.clone(),
            tts: config.tts.clone(),
            injection: config.injection.clone(),
            keywords,
            voice,
            ai_process,
            target_override,
        })
    }

    pub fn frame_duration(&self) -> Duration {
        Duration::from_millis(u64::from(self.audio.frame_ms))
    }

    pub fn samples_per_frame(&self) -> usize {
        (self.audio.sample_rate as usize * self.audio.frame_ms as usize) / 1_000
    }

    pub fn silence_threshold(&self) -> Duration {
        Duration::from_millis(self.audio.silence_threshold_ms)
    }

    pub fn barge_in_silence(&self) -> Duration {
        Duration::from_millis(self.audio.barge_in_silence_ms)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.audio.grace_period_ms)
    }

    pub fn min_utterance(&self) -> Duration {
        Duration::from_millis(self.audio.min_utterance_ms)
    }

    pub fn max_utterance(&self) -> Duration {
        Duration::try_from_secs_f32(self.audio.max_utterance_secs)
            .map_or(Duration::from_secs(MAX_UTTERANCE_SECS as u64), |d| {
                d.min(Duration::from_secs(MAX_UTTERANCE_SECS as u64))
            })
    }

    pub fn activity_timeout(&self) -> Duration {
        Duration::from_secs(self.session.activity_timeout_secs)
    }

    pub fn message_gap(&self) -> Duration {
        Duration::from_millis(self.session.message_gap_ms)
    }

    pub fn echo_tail(&self) -> Duration {
        Duration::from_secs(self.session.echo_tail_secs)
    }

    pub fn transcription_timeout(&self) -> Duration {
        Duration::from_secs(self.session.transcription_timeout_secs)
    }
}

/// Longest single recording accepted in `audio.max_utterance_secs`.
const MAX_UTTERANCE_SECS: f32 = 3_600.0;

fn check_audio(audio: &AudioConfig) -> Result<(), ConfigError> {
    if audio.sample_rate == 0 || audio.frame_ms == 0 {
        return Err(ConfigError::Invalid(
            "audio.sample_rate and audio.frame_ms must be positive".into(),
        ));
    }
    if audio.silence_threshold_ms == 0 || audio.barge_in_silence_ms == 0 {
        return Err(ConfigError::Invalid("silence thresholds must be positive".into()));
    }
    if !(audio.max_utterance_secs > 0.0 && audio.max_utterance_secs <= MAX_UTTERANCE_SECS) {
        return Err(ConfigError::Invalid(format!(
            "audio.max_utterance_secs must be in (0, {MAX_UTTERANCE_SECS}]"
        )));
    }
    if !(0.0..1.0).contains(&audio.min_audio_energy) {
        return Err(ConfigError::Invalid(
            "audio.min_audio_energy must be in [0.0, 1.0)".into(),
        ));
    }
    Ok(())
}

fn check_session(session: &SessionConfig) -> Result<(), ConfigError> {
    if !(session.echo_overlap > 0.0 && session.echo_overlap <= 1.0) {
        return Err(ConfigError::Invalid(
            "session.echo_overlap must be in (0.0, 1.0]".into(),
        ));
    }
    if session.transcription_timeout_secs == 0 {
        return Err(ConfigError::Invalid(
            "session.transcription_timeout_secs must be positive".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InjectionMode;

    #[test]
    fn default_config_validates() {
        let snap = AppConfig::default().validate().expect("valid");
        assert_eq!(snap.voice, "af_aoede");
        assert_eq!(snap.samples_per_frame(), 480);
        assert_eq!(snap.activity_timeout(), Duration::from_secs(1_800));
        assert!(snap.ai_process.is_match("node /usr/bin/Claude --resume"));
        assert!(snap.target_override.is_none());
        assert_eq!(snap.injection.mode, InjectionMode::Auto);
    }

    #[test]
    fn jarvis_profile_switches_phrases_and_voice() {
        let mut cfg = AppConfig::default();
        cfg.keywords.profile = "jarvis".into();
        let snap = cfg.validate().expect("valid");
        assert_eq!(snap.voice, "bm_lewis");
        assert!(snap.keywords.wake().iter().any(|p| p.text() == "hey jarvis"));
    }

    #[test]
    fn explicit_voice_wins_over_profile() {
        let mut cfg = AppConfig::default();
        cfg.tts.voice = Some("bf_emma".into());
        assert_eq!(cfg.validate().unwrap().voice, "bf_emma");
    }

    #[test]
    fn overlapping_phrase_lists_are_fatal() {
        let mut cfg = AppConfig::default();
        cfg.keywords.skip_phrases = Some(vec!["stop".into()]);
        let err = cfg.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Keywords(KeywordError::AmbiguousKeywordConfig { .. })
        ));
    }

    #[test]
    fn unknown_override_is_fatal() {
        let mut cfg = AppConfig::default();
        cfg.injection.target_override = Some("Notepad++".into());
        let err = cfg.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Target(ResolveError::UnknownOverride(_))
        ));
    }

    #[test]
    fn known_override_is_case_insensitive() {
        let mut cfg = AppConfig::default();
        cfg.injection.target_override = Some("iterm2".into());
        let snap = cfg.validate().unwrap();
        assert_eq!(snap.target_override.map(|a| a.name), Some("iTerm2"));
    }

    #[test]
    fn bad_pattern_is_fatal() {
        let mut cfg = AppConfig::default();
        cfg.injection.ai_process_pattern = "claude(".into();
        assert!(matches!(
            cfg.validate().unwrap_err(),
            ConfigError::Pattern { .. }
        ));
    }

    #[test]
    fn unknown_profile_is_fatal() {
        let mut cfg = AppConfig::default();
        cfg.keywords.profile = "hal".into();
        assert!(matches!(
            cfg.validate().unwrap_err(),
            ConfigError::UnknownProfile(_)
        ));
    }

    #[test]
    fn bad_echo_overlap_is_fatal() {
        let mut cfg = AppConfig::default();
        cfg.session.echo_overlap = 0.0;
        assert!(matches!(cfg.validate().unwrap_err(), ConfigError::Invalid(_)));
    }

    #[test]
    fn max_utterance_is_bounded() {
        let mut cfg = AppConfig::default();
        for secs in [f32::MAX, 1.0e12, f32::INFINITY, f32::NAN, 0.0, -1.0] {
            cfg.audio.max_utterance_secs = secs;
            assert!(
                matches!(cfg.validate(), Err(ConfigError::Invalid(_))),
                "{secs} accepted"
            );
        }

        cfg.audio.max_utterance_secs = 3_600.0;
        let mut snap = cfg.validate().unwrap();
        assert_eq!(snap.max_utterance(), Duration::from_secs(3_600));

        snap.audio.max_utterance_secs = f32::MAX;
        assert_eq!(snap.max_utterance(), Duration::from_secs(3_600));
    }
}
