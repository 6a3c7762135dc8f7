//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files.  Every table is
//! `#[serde(default)]`, so a hand-written `settings.toml` only needs the keys
//! it wants to change.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::{AppPaths, ConfigError, SessionSnapshot};

// ---------------------------------------------------------------------------
// InjectionMode
// ---------------------------------------------------------------------------

/// Selects which detection strategies the injection resolver may use.
///
/// | Variant   | Strategy                                              |
/// |-----------|-------------------------------------------------------|
/// | Auto      | extension, then cli, then terminal; first hit wins    |
/// | Extension | IDE whose extension host runs the assistant           |
/// | Cli       | IDE whose integrated terminal runs the assistant CLI  |
/// | Terminal  | standalone terminal running the assistant CLI         |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InjectionMode {
    #[default]
    Auto,
    Extension,
    Cli,
    Terminal,
}

impl std::str::FromStr for InjectionMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "extension" => Ok(Self::Extension),
            "cli" => Ok(Self::Cli),
            "terminal" => Ok(Self::Terminal),
            other => Err(ConfigError::Invalid(format!(
                "unknown injection mode {other:?} (expected auto, extension, cli or terminal)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for audio capture, voice-activity detection and segmentation.
///
/// Amplitudes are on the normalised `f32` scale (`1.0` = full scale).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Internal processing sample rate in Hz (the transcription service
    /// expects 16 000).
    pub sample_rate: u32,
    /// Duration of one analysis frame in milliseconds.
    pub frame_ms: u32,
    /// RMS level above which a frame may count as speech.
    pub vad_rms_threshold: f32,
    /// Zero-crossing rate (crossings per sample) above which a frame is
    /// treated as broadband noise rather than voice.
    pub vad_max_zcr: f32,
    /// Silence run that ends an utterance.
    pub silence_threshold_ms: u64,
    /// Minimum time after speech-start before silence may end an utterance.
    pub grace_period_ms: u64,
    /// Shorter silence threshold used while a reply is being spoken, so
    /// control words are acted on quickly.
    pub barge_in_silence_ms: u64,
    /// Utterances shorter than this are dropped as noise.
    pub min_utterance_ms: u64,
    /// Utterances are force-ended when they reach this length.
    pub max_utterance_secs: f32,
    /// Minimum peak amplitude an utterance must reach to be transcribed.
    pub min_audio_energy: f32,
    /// Input device name; `None` means the system default.
    pub input_device: Option<String>,
    /// Output device name; `None` means the system default.
    pub output_device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            frame_ms: 30,
            vad_rms_threshold: 0.01,
            vad_max_zcr: 0.35,
            silence_threshold_ms: 1_000,
            grace_period_ms: 1_000,
            barge_in_silence_ms: 400,
            min_utterance_ms: 300,
            max_utterance_secs: 60.0,
            min_audio_energy: 1_500.0 / 32_768.0,
            input_device: None,
            output_device: None,
        }
    }
}

// ---------------------------------------------------------------------------
// KeywordConfig
// ---------------------------------------------------------------------------

/// Phrase lists for the keyword matcher.
///
/// `profile` selects a built-in set of phrases; any list given explicitly
/// replaces the profile's list of the same kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordConfig {
    /// Built-in phrase profile (`"samantha"` or `"jarvis"`).
    pub profile: String,
    pub wake_phrases: Option<Vec<String>>,
    pub deactivation_phrases: Option<Vec<String>>,
    pub interrupt_phrases: Option<Vec<String>>,
    pub skip_phrases: Option<Vec<String>>,
    pub finish_phrases: Option<Vec<String>>,
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            profile: "samantha".into(),
            wake_phrases: None,
            deactivation_phrases: None,
            interrupt_phrases: None,
            skip_phrases: None,
            finish_phrases: None,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Timing and echo-suppression settings for the session state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Seconds without accepted speech before the session silently sleeps.
    pub activity_timeout_secs: u64,
    /// How long to keep collecting utterances into one message before it is
    /// forwarded.  `0` forwards every utterance as soon as it is transcribed.
    pub message_gap_ms: u64,
    /// Seconds after playback ends during which its text still counts as
    /// audible for echo and self-interrupt checks.
    pub echo_tail_secs: u64,
    /// Token overlap ratio (0.0 – 1.0) at which a transcript is treated as
    /// an echo of the spoken reply.
    pub echo_overlap: f32,
    /// Upper bound on a single transcription request.
    pub transcription_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            activity_timeout_secs: 30 * 60,
            message_gap_ms: 0,
            echo_tail_secs: 10,
            echo_overlap: 0.6,
            transcription_timeout_secs: 15,
        }
    }
}

// ---------------------------------------------------------------------------
// SttConfig
// ---------------------------------------------------------------------------

/// Speech-to-text service endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    /// OpenAI-compatible transcription endpoint.
    pub url: String,
    /// Endpoint probed at startup; `None` skips the probe.
    pub health_url: Option<String>,
    /// Model name sent with each request.
    pub model: String,
    /// ISO-639-1 language hint; `None` lets the service detect it.
    pub language: Option<String>,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:2022/v1/audio/transcriptions".into(),
            health_url: Some("http://localhost:2022/health".into()),
            model: "whisper-1".into(),
            language: Some("en".into()),
        }
    }
}

// ---------------------------------------------------------------------------
// TtsConfig
// ---------------------------------------------------------------------------

/// Text-to-speech service endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    /// OpenAI-compatible speech endpoint.
    pub url: String,
    /// Endpoint probed at startup; `None` skips the probe.
    pub health_url: Option<String>,
    pub model: String,
    /// Voice identity; `None` uses the keyword profile's voice.
    pub voice: Option<String>,
    /// Sample rate of the PCM stream returned by the service.
    pub sample_rate: u32,
    /// Playback speed multiplier passed to the service.
    pub speed: f32,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8880/v1/audio/speech".into(),
            health_url: Some("http://localhost:8880/health".into()),
            model: "kokoro".into(),
            voice: None,
            sample_rate: 24_000,
            speed: 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// InjectionConfig
// ---------------------------------------------------------------------------

/// Pattern matched against process command lines to find the assistant.
pub const DEFAULT_AI_PROCESS_PATTERN: &str = "claude|gemini|copilot|aider|chatgpt|gpt|sgpt|codex";

/// Settings for delivering transcribed text into the assistant's window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectionConfig {
    pub mode: InjectionMode,
    /// Deliver to this known application without process detection.
    pub target_override: Option<String>,
    /// Case-insensitive regex matched against descendant command lines.
    pub ai_process_pattern: String,
    /// Re-focus the previously frontmost application after injecting.
    pub restore_focus: bool,
    /// Marker prepended to every forwarded message; empty disables it.
    pub message_prefix: String,
}

impl Default for InjectionConfig {
    fn default() -> Self {
        Self {
            mode: InjectionMode::default(),
            target_override: None,
            ai_process_pattern: DEFAULT_AI_PROCESS_PATTERN.into(),
            restore_focus: true,
            message_prefix: "[🎙️ Voice]".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use voice_relay::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let mut config = AppConfig::load().unwrap();
/// config.apply_env_overrides();
/// let snapshot = config.validate().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub keywords: KeywordConfig,
    pub session: SessionConfig,
    pub stt: SttConfig,
    pub tts: TtsConfig,
    pub injection: InjectionConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply `VOICE_RELAY_*` environment variables from the process
    /// environment on top of the loaded file.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup.  Unparseable values are
    /// logged and ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("VOICE_RELAY_STT_URL") {
            self.stt.url = url;
        }
        if let Some(url) = lookup("VOICE_RELAY_TTS_URL") {
            self.tts.url = url;
        }
        if let Some(voice) = lookup("VOICE_RELAY_VOICE") {
            self.tts.voice = Some(voice);
        }
        if let Some(profile) = lookup("VOICE_RELAY_PROFILE") {
            self.keywords.profile = profile;
        }
        if let Some(mode) = lookup("VOICE_RELAY_INJECTION_MODE") {
            match mode.parse() {
                Ok(mode) => self.injection.mode = mode,
                Err(e) => log::warn!("config: ignoring VOICE_RELAY_INJECTION_MODE: {e}"),
            }
        }
        if let Some(target) = lookup("VOICE_RELAY_TARGET") {
            self.injection.target_override = (!target.trim().is_empty()).then_some(target);
        }
        if let Some(pattern) = lookup("VOICE_RELAY_AI_PATTERN") {
            self.injection.ai_process_pattern = pattern;
        }
    }

    /// Check the configuration and freeze it into an immutable snapshot.
    ///
    /// Every error returned here is a startup-fatal configuration error.
    pub fn validate(&self) -> Result<SessionSnapshot, ConfigError> {
        SessionSnapshot::build(self)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(original.audio.sample_rate, loaded.audio.sample_rate);
        assert_eq!(
            original.audio.silence_threshold_ms,
            loaded.audio.silence_threshold_ms
        );
        assert_eq!(original.keywords.profile, loaded.keywords.profile);
        assert_eq!(
            original.session.activity_timeout_secs,
            loaded.session.activity_timeout_secs
        );
        assert_eq!(original.stt.url, loaded.stt.url);
        assert_eq!(original.tts.sample_rate, loaded.tts.sample_rate);
        assert_eq!(original.injection.mode, loaded.injection.mode);
        assert_eq!(
            original.injection.ai_process_pattern,
            loaded.injection.ai_process_pattern
        );
    }

    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        assert_eq!(config.audio.frame_ms, 30);
        assert_eq!(config.injection.mode, InjectionMode::Auto);
    }

    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.audio.sample_rate, 16_000);
        assert_eq!(cfg.audio.silence_threshold_ms, 1_000);
        assert_eq!(cfg.audio.grace_period_ms, 1_000);
        assert_eq!(cfg.session.activity_timeout_secs, 1_800);
        assert_eq!(cfg.session.message_gap_ms, 0);
        assert_eq!(cfg.tts.sample_rate, 24_000);
        assert_eq!(cfg.keywords.profile, "samantha");
        assert!(cfg.injection.target_override.is_none());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("partial.toml");
        std::fs::write(
            &path,
            "[injection]\nmode = \"terminal\"\n\n[keywords]\nwake_phrases = [\"computer\"]\n",
        )
        .expect("write");

        let cfg = AppConfig::load_from(&path).expect("load");
        assert_eq!(cfg.injection.mode, InjectionMode::Terminal);
        assert_eq!(
            cfg.keywords.wake_phrases.as_deref(),
            Some(&["computer".to_string()][..])
        );
        assert_eq!(cfg.keywords.profile, "samantha");
        assert_eq!(cfg.audio.frame_ms, 30);
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = [
            ("VOICE_RELAY_STT_URL", "http://stt:9000/v1/audio/transcriptions"),
            ("VOICE_RELAY_VOICE", "bf_emma"),
            ("VOICE_RELAY_INJECTION_MODE", "CLI"),
            ("VOICE_RELAY_TARGET", "Cursor"),
        ]
        .into_iter()
        .collect();

        let mut cfg = AppConfig::default();
        cfg.apply_overrides_from(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.stt.url, "http://stt:9000/v1/audio/transcriptions");
        assert_eq!(cfg.tts.voice.as_deref(), Some("bf_emma"));
        assert_eq!(cfg.injection.mode, InjectionMode::Cli);
        assert_eq!(cfg.injection.target_override.as_deref(), Some("Cursor"));
    }

    #[test]
    fn bad_env_mode_is_ignored() {
        let mut cfg = AppConfig::default();
        cfg.apply_overrides_from(|k| (k == "VOICE_RELAY_INJECTION_MODE").then(|| "bogus".into()));
        assert_eq!(cfg.injection.mode, InjectionMode::Auto);
    }
}
