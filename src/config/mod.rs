//! Configuration module.
//!
//! Provides `AppConfig` (top-level settings, TOML persistence), sub-configs
//! for each subsystem, `AppPaths` for cross-platform locations, the
//! validated `SessionSnapshot` every component reads, and the single-instance
//! `InstanceLock`.

pub mod instance;
pub mod paths;
pub mod settings;
pub mod snapshot;

pub use instance::{InstanceLock, LockError};
pub use paths::AppPaths;
pub use settings::{
    AppConfig, AudioConfig, InjectionConfig, InjectionMode, KeywordConfig, SessionConfig,
    SttConfig, TtsConfig, DEFAULT_AI_PROCESS_PATTERN,
};
pub use snapshot::{ConfigError, SessionSnapshot};
