//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout (config dir):
//!
//!   Windows: %APPDATA%\voice-relay\
//!   macOS:   ~/Library/Application Support/voice-relay/
//!   Linux:   ~/.config/voice-relay/
//!
//! ```text
//! voice-relay/
//! ├── settings.toml
//! ├── conversation.log
//! └── voice-relay.pid
//! ```

use std::path::{Path, PathBuf};

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Append-only conversation journal.
    pub conversation_log: PathBuf,
    /// PID file guarding against a second running instance.
    pub lock_file: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "voice-relay";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);
        Self::rooted_at(&config_dir)
    }

    /// Lay the files out under an explicit directory.
    pub fn rooted_at(config_dir: &Path) -> Self {
        Self {
            config_dir: config_dir.to_path_buf(),
            settings_file: config_dir.join("settings.toml"),
            conversation_log: config_dir.join("conversation.log"),
            lock_file: config_dir.join(format!("{}.pid", Self::APP_NAME)),
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_non_empty() {
        let paths = AppPaths::new();
        assert!(paths.config_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths
            .settings_file
            .file_name()
            .is_some_and(|n| n == "settings.toml"));
        assert!(paths
            .lock_file
            .file_name()
            .is_some_and(|n| n == "voice-relay.pid"));
    }

    #[test]
    fn rooted_layout() {
        let paths = AppPaths::rooted_at(Path::new("/tmp/vr"));
        assert_eq!(paths.conversation_log, Path::new("/tmp/vr/conversation.log"));
        assert_eq!(paths.settings_file.parent(), Some(Path::new("/tmp/vr")));
    }
}
