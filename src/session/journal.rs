//! Append-only conversation journal.
//!
//! One line per event, `[HH:MM:SS] Kind: text`, in `conversation.log` under
//! the config directory.  Write failures are logged and otherwise ignored; a
//! full disk must never stop the session.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

/// The journal is truncated when it grows past this.
const MAX_BYTES: u64 = 2 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Speech forwarded to the assistant.
    User,
    /// A reply that played to the end.
    Assistant,
    Interrupt,
    Skip,
    /// Forwarded speech that could not be delivered.
    Undelivered,
}

impl EntryKind {
    fn label(self) -> &'static str {
        match self {
            EntryKind::User => "User",
            EntryKind::Assistant => "Assistant",
            EntryKind::Interrupt => "Interrupt",
            EntryKind::Skip => "Skip",
            EntryKind::Undelivered => "Undelivered",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Journal {
    path: Option<PathBuf>,
}

impl Journal {
    pub fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    /// A journal that only mirrors entries to the log.
    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn record(&self, kind: EntryKind, text: &str) {
        let line = format!(
            "[{}] {}: {}",
            chrono::Local::now().format("%H:%M:%S"),
            kind.label(),
            text
        );
        log::info!("{line}");

        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = append(path, &line) {
            log::debug!("journal: failed to write {}: {e}", path.display());
        }
    }
}

fn append(path: &PathBuf, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let oversized = fs::metadata(path).map(|m| m.len() > MAX_BYTES).unwrap_or(false);
    let mut file = OpenOptions::new()
        .create(true)
        .append(!oversized)
        .write(true)
        .truncate(oversized)
        .open(path)?;
    writeln!(file, "{line}")
}
