//! Clipboard access backed by the `arboard` crate.
//!
//! Every call opens a short-lived [`arboard::Clipboard`]; the handle is not
//! `Send` on every platform, and injection runs on blocking worker threads.

use arboard::Clipboard;

use super::InjectError;

/// Current plain-text clipboard content; `None` when empty or non-text.
pub fn read_text() -> Result<Option<String>, InjectError> {
    Ok(open()?.get_text().ok())
}

pub fn write_text(text: &str) -> Result<(), InjectError> {
    open()?
        .set_text(text)
        .map_err(|e| InjectError::ClipboardSet(e.to_string()))
}

/// Saves the clipboard on creation and puts it back on [`restore`] or drop.
///
/// Non-text content cannot be saved; in that case nothing is restored.
///
/// [`restore`]: ClipboardGuard::restore
pub struct ClipboardGuard {
    saved: Option<String>,
    restored: bool,
}

impl ClipboardGuard {
    pub fn save() -> Result<Self, InjectError> {
        Ok(Self {
            saved: read_text()?,
            restored: false,
        })
    }

    pub fn restore(mut self) -> Result<(), InjectError> {
        self.restored = true;
        match self.saved.take() {
            Some(text) => write_text(&text),
            None => Ok(()),
        }
    }
}

impl Drop for ClipboardGuard {
    fn drop(&mut self) {
        if self.restored {
            return;
        }
        if let Some(text) = self.saved.take() {
            if let Err(e) = write_text(&text) {
                log::warn!("inject: clipboard restore failed: {e}");
            }
        }
    }
}

fn open() -> Result<Clipboard, InjectError> {
    Clipboard::new().map_err(|e| InjectError::ClipboardAccess(e.to_string()))
}
