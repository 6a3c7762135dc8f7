//! Delivery of forwarded speech into the assistant's input box.
//!
//! # Overview
//!
//! ```text
//!  text ──► InjectionSink ──spawn_blocking──► ProcessTable::snapshot()
//!                                                   │
//!                                           TargetResolver::resolve()
//!                                                   │  InjectionTarget
//!                                                   ▼
//!                                   TextInjector::inject(target, text)
//! ```
//!
//! The resolver holds the policy (which window); a [`TextInjector`] holds
//! only the mechanism.  [`DesktopInjector`] pastes through the clipboard:
//!
//! 1. remember the frontmost window and the clipboard;
//! 2. put the text on the clipboard;
//! 3. focus the target app, then its assistant input;
//! 4. paste and press Return;
//! 5. restore the clipboard and, optionally, the previous window.

pub mod clipboard;
pub mod focus;
pub mod keyboard;
pub mod process;
pub mod resolver;

pub use focus::FocusBackend;
pub use process::{ProcessInfo, ProcessTable};
pub use resolver::{
    discover_candidates, AppCategory, Candidate, InjectionTarget, KnownApp, ResolveError,
    Strategy, TargetResolver, KNOWN_APPS,
};

use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::SessionSnapshot;
use crate::session::TextSink;
use clipboard::ClipboardGuard;
use keyboard::{KeySender, Shortcut};

// ---------------------------------------------------------------------------
// InjectError
// ---------------------------------------------------------------------------

/// All errors that can surface while delivering text.
#[derive(Debug, Error)]
pub enum InjectError {
    /// No window running the assistant could be found.
    #[error(transparent)]
    NoTarget(#[from] ResolveError),

    /// Could not open or read the system clipboard.
    #[error("cannot access clipboard: {0}")]
    ClipboardAccess(String),

    /// Could not write text to the system clipboard.
    #[error("cannot set clipboard text: {0}")]
    ClipboardSet(String),

    /// Could not simulate a key press/release event.
    #[error("cannot simulate key press: {0}")]
    KeySimulation(String),

    #[error("cannot focus target window: {0}")]
    Focus(String),

    #[error("cannot read process list: {0}")]
    Process(String),

    /// No focus backend exists here, so the paste could land anywhere.
    #[error("text injection is not supported on this desktop")]
    Unsupported,

    #[error("injection failed: {0}")]
    InjectionFailed(String),
}

// ---------------------------------------------------------------------------
// TextInjector
// ---------------------------------------------------------------------------

/// Performs one paste into a resolved target.  Blocking; called from
/// `spawn_blocking`.
pub trait TextInjector: Send + Sync {
    fn inject(&self, target: &InjectionTarget, text: &str) -> Result<(), InjectError>;
}

/// Milliseconds to wait after activating the target window.
const FOCUS_SETTLE_MS: u64 = 300;
/// Milliseconds to wait after the in-app focus shortcut.
const SHORTCUT_SETTLE_MS: u64 = 200;
/// Milliseconds to wait after setting the clipboard before pasting.
const PASTE_DELAY_MS: u64 = 50;
/// Milliseconds to let the target finish pasting before submitting and
/// restoring the clipboard.
const RESTORE_DELAY_MS: u64 = 100;

/// Clipboard-paste injector for desktop sessions.
#[derive(Debug, Clone)]
pub struct DesktopInjector {
    focus: FocusBackend,
    restore_focus: bool,
}

impl DesktopInjector {
    pub fn new(focus: FocusBackend, restore_focus: bool) -> Self {
        Self { focus, restore_focus }
    }

    pub fn from_snapshot(snapshot: &SessionSnapshot) -> Self {
        Self::new(FocusBackend::detect(), snapshot.injection.restore_focus)
    }
}

impl TextInjector for DesktopInjector {
    fn inject(&self, target: &InjectionTarget, text: &str) -> Result<(), InjectError> {
        if self.focus == FocusBackend::None {
            return Err(InjectError::Unsupported);
        }

        let previous = if self.restore_focus { self.focus.frontmost() } else { None };
        let saved = ClipboardGuard::save()?;
        clipboard::write_text(text)?;

        self.focus.activate(target.app.name, target.app.window_class())?;
        sleep(Duration::from_millis(FOCUS_SETTLE_MS));

        let mut keys = KeySender::new()?;
        if let Some(shortcut) = Shortcut::focus_for(target.strategy) {
            keys.send(shortcut)?;
            sleep(Duration::from_millis(SHORTCUT_SETTLE_MS));
        }
        sleep(Duration::from_millis(PASTE_DELAY_MS));
        keys.send(Shortcut::PASTE)?;
        sleep(Duration::from_millis(RESTORE_DELAY_MS));
        keys.send(Shortcut::SUBMIT)?;
        sleep(Duration::from_millis(RESTORE_DELAY_MS));

        if let Err(e) = saved.restore() {
            log::warn!("inject: clipboard restore failed: {e}");
        }
        if let Some(handle) = previous {
            if let Err(e) = self.focus.restore(&handle) {
                log::warn!("inject: focus restore failed: {e}");
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// InjectionSink
// ---------------------------------------------------------------------------

type ProcessSource = fn() -> Result<ProcessTable, InjectError>;

/// [`TextSink`] that resolves a fresh target for every message and injects
/// the prefixed text into it.
pub struct InjectionSink {
    resolver: TargetResolver,
    injector: Arc<dyn TextInjector>,
    prefix: String,
    processes: ProcessSource,
}

impl InjectionSink {
    pub fn new(snapshot: &SessionSnapshot, injector: Arc<dyn TextInjector>) -> Self {
        Self {
            resolver: TargetResolver::from_snapshot(snapshot),
            injector,
            prefix: snapshot.injection.message_prefix.trim().to_string(),
            processes: ProcessTable::snapshot,
        }
    }

    /// Replace the live `ps` snapshot with another process source.
    pub fn with_process_source(mut self, processes: ProcessSource) -> Self {
        self.processes = processes;
        self
    }

    fn message(&self, text: &str) -> String {
        if self.prefix.is_empty() {
            text.to_string()
        } else {
            format!("{} {}", self.prefix, text)
        }
    }
}

#[async_trait]
impl TextSink for InjectionSink {
    async fn deliver(&self, text: &str) -> Result<(), InjectError> {
        let resolver = self.resolver.clone();
        let injector = Arc::clone(&self.injector);
        let processes = self.processes;
        let message = self.message(text);

        tokio::task::spawn_blocking(move || {
            let table = processes()?;
            let target = resolver.resolve(&table)?;
            log::info!(
                "inject: {} ({:?}, pid {:?})",
                target.app.name,
                target.strategy,
                target.pid
            );
            injector.inject(&target, &message)
        })
        .await
        .map_err(|e| InjectError::InjectionFailed(e.to_string()))?
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
