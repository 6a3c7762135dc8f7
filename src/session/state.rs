//! Session state and the shared status view.
//!
//! [`SessionState`] is owned by the state machine.  [`SessionStatus`] is a
//! read-mostly mirror that the runner updates after every event so a status
//! line (or a test) can observe the session without touching the machine.

use std::sync::{Arc, Mutex};

use crate::lock::lock_or_recover;

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Listening mode of the session.
///
/// ```text
/// Idle ──wake──▶ Active ◀──interrupt / queue drained── Speaking
///  ▲               │  └──────────reply starts──────────▶  │
///  └──deactivate / activity timeout──────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Only the wake phrase is listened for.
    #[default]
    Idle,

    /// Speech is forwarded to the assistant.
    Active,

    /// A reply is playing; control words are live.
    Speaking,
}

impl SessionState {
    /// `true` while speech is being forwarded or a reply is playing.
    pub fn is_listening(self) -> bool {
        !matches!(self, SessionState::Idle)
    }

    pub fn label(self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Active => "Active",
            SessionState::Speaking => "Speaking",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// SessionStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStatus {
    pub state: SessionState,

    /// Text most recently handed to the delivery worker.
    pub last_forwarded: Option<String>,

    /// Replies waiting to be played, not counting the one playing.
    pub pending_playback: usize,

    /// Most recent recoverable error (transcription or delivery), cleared
    /// when the next message is delivered.
    pub last_error: Option<String>,

    /// Number of messages delivered to the assistant.
    pub delivered: u64,
}

/// Cheap to clone; do not hold the lock across `.await`.
pub type SharedStatus = Arc<Mutex<SessionStatus>>;

pub fn new_shared_status() -> SharedStatus {
    Arc::new(Mutex::new(SessionStatus::default()))
}

/// Run `f` against the status under its lock.
pub(crate) fn update_status(status: &SharedStatus, f: impl FnOnce(&mut SessionStatus)) {
    let mut guard = lock_or_recover(status, "session status");
    f(&mut guard);
}

/// Copy of the current status.
pub fn read_status(status: &SharedStatus) -> SessionStatus {
    lock_or_recover(status, "session status").clone()
}
