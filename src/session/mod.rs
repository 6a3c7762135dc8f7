//! Session orchestration.
//!
//! [`Session::start`] spawns three tasks around one event queue:
//!
//! * the runner, which owns the [`SessionStateMachine`], the segmenter, the
//!   keyword matcher and the [`EchoSuppressor`];
//! * the [`PlaybackWorker`], sole owner of the output device;
//! * the [`DeliveryWorker`], which hands forwarded text to a [`TextSink`].

pub mod delivery;
pub mod echo;
pub mod journal;
pub mod machine;
pub mod playback;
pub mod runner;
pub mod sequencer;
pub mod state;

pub use delivery::{DeliveryWorker, TextSink};
pub use echo::EchoSuppressor;
pub use journal::{EntryKind, Journal};
pub use machine::{Effect, SessionStateMachine};
pub use playback::{PlaybackEvent, PlaybackItem, PlaybackOutcome, PlaybackQueue, PlaybackWorker};
pub use runner::{
    Session, SessionError, SessionEvent, SessionHandle, SessionServices, TranscriptOutcome,
};
pub use sequencer::TranscriptSequencer;
pub use state::{new_shared_status, read_status, SessionState, SessionStatus, SharedStatus};
