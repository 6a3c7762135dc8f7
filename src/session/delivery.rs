use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::runner::SessionEvent;
use crate::inject::InjectError;

/// Where forwarded speech goes: the assistant's input box.
#[async_trait]
pub trait TextSink: Send + Sync {
    async fn deliver(&self, text: &str) -> Result<(), InjectError>;
}

/// Delivers forwarded text one message at a time, in forwarding order, and
/// reports each result back to the runner.
pub struct DeliveryWorker {
    texts: mpsc::UnboundedReceiver<String>,
    sink: Arc<dyn TextSink>,
    events: mpsc::Sender<SessionEvent>,
}

impl DeliveryWorker {
    pub fn new(
        texts: mpsc::UnboundedReceiver<String>,
        sink: Arc<dyn TextSink>,
        events: mpsc::Sender<SessionEvent>,
    ) -> Self {
        Self { texts, sink, events }
    }

    /// Run until the sending side is dropped and every queued text has been
    /// attempted.
    pub async fn run(mut self) {
        while let Some(text) = self.texts.recv().await {
            let event = match self.sink.deliver(&text).await {
                Ok(()) => {
                    log::info!("delivery: sent {} chars", text.len());
                    SessionEvent::Delivered { text }
                }
                Err(e) => {
                    log::warn!("delivery: {e}");
                    SessionEvent::DeliveryFailed {
                        text,
                        error: e.to_string(),
                    }
                }
            };
            // The runner is gone during shutdown; results no longer matter.
            let _ = self.events.send(event).await;
        }
        log::debug!("delivery: worker stopped");
    }
}

// ---------------------------------------------------------------------------
// RecordingSink (tests)
// ---------------------------------------------------------------------------

/// Collects delivered texts; fails every delivery when `fail` is set.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingSink {
    pub texts: std::sync::Mutex<Vec<String>>,
    pub fail: bool,
}

#[cfg(test)]
impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            texts: Default::default(),
            fail: true,
        }
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl TextSink for RecordingSink {
    async fn deliver(&self, text: &str) -> Result<(), InjectError> {
        if self.fail {
            return Err(InjectError::NoTarget(crate::inject::ResolveError::NoTargetFound));
        }
        self.texts.lock().unwrap().push(text.to_string());
        Ok(())
    }
}
