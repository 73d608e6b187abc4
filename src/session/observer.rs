//! Caller-facing session callbacks.

use std::sync::{Mutex, PoisonError};

/// Receives the single outcome of a scan session.
///
/// Exactly one of the three methods is called per session, and only
/// after the session has released the camera and decoder.
pub trait ScanObserver: Send + Sync {
    /// A code was confirmed by consensus or entered manually.
    fn on_detected(&self, code: &str);

    /// Acquisition or decoding failed; `message` is user-facing text.
    fn on_error(&self, message: &str);

    /// The session was closed without a result.
    fn on_close(&self);
}

/// One recorded callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    Detected(String),
    Error(String),
    Closed,
}

/// Observer that records every callback it receives.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<ScanEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ScanEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last(&self) -> Option<ScanEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    fn push(&self, event: ScanEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl ScanObserver for EventLog {
    fn on_detected(&self, code: &str) {
        self.push(ScanEvent::Detected(code.to_string()));
    }

    fn on_error(&self, message: &str) {
        self.push(ScanEvent::Error(message.to_string()));
    }

    fn on_close(&self) {
        self.push(ScanEvent::Closed);
    }
}
