//! Cross-thread control of a running scan session.

use super::{DetectionSource, ScanObserver, SessionOutcome, SessionState};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A pending request from outside the scanning thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Request {
    Cancel,
    Manual(String),
}

struct Inner {
    state: SessionState,
    request: Option<Request>,
    outcome: Option<SessionOutcome>,
}

struct Shared {
    id: u64,
    inner: Mutex<Inner>,
    observer: Arc<dyn ScanObserver>,
}

/// Handle for cancelling a session or supplying a code by hand.
///
/// Cheap to clone and usable from any thread. While the camera request
/// is still pending, both actions take effect immediately, because the
/// session owns no resources yet; any stream that arrives afterwards is
/// discarded by the scanning thread. Once decoding has started, the
/// request is picked up on the next frame so teardown runs before the
/// observer is told.
#[derive(Clone)]
pub struct SessionControl {
    shared: Arc<Shared>,
}

impl SessionControl {
    pub(crate) fn new(id: u64, observer: Arc<dyn ScanObserver>) -> Self {
        Self {
            shared: Arc::new(Shared {
                id,
                inner: Mutex::new(Inner {
                    state: SessionState::Idle,
                    request: None,
                    outcome: None,
                }),
                observer,
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.shared.id
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// The outcome reported to the observer, once there is one.
    pub fn outcome(&self) -> Option<SessionOutcome> {
        self.lock().outcome.clone()
    }

    /// Closes the session without a result. Idempotent.
    pub fn cancel(&self) {
        let claimed = {
            let mut inner = self.lock();
            match inner.state {
                SessionState::Idle | SessionState::AcquiringCamera => {
                    inner.state = SessionState::Closed;
                    claim(&mut inner, SessionOutcome::Closed)
                }
                SessionState::Decoding => {
                    inner.request.get_or_insert(Request::Cancel);
                    None
                }
                _ => None,
            }
        };

        match claimed {
            Some(outcome) => {
                tracing::info!(session = self.id(), "Session cancelled before decoding started");
                self.notify(&outcome);
            }
            None => tracing::debug!(session = self.id(), "Cancel requested"),
        }
    }

    /// Supplies a code out-of-band, completing the session with it.
    ///
    /// Blank input is ignored.
    pub fn submit_manual(&self, code: &str) {
        let code = code.trim();
        if code.is_empty() {
            tracing::warn!(session = self.id(), "Ignoring blank manual entry");
            return;
        }

        let claimed = {
            let mut inner = self.lock();
            match inner.state {
                SessionState::Idle | SessionState::AcquiringCamera => {
                    inner.state = SessionState::Confirmed;
                    claim(
                        &mut inner,
                        SessionOutcome::Detected {
                            code: code.to_string(),
                            source: DetectionSource::Manual,
                        },
                    )
                }
                SessionState::Decoding => {
                    inner.request.get_or_insert(Request::Manual(code.to_string()));
                    None
                }
                _ => None,
            }
        };

        if let Some(outcome) = claimed {
            tracing::info!(session = self.id(), code, "Manual entry before decoding started");
            self.notify(&outcome);
            self.transition(SessionState::Closed);
        }
    }

    /// Takes the pending request, if any.
    pub(crate) fn take_request(&self) -> Option<Request> {
        self.lock().request.take()
    }

    /// True once the scanning thread should stop what it is doing.
    pub(crate) fn is_stopping(&self) -> bool {
        let inner = self.lock();
        inner.request.is_some() || !inner.state.is_live()
    }

    /// Applies a legal transition. Returns false, leaving the state
    /// unchanged, if the transition is not allowed from the current state.
    pub(crate) fn transition(&self, next: SessionState) -> bool {
        let mut inner = self.lock();
        if !inner.state.can_transition_to(next) {
            tracing::debug!(
                session = self.id(),
                from = %inner.state,
                to = %next,
                "Transition refused"
            );
            return false;
        }
        tracing::debug!(session = self.id(), from = %inner.state, to = %next, "Session transition");
        inner.state = next;
        true
    }

    /// Records the outcome and notifies the observer, at most once per
    /// session. The observer is called without holding the lock.
    pub(crate) fn finish(&self, outcome: SessionOutcome) -> bool {
        let claimed = claim(&mut self.lock(), outcome);
        match claimed {
            Some(outcome) => {
                self.notify(&outcome);
                true
            }
            None => false,
        }
    }

    fn notify(&self, outcome: &SessionOutcome) {
        let observer = &self.shared.observer;
        match outcome {
            SessionOutcome::Detected { code, .. } => observer.on_detected(code),
            SessionOutcome::Failed(err) => observer.on_error(&err.user_message()),
            SessionOutcome::Closed => observer.on_close(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn claim(inner: &mut Inner, outcome: SessionOutcome) -> Option<SessionOutcome> {
    if inner.outcome.is_some() {
        return None;
    }
    inner.outcome = Some(outcome.clone());
    Some(outcome)
}

impl std::fmt::Debug for SessionControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionControl")
            .field("id", &self.id())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScanError;
    use crate::session::{EventLog, ScanEvent};

    fn control() -> (SessionControl, Arc<EventLog>) {
        let log = Arc::new(EventLog::new());
        (SessionControl::new(1, log.clone()), log)
    }

    #[test]
    fn test_cancel_while_acquiring_closes_immediately() {
        let (control, log) = control();
        assert!(control.transition(SessionState::AcquiringCamera));

        control.cancel();
        assert_eq!(control.state(), SessionState::Closed);
        assert_eq!(log.events(), [ScanEvent::Closed]);
        assert!(control.is_stopping());

        control.cancel();
        assert_eq!(log.events().len(), 1);
    }

    #[test]
    fn test_cancel_while_decoding_is_deferred() {
        let (control, log) = control();
        control.transition(SessionState::AcquiringCamera);
        control.transition(SessionState::Decoding);

        control.cancel();
        assert_eq!(control.state(), SessionState::Decoding);
        assert!(log.events().is_empty());
        assert_eq!(control.take_request(), Some(Request::Cancel));
        assert_eq!(control.take_request(), None);
    }

    #[test]
    fn test_manual_entry_before_decoding() {
        let (control, log) = control();
        control.submit_manual("  4006381333931 ");

        assert_eq!(control.state(), SessionState::Closed);
        assert_eq!(log.events(), [ScanEvent::Detected("4006381333931".into())]);
        assert_eq!(
            control.outcome(),
            Some(SessionOutcome::Detected {
                code: "4006381333931".into(),
                source: DetectionSource::Manual,
            })
        );
    }

    #[test]
    fn test_blank_manual_entry_ignored() {
        let (control, log) = control();
        control.submit_manual("   ");
        assert_eq!(control.state(), SessionState::Idle);
        assert!(log.events().is_empty());
    }

    #[test]
    fn test_first_request_wins() {
        let (control, _) = control();
        control.transition(SessionState::AcquiringCamera);
        control.transition(SessionState::Decoding);

        control.submit_manual("111");
        control.cancel();
        assert_eq!(control.take_request(), Some(Request::Manual("111".into())));
    }

    #[test]
    fn test_finish_notifies_once() {
        let (control, log) = control();
        assert!(control.finish(SessionOutcome::Failed(ScanError::NoDevice)));
        assert!(!control.finish(SessionOutcome::Closed));
        assert_eq!(
            log.events(),
            [ScanEvent::Error(ScanError::NoDevice.user_message())]
        );
    }
}
