//! Escape/interrupt delivery to open sessions.
//!
//! A process-wide interrupt (Ctrl+C, or an escape key forwarded by the
//! host) must only affect sessions that are currently open. Sessions
//! subscribe when they start and the returned guard unsubscribes them on
//! drop, so no listener outlives its session.

use super::SessionControl;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Error type for signal handler installation.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    #[error("failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

/// Fans an interrupt out to every subscribed session.
#[derive(Debug, Default)]
pub struct InterruptRelay {
    listeners: Mutex<BTreeMap<u64, SessionControl>>,
    next_id: AtomicU64,
    fired: AtomicU64,
}

impl InterruptRelay {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Routes Ctrl+C to this relay. Can only succeed once per process.
    pub fn install_ctrlc(self: &Arc<Self>) -> Result<(), SignalError> {
        let relay = Arc::clone(self);
        ctrlc::set_handler(move || {
            let cancelled = relay.fire();
            tracing::info!(cancelled, "Interrupt received");
        })?;
        Ok(())
    }

    /// Registers `control` until the returned guard is dropped.
    pub fn subscribe(self: &Arc<Self>, control: SessionControl) -> InterruptSubscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(id, control);
        InterruptSubscription {
            relay: Arc::clone(self),
            id,
        }
    }

    /// Cancels every subscribed session. Returns how many were notified.
    pub fn fire(&self) -> usize {
        self.fired.fetch_add(1, Ordering::Relaxed);
        // Cancel outside the lock: a cancel may finish a session, whose
        // observer could open a new one and subscribe again.
        let controls: Vec<SessionControl> = self.lock().values().cloned().collect();
        for control in &controls {
            control.cancel();
        }
        controls.len()
    }

    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    /// Number of interrupts received so far.
    pub fn fired(&self) -> u64 {
        self.fired.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<u64, SessionControl>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Keeps a session subscribed to an [`InterruptRelay`].
#[derive(Debug)]
pub struct InterruptSubscription {
    relay: Arc<InterruptRelay>,
    id: u64,
}

impl Drop for InterruptSubscription {
    fn drop(&mut self) {
        self.relay.lock().remove(&self.id);
    }
}
