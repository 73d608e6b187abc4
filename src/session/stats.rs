//! Running counters across every session of a scanner.

use super::{DetectionSource, SessionOutcome};
use std::sync::atomic::{AtomicU64, Ordering};

/// Lifetime counters, shareable with a metrics exporter.
#[derive(Debug, Default)]
pub struct ScanStats {
    sessions_started: AtomicU64,
    sessions_confirmed: AtomicU64,
    sessions_failed: AtomicU64,
    sessions_closed: AtomicU64,
    frames_processed: AtomicU64,
    detections: AtomicU64,
    read_failures: AtomicU64,
    tier_failures: AtomicU64,
    manual_entries: AtomicU64,
}

/// Point-in-time copy of [`ScanStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub sessions_started: u64,
    pub sessions_confirmed: u64,
    pub sessions_failed: u64,
    pub sessions_closed: u64,
    pub frames_processed: u64,
    pub detections: u64,
    pub read_failures: u64,
    pub tier_failures: u64,
    pub manual_entries: u64,
}

impl ScanStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let get = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        StatsSnapshot {
            sessions_started: get(&self.sessions_started),
            sessions_confirmed: get(&self.sessions_confirmed),
            sessions_failed: get(&self.sessions_failed),
            sessions_closed: get(&self.sessions_closed),
            frames_processed: get(&self.frames_processed),
            detections: get(&self.detections),
            read_failures: get(&self.read_failures),
            tier_failures: get(&self.tier_failures),
            manual_entries: get(&self.manual_entries),
        }
    }

    pub(crate) fn session_started(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn frame_processed(&self, decoded: bool) {
        self.frames_processed.fetch_add(1, Ordering::Relaxed);
        if decoded {
            self.detections.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn frame_read_failed(&self) {
        self.read_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn tiers_failed(&self, count: usize) {
        self.tier_failures.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn session_finished(&self, outcome: &SessionOutcome) {
        let counter = match outcome {
            SessionOutcome::Detected { source, .. } => {
                if *source == DetectionSource::Manual {
                    self.manual_entries.fetch_add(1, Ordering::Relaxed);
                }
                &self.sessions_confirmed
            }
            SessionOutcome::Failed(_) => &self.sessions_failed,
            SessionOutcome::Closed => &self.sessions_closed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}
