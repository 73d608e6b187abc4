//! Metrics collection and registry.

use crate::session::StatsSnapshot;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// Prometheus metrics registry for scan sessions.
pub struct MetricsRegistry {
    registry: Registry,

    // Session metrics
    sessions_started: IntCounter,
    sessions_confirmed: IntCounter,
    sessions_failed: IntCounter,
    sessions_closed: IntCounter,
    sessions_live: IntGauge,

    // Decoding metrics
    frames_processed: IntCounter,
    detections: IntCounter,
    read_failures: IntCounter,

    // Input metrics
    tier_failures: IntCounter,
    manual_entries: IntCounter,
}

impl MetricsRegistry {
    /// Creates a new registry with every scan metric registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let sessions_started = IntCounter::new(
            "scan_guard_sessions_started_total",
            "Scan sessions opened",
        )?;
        let sessions_confirmed = IntCounter::new(
            "scan_guard_sessions_confirmed_total",
            "Scan sessions that ended with a detected code",
        )?;
        let sessions_failed = IntCounter::new(
            "scan_guard_sessions_failed_total",
            "Scan sessions that ended with an error",
        )?;
        let sessions_closed = IntCounter::new(
            "scan_guard_sessions_closed_total",
            "Scan sessions closed without a result",
        )?;
        let sessions_live = IntGauge::new(
            "scan_guard_sessions_live",
            "Scan sessions currently running",
        )?;
        let frames_processed = IntCounter::new(
            "scan_guard_frames_processed_total",
            "Frames processed by the decoder",
        )?;
        let detections = IntCounter::new(
            "scan_guard_detections_total",
            "Processed frames that yielded a decoded code",
        )?;
        let read_failures = IntCounter::new(
            "scan_guard_frame_read_failures_total",
            "Camera frames that could not be read",
        )?;
        let tier_failures = IntCounter::new(
            "scan_guard_camera_tier_failures_total",
            "Camera constraint tiers that failed during acquisition",
        )?;
        let manual_entries = IntCounter::new(
            "scan_guard_manual_entries_total",
            "Codes supplied by manual entry",
        )?;

        registry.register(Box::new(sessions_started.clone()))?;
        registry.register(Box::new(sessions_confirmed.clone()))?;
        registry.register(Box::new(sessions_failed.clone()))?;
        registry.register(Box::new(sessions_closed.clone()))?;
        registry.register(Box::new(sessions_live.clone()))?;
        registry.register(Box::new(frames_processed.clone()))?;
        registry.register(Box::new(detections.clone()))?;
        registry.register(Box::new(read_failures.clone()))?;
        registry.register(Box::new(tier_failures.clone()))?;
        registry.register(Box::new(manual_entries.clone()))?;

        Ok(Self {
            registry,
            sessions_started,
            sessions_confirmed,
            sessions_failed,
            sessions_closed,
            sessions_live,
            frames_processed,
            detections,
            read_failures,
            tier_failures,
            manual_entries,
        })
    }

    /// Brings every metric up to date with a stats snapshot.
    pub fn update(&self, snapshot: &StatsSnapshot) {
        // Counters only move forward, so advance them by the difference
        advance(&self.sessions_started, snapshot.sessions_started);
        advance(&self.sessions_confirmed, snapshot.sessions_confirmed);
        advance(&self.sessions_failed, snapshot.sessions_failed);
        advance(&self.sessions_closed, snapshot.sessions_closed);
        advance(&self.frames_processed, snapshot.frames_processed);
        advance(&self.detections, snapshot.detections);
        advance(&self.read_failures, snapshot.read_failures);
        advance(&self.tier_failures, snapshot.tier_failures);
        advance(&self.manual_entries, snapshot.manual_entries);

        let finished =
            snapshot.sessions_confirmed + snapshot.sessions_failed + snapshot.sessions_closed;
        self.sessions_live
            .set(snapshot.sessions_started.saturating_sub(finished) as i64);
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

fn advance(counter: &IntCounter, total: u64) {
    let current = counter.get();
    if total > current {
        counter.inc_by(total - current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creation() {
        let registry = MetricsRegistry::new();
        assert!(registry.is_ok());
    }

    #[test]
    fn test_metrics_update() {
        let registry = MetricsRegistry::new().unwrap();

        let snapshot = StatsSnapshot {
            sessions_started: 4,
            sessions_confirmed: 2,
            sessions_failed: 1,
            sessions_closed: 0,
            frames_processed: 120,
            detections: 9,
            read_failures: 2,
            tier_failures: 3,
            manual_entries: 1,
        };
        registry.update(&snapshot);
        // Updating twice with the same totals must not double count
        registry.update(&snapshot);

        let output = registry.encode().unwrap();
        assert!(output.contains("scan_guard_sessions_started_total 4"));
        assert!(output.contains("scan_guard_sessions_confirmed_total 2"));
        assert!(output.contains("scan_guard_frames_processed_total 120"));
        assert!(output.contains("scan_guard_sessions_live 1"));
        assert!(output.contains("scan_guard_manual_entries_total 1"));
        assert!(output.contains("scan_guard_frame_read_failures_total 2"));
    }

    #[test]
    fn test_metrics_encode() {
        let registry = MetricsRegistry::new().unwrap();
        let output = registry.encode().unwrap();

        assert!(output.contains("scan_guard_sessions_started_total"));
        assert!(output.contains("scan_guard_camera_tier_failures_total"));
        assert!(output.contains("scan_guard_detections_total"));
    }
}
