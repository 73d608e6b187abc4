//! Camera acquisition across a fallback ladder of constraint tiers.

use super::{AcquisitionError, CameraBackend, CameraConstraintTier, MediaStream};

/// A stream obtained by [`AcquisitionManager::acquire`].
#[derive(Debug)]
pub struct Acquired {
    /// The live stream, exclusively owned by the caller.
    pub stream: MediaStream,
    /// Position of the winning tier in the ladder.
    pub tier_index: usize,
}

/// Negotiates camera access by trying each tier in priority order.
///
/// Each tier is attempted at most once per call. The first tier that
/// yields a stream wins; if every tier fails, the last tier's error is
/// returned.
#[derive(Debug, Clone)]
pub struct AcquisitionManager {
    tiers: Vec<CameraConstraintTier>,
    failed_attempts: usize,
}

impl AcquisitionManager {
    pub fn new(tiers: Vec<CameraConstraintTier>) -> Self {
        Self {
            tiers,
            failed_attempts: 0,
        }
    }

    pub fn tiers(&self) -> &[CameraConstraintTier] {
        &self.tiers
    }

    /// Number of tiers that failed during the most recent `acquire` call.
    pub fn failed_attempts(&self) -> usize {
        self.failed_attempts
    }

    /// Walks the ladder until a tier yields a stream.
    ///
    /// `cancelled` is polled before each request and after each request
    /// returns. A stream that arrives after cancellation is stopped on
    /// the spot and `Aborted` is returned, so a late stream never reaches
    /// the caller.
    pub fn acquire(
        &mut self,
        backend: &mut dyn CameraBackend,
        cancelled: impl Fn() -> bool,
    ) -> Result<Acquired, AcquisitionError> {
        self.failed_attempts = 0;
        let mut last_error =
            AcquisitionError::NoDevice("no camera constraint tiers configured".into());

        for (index, tier) in self.tiers.iter().enumerate() {
            if cancelled() {
                tracing::debug!(tier = %tier.name, "Acquisition cancelled before request");
                return Err(AcquisitionError::Aborted);
            }

            tracing::debug!(tier = %tier.name, index, "Requesting camera");
            match backend.get_user_media(tier) {
                Ok(mut stream) => {
                    if cancelled() {
                        stream.stop();
                        tracing::info!(
                            tier = %tier.name,
                            stream = stream.id(),
                            "Discarded stream that arrived after cancellation"
                        );
                        return Err(AcquisitionError::Aborted);
                    }
                    tracing::info!(tier = %tier.name, stream = stream.id(), "Camera acquired");
                    return Ok(Acquired {
                        stream,
                        tier_index: index,
                    });
                }
                Err(err) => {
                    self.failed_attempts += 1;
                    tracing::warn!(
                        tier = %tier.name,
                        reason = err.reason(),
                        error = %err,
                        "Camera tier failed, trying next"
                    );
                    last_error = err;
                }
            }
        }

        Err(last_error)
    }
}

impl Default for AcquisitionManager {
    fn default() -> Self {
        Self::new(CameraConstraintTier::default_ladder())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::MockCameraBackend;
    use std::cell::Cell;

    fn backend() -> MockCameraBackend {
        MockCameraBackend::new().with_resolution(8, 8)
    }

    #[test]
    fn test_first_tier_wins() {
        let mut backend = backend();
        let recorder = backend.recorder();
        let mut manager = AcquisitionManager::default();

        let acquired = manager.acquire(&mut backend, || false).unwrap();
        assert_eq!(acquired.tier_index, 0);
        assert_eq!(acquired.stream.tier(), "rear-exact");
        assert_eq!(recorder.attempts(), ["rear-exact"]);
    }

    #[test]
    fn test_fallback_stops_at_first_success() {
        // Tiers 1..3 fail, tier 3 succeeds, tier 4 never requested
        let mut backend = backend()
            .fail_next(AcquisitionError::ConstraintsNotSatisfiable("facing".into()))
            .fail_next(AcquisitionError::DeviceBusy("in use".into()));
        let recorder = backend.recorder();
        let mut manager = AcquisitionManager::default();

        let acquired = manager.acquire(&mut backend, || false).unwrap();
        assert_eq!(acquired.tier_index, 2);
        assert_eq!(recorder.attempts(), ["rear-exact", "rear-preferred", "front"]);
        assert_eq!(manager.failed_attempts(), 2);
    }

    #[test]
    fn test_permission_denied_then_success() {
        let tiers = vec![
            CameraConstraintTier {
                name: "examplesA".into(),
                ..CameraConstraintTier::rear_exact()
            },
            CameraConstraintTier {
                name: "examplesB".into(),
                ..CameraConstraintTier::any()
            },
        ];
        let mut backend = backend().fail_next(AcquisitionError::PermissionDenied("denied".into()));
        let mut manager = AcquisitionManager::new(tiers);

        let acquired = manager.acquire(&mut backend, || false).unwrap();
        assert_eq!(acquired.stream.tier(), "examplesB");
    }

    #[test]
    fn test_all_tiers_fail_returns_last_error() {
        let mut backend = backend()
            .fail_next(AcquisitionError::PermissionDenied("a".into()))
            .fail_next(AcquisitionError::PermissionDenied("b".into()))
            .fail_next(AcquisitionError::DeviceBusy("c".into()))
            .fail_next(AcquisitionError::NoDevice("d".into()));
        let recorder = backend.recorder();
        let mut manager = AcquisitionManager::default();

        let err = manager.acquire(&mut backend, || false).unwrap_err();
        assert_eq!(err, AcquisitionError::NoDevice("d".into()));
        assert_eq!(recorder.attempts().len(), 4);
        assert_eq!(manager.failed_attempts(), 4);
    }

    #[test]
    fn test_empty_ladder_is_no_device() {
        let mut manager = AcquisitionManager::new(Vec::new());
        let err = manager.acquire(&mut backend(), || false).unwrap_err();
        assert!(matches!(err, AcquisitionError::NoDevice(_)));
    }

    #[test]
    fn test_late_stream_is_stopped() {
        let mut backend = backend();
        let recorder = backend.recorder();
        let mut manager = AcquisitionManager::default();

        // Not cancelled before the request, cancelled by the time it returns
        let polls = Cell::new(0);
        let result = manager.acquire(&mut backend, || {
            polls.set(polls.get() + 1);
            polls.get() > 1
        });

        assert_eq!(result.unwrap_err(), AcquisitionError::Aborted);
        assert_eq!(recorder.probes().len(), 1);
        assert!(recorder.all_tracks_stopped());
    }

    #[test]
    fn test_cancelled_before_start_makes_no_request() {
        let mut backend = backend();
        let recorder = backend.recorder();
        let mut manager = AcquisitionManager::default();

        let result = manager.acquire(&mut backend, || true);
        assert_eq!(result.unwrap_err(), AcquisitionError::Aborted);
        assert!(recorder.attempts().is_empty());
    }
}
