//! The scanner and its session guard.
//!
//! A [`Scanner`] owns the camera backend and the decode adapter. Opening a
//! session borrows the scanner mutably, so at most one session can be
//! live per scanner and two sessions can never bind the same camera or
//! decoder.
//!
//! ```text
//! Idle ─► AcquiringCamera ─► Decoding ─► Confirmed ─┐
//!               │                │                   ├─► teardown ─► callback ─► Closed
//!               └────────────────┴─► Failed ─────────┘
//! ```
//!
//! Teardown always runs in the same order: decoder subscription, decoder
//! workers, stream tracks, video surface, overlay, interrupt listener.
//! Only then is the observer called.

use super::{
    control::Request, DetectionSource, HostSurface, InterruptRelay, InterruptSubscription,
    ScanObserver, ScanStats, SessionControl, SessionOutcome, SessionReport, SessionState,
};
use crate::capture::{
    AcquisitionError, AcquisitionManager, CameraBackend, CameraConstraintTier, CaptureError,
    MediaStream,
};
use crate::config::{ConfigError, ScanConfig};
use crate::consensus::{ConsensusTally, Verdict};
use crate::decode::{DecodeAdapter, EngineFactory, ProcessedFrame, Submission, SubscriptionId};
use crate::error::ScanError;
use crate::overlay::{OverlayRenderer, OverlayStyle};
use chrono::Utc;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Duration;

/// How long to wait on busy workers before reading the next frame.
const BUSY_WAIT: Duration = Duration::from_millis(2);
/// Back-off while a live track has no frame yet.
const NOT_READY_WAIT: Duration = Duration::from_millis(10);
/// Budget for collecting in-flight results after a track ends.
const FLUSH_TIMEOUT: Duration = Duration::from_millis(500);
/// Unreadable frames in a row before the camera is treated as failed.
pub const MAX_CONSECUTIVE_READ_FAILURES: u32 = 5;

/// Owns the camera backend and decoder for a sequence of sessions.
pub struct Scanner {
    backend: Box<dyn CameraBackend>,
    acquisition: AcquisitionManager,
    adapter: DecodeAdapter,
    config: ScanConfig,
    style: OverlayStyle,
    interrupts: Option<Arc<InterruptRelay>>,
    stats: Arc<ScanStats>,
    next_session: u64,
}

impl Scanner {
    /// Creates a scanner with the default camera ladder.
    pub fn new(
        backend: Box<dyn CameraBackend>,
        engines: Arc<dyn EngineFactory>,
        config: ScanConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            backend,
            acquisition: AcquisitionManager::default(),
            adapter: DecodeAdapter::new(engines),
            config,
            style: OverlayStyle::default(),
            interrupts: None,
            stats: Arc::new(ScanStats::new()),
            next_session: 1,
        })
    }

    /// Replaces the camera constraint ladder.
    pub fn with_tiers(mut self, tiers: Vec<CameraConstraintTier>) -> Self {
        self.acquisition = AcquisitionManager::new(tiers);
        self
    }

    /// Lets `relay` cancel whichever session is open.
    pub fn with_interrupts(mut self, relay: Arc<InterruptRelay>) -> Self {
        self.interrupts = Some(relay);
        self
    }

    pub fn with_style(mut self, style: OverlayStyle) -> Self {
        self.style = style;
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn tiers(&self) -> &[CameraConstraintTier] {
        self.acquisition.tiers()
    }

    /// Counters across every session run by this scanner.
    pub fn stats(&self) -> Arc<ScanStats> {
        Arc::clone(&self.stats)
    }

    /// Opens a new session in the `Idle` state.
    ///
    /// Call [`ScanSession::control`] first if the session needs to be
    /// cancelled from another thread, then [`ScanSession::run`].
    pub fn open(&mut self, observer: Arc<dyn ScanObserver>) -> ScanSession<'_> {
        let id = self.next_session;
        self.next_session += 1;
        ScanSession {
            control: SessionControl::new(id, observer),
            scanner: self,
        }
    }

    /// Opens and runs one session to completion.
    ///
    /// Can be called again after any outcome; every call starts from
    /// `Idle` with a fresh tally.
    pub fn scan(&mut self, host: &mut HostSurface, observer: Arc<dyn ScanObserver>) -> SessionReport {
        self.open(observer).run(host)
    }
}

impl std::fmt::Debug for Scanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("tiers", &self.acquisition.tiers().len())
            .field("config", &self.config)
            .field("next_session", &self.next_session)
            .finish()
    }
}

/// One open scan session.
#[derive(Debug)]
pub struct ScanSession<'a> {
    scanner: &'a mut Scanner,
    control: SessionControl,
}

/// Per-run bookkeeping for the report.
#[derive(Default)]
struct Progress {
    tier: Option<String>,
    frames: u64,
}

/// Resources held while decoding.
struct Bound {
    stream: MediaStream,
    subscription: SubscriptionId,
    processed: Receiver<ProcessedFrame>,
}

/// Why the decode loop stopped.
enum Exit {
    Confirmed(String),
    Requested(Request),
    Failed(ScanError),
}

impl<'a> ScanSession<'a> {
    pub fn id(&self) -> u64 {
        self.control.id()
    }

    /// Handle for cancelling or completing this session from elsewhere.
    pub fn control(&self) -> SessionControl {
        self.control.clone()
    }

    /// Runs the session until it is confirmed, fails or is closed.
    ///
    /// Blocks the calling thread. The observer is called exactly once,
    /// after every resource the session acquired has been released.
    pub fn run(self, host: &mut HostSurface) -> SessionReport {
        let ScanSession { scanner, control } = self;
        let started_at = Utc::now();
        let mut progress = Progress::default();

        let mut interrupt = scanner
            .interrupts
            .as_ref()
            .map(|relay| relay.subscribe(control.clone()));
        scanner.stats.session_started();
        tracing::info!(session = control.id(), "Scan session opened");

        if control.transition(SessionState::AcquiringCamera) {
            scanner.drive(&control, host, &mut interrupt, &mut progress);
        }
        // Teardown already released it unless the session never bound anything
        drop(interrupt);

        let outcome = control.outcome().unwrap_or(SessionOutcome::Closed);
        scanner.stats.session_finished(&outcome);

        let report = SessionReport {
            session: control.id(),
            outcome,
            tier: progress.tier,
            frames_processed: progress.frames,
            started_at,
            finished_at: Utc::now(),
        };
        tracing::info!(session = report.session, outcome = report.outcome.as_str(), "{report}");
        report
    }
}

impl Scanner {
    fn drive(
        &mut self,
        control: &SessionControl,
        host: &mut HostSurface,
        interrupt: &mut Option<InterruptSubscription>,
        progress: &mut Progress,
    ) {
        let acquired = self
            .acquisition
            .acquire(&mut *self.backend, || control.is_stopping());
        self.stats.tiers_failed(self.acquisition.failed_attempts());

        let acquired = match acquired {
            Ok(acquired) => acquired,
            Err(err) => {
                if matches!(err, AcquisitionError::Aborted) && !control.state().is_live() {
                    // Cancelled or completed by hand while the request was pending
                    return;
                }
                tracing::warn!(session = control.id(), reason = err.reason(), "Camera acquisition failed");
                self.fail(control, host, interrupt, None, err.into());
                return;
            }
        };

        let mut stream = acquired.stream;
        if !control.transition(SessionState::Decoding) {
            stream.stop();
            tracing::info!(session = control.id(), stream = stream.id(), "Discarded stream for finished session");
            return;
        }
        progress.tier = Some(stream.tier().to_string());
        host.video.attach(&stream);

        let (subscription, processed) = self.adapter.subscribe();
        let mut bound = Bound {
            stream,
            subscription,
            processed,
        };
        if let Err(err) = self.adapter.start(&bound.stream, &self.config.decoder) {
            self.fail(control, host, interrupt, Some(bound), err);
            return;
        }

        let exit = self.decode_loop(control, host, &mut bound, progress);
        match exit {
            Exit::Confirmed(code) => {
                self.confirm(control, host, interrupt, bound, code, DetectionSource::Camera)
            }
            Exit::Requested(Request::Manual(code)) => {
                self.confirm(control, host, interrupt, bound, code, DetectionSource::Manual)
            }
            Exit::Requested(Request::Cancel) => {
                self.teardown(host, interrupt, Some(bound));
                control.transition(SessionState::Closed);
                control.finish(SessionOutcome::Closed);
            }
            Exit::Failed(err) => self.fail(control, host, interrupt, Some(bound), err),
        }
    }

    fn decode_loop(
        &mut self,
        control: &SessionControl,
        host: &mut HostSurface,
        bound: &mut Bound,
        progress: &mut Progress,
    ) -> Exit {
        let mut tally = ConsensusTally::new(self.config.threshold);
        let mut renderer = OverlayRenderer::new(self.config.decoder.region, self.style);
        tracing::info!(
            session = control.id(),
            tier = bound.stream.tier(),
            threshold = tally.threshold(),
            "Decoding started"
        );

        let mut failed_reads = 0;
        loop {
            if let Some(request) = control.take_request() {
                return Exit::Requested(request);
            }

            let wait = match bound.stream.read_frame() {
                Ok(frame) => {
                    failed_reads = 0;
                    host.video.present(&frame);
                    match self.adapter.submit(frame) {
                        Submission::Busy => BUSY_WAIT,
                        _ => Duration::ZERO,
                    }
                }
                Err(CaptureError::NotReady) => NOT_READY_WAIT,
                Err(CaptureError::Ended) => {
                    self.adapter.flush(FLUSH_TIMEOUT);
                    if let Some(code) = self.consume(control, host, bound, &mut tally, &mut renderer, progress) {
                        return Exit::Confirmed(code);
                    }
                    tracing::warn!(session = control.id(), "Camera track ended while decoding");
                    return Exit::Failed(ScanError::StreamEnded);
                }
                Err(CaptureError::ReadFailed(cause)) => {
                    failed_reads += 1;
                    self.stats.frame_read_failed();
                    tracing::warn!(
                        session = control.id(),
                        failed_reads,
                        error = %cause,
                        "Failed to read camera frame"
                    );
                    if failed_reads >= MAX_CONSECUTIVE_READ_FAILURES {
                        return Exit::Failed(ScanError::Unknown(cause));
                    }
                    NOT_READY_WAIT
                }
            };

            self.adapter.pump(wait);
            if wait == NOT_READY_WAIT && self.adapter.in_flight() == 0 {
                std::thread::sleep(wait);
            }
            if let Some(code) = self.consume(control, host, bound, &mut tally, &mut renderer, progress) {
                return Exit::Confirmed(code);
            }
        }
    }

    /// Feeds delivered frames through consensus and the overlay.
    fn consume(
        &self,
        control: &SessionControl,
        host: &mut HostSurface,
        bound: &Bound,
        tally: &mut ConsensusTally,
        renderer: &mut OverlayRenderer,
        progress: &mut Progress,
    ) -> Option<String> {
        for frame in bound.processed.try_iter() {
            progress.frames += 1;
            let code = frame.detection.as_ref().and_then(|d| d.code.as_deref());
            self.stats.frame_processed(code.is_some());

            let verdict = code.map(|code| tally.observe(code));
            renderer.render(host.overlay_mut(), &frame, verdict.as_ref());

            if let Some(Verdict::Confirmed(code)) = verdict {
                tracing::info!(
                    session = control.id(),
                    code = %code,
                    count = tally.count(&code),
                    threshold = tally.threshold(),
                    "Code confirmed"
                );
                return Some(code);
            }
        }
        None
    }

    fn confirm(
        &mut self,
        control: &SessionControl,
        host: &mut HostSurface,
        interrupt: &mut Option<InterruptSubscription>,
        bound: Bound,
        code: String,
        source: DetectionSource,
    ) {
        if !control.transition(SessionState::Confirmed) {
            self.teardown(host, interrupt, Some(bound));
            return;
        }
        self.teardown(host, interrupt, Some(bound));
        control.finish(SessionOutcome::Detected { code, source });
        control.transition(SessionState::Closed);
    }

    fn fail(
        &mut self,
        control: &SessionControl,
        host: &mut HostSurface,
        interrupt: &mut Option<InterruptSubscription>,
        bound: Option<Bound>,
        err: ScanError,
    ) {
        let failed = control.transition(SessionState::Failed);
        self.teardown(host, interrupt, bound);
        if failed {
            tracing::warn!(session = control.id(), error = %err, "Scan session failed");
            control.finish(SessionOutcome::Failed(err));
            control.transition(SessionState::Closed);
        }
    }

    /// Releases everything the session holds. Safe to call with nothing bound.
    fn teardown(
        &mut self,
        host: &mut HostSurface,
        interrupt: &mut Option<InterruptSubscription>,
        bound: Option<Bound>,
    ) {
        if let Some(mut bound) = bound {
            self.adapter.unsubscribe(bound.subscription);
            self.adapter.stop();
            bound.stream.stop();
            tracing::debug!(stream = bound.stream.id(), "Stream tracks stopped");
        } else {
            self.adapter.stop();
        }
        host.video.detach();
        host.clear_overlay();
        interrupt.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{Frame, MockCameraBackend, MockRecorder};
    use crate::decode::{DecoderConfig, ScriptedEngine};
    use crate::session::{EventLog, ScanEvent, VideoSurface};
    use std::sync::Mutex;
    use std::thread;
    use std::time::Instant;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum VideoEvent {
        Attached(u64),
        Detached,
    }

    /// Video surface that records attach/detach calls.
    #[derive(Clone, Default)]
    struct RecordingVideo {
        events: Arc<Mutex<Vec<VideoEvent>>>,
        attached: bool,
    }

    impl RecordingVideo {
        fn events(&self) -> Vec<VideoEvent> {
            self.events.lock().unwrap().clone()
        }

        fn was_attached(&self) -> bool {
            self.events()
                .iter()
                .any(|e| matches!(e, VideoEvent::Attached(_)))
        }
    }

    impl VideoSurface for RecordingVideo {
        fn attach(&mut self, stream: &MediaStream) {
            self.attached = true;
            self.events.lock().unwrap().push(VideoEvent::Attached(stream.id()));
        }

        fn present(&mut self, _frame: &Frame) {}

        fn detach(&mut self) {
            self.attached = false;
            self.events.lock().unwrap().push(VideoEvent::Detached);
        }

        fn is_attached(&self) -> bool {
            self.attached
        }
    }

    fn config(threshold: u32) -> ScanConfig {
        ScanConfig {
            threshold,
            decoder: DecoderConfig {
                frequency: None,
                ..Default::default()
            },
        }
    }

    fn scanner(backend: MockCameraBackend, engine: &ScriptedEngine, threshold: u32) -> Scanner {
        Scanner::new(Box::new(backend), Arc::new(engine.clone()), config(threshold)).unwrap()
    }

    fn small_camera() -> MockCameraBackend {
        MockCameraBackend::new().with_resolution(32, 24)
    }

    fn host(video: &RecordingVideo) -> HostSurface {
        HostSurface::new(
            Box::new(video.clone()),
            Some(Box::new(crate::overlay::RasterOverlay::new(32, 24))),
        )
    }

    fn wait_for(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "timed out waiting for condition");
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn assert_released(recorder: &MockRecorder, video: &RecordingVideo) {
        assert!(recorder.all_tracks_stopped(), "a track is still live");
        if video.was_attached() {
            assert_eq!(video.events().last(), Some(&VideoEvent::Detached));
        }
    }

    #[test]
    fn test_interleaved_reads_confirm_majority_code() {
        let camera = small_camera();
        let recorder = camera.recorder();
        let engine = ScriptedEngine::codes(["111", "111", "222", "111"]);
        let mut scanner = scanner(camera, &engine, 3);
        let video = RecordingVideo::default();
        let log = Arc::new(EventLog::new());

        let report = scanner.scan(&mut host(&video), log.clone());

        assert_eq!(log.events(), [ScanEvent::Detected("111".into())]);
        assert_eq!(
            report.outcome,
            SessionOutcome::Detected {
                code: "111".into(),
                source: DetectionSource::Camera
            }
        );
        assert!(report.frames_processed >= 4);
        assert_eq!(report.tier.as_deref(), Some("rear-exact"));
        assert_released(&recorder, &video);
        assert!(video.was_attached());
        assert_eq!(engine.created(), engine.shut_down());
    }

    #[test]
    fn test_single_read_threshold() {
        let camera = small_camera();
        let engine = ScriptedEngine::codes(["4006381333931"]);
        let mut scanner = scanner(camera, &engine, 1);
        let log = Arc::new(EventLog::new());

        let report = scanner.scan(&mut HostSurface::headless(), log.clone());
        assert_eq!(report.code(), Some("4006381333931"));
        assert_eq!(log.events().len(), 1);
    }

    #[test]
    fn test_denied_tier_falls_back_without_error() {
        let camera = small_camera().fail_next(AcquisitionError::PermissionDenied("denied".into()));
        let recorder = camera.recorder();
        let engine = ScriptedEngine::codes(["9", "9", "9"]);
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
        let mut scanner = scanner(camera, &engine, 3).with_tiers(tiers);
        let log = Arc::new(EventLog::new());

        let report = scanner.scan(&mut HostSurface::headless(), log.clone());
        assert_eq!(report.tier.as_deref(), Some("examplesB"));
        assert_eq!(log.events(), [ScanEvent::Detected("9".into())]);
        assert_eq!(recorder.attempts(), ["examplesA", "examplesB"]);
        assert_eq!(scanner.stats().snapshot().tier_failures, 1);
    }

    #[test]
    fn test_all_tiers_fail_reports_last_error() {
        let camera = small_camera()
            .fail_next(AcquisitionError::PermissionDenied("a".into()))
            .fail_next(AcquisitionError::ConstraintsNotSatisfiable("b".into()))
            .fail_next(AcquisitionError::DeviceBusy("c".into()))
            .fail_next(AcquisitionError::DeviceBusy("d".into()));
        let engine = ScriptedEngine::new();
        let mut scanner = scanner(camera, &engine, 3);
        let video = RecordingVideo::default();
        let log = Arc::new(EventLog::new());

        let report = scanner.scan(&mut host(&video), log.clone());
        assert_eq!(report.outcome, SessionOutcome::Failed(ScanError::DeviceBusy));
        assert_eq!(log.events(), [ScanEvent::Error(ScanError::DeviceBusy.user_message())]);
        assert!(!video.was_attached());
        assert_eq!(engine.created(), 0);
    }

    #[test]
    fn test_cancel_while_acquiring_discards_late_stream() {
        let (camera, gate) = small_camera().gated();
        let recorder = camera.recorder();
        let engine = ScriptedEngine::codes(["1", "1", "1"]);
        let mut scanner = scanner(camera, &engine, 3);
        let video = RecordingVideo::default();
        let log = Arc::new(EventLog::new());

        let session = scanner.open(log.clone());
        let control = session.control();
        let report = thread::scope(|s| {
            let video = video.clone();
            let handle = s.spawn(move || session.run(&mut host(&video)));

            wait_for(|| !recorder.attempts().is_empty());
            assert_eq!(control.state(), SessionState::AcquiringCamera);
            control.cancel();
            assert_eq!(log.events(), [ScanEvent::Closed]);

            gate.release();
            handle.join().unwrap()
        });

        assert_eq!(report.outcome, SessionOutcome::Closed);
        assert_eq!(log.events(), [ScanEvent::Closed]);
        assert_eq!(recorder.probes().len(), 1);
        assert!(recorder.all_tracks_stopped());
        assert!(!video.was_attached());
        assert_eq!(engine.created(), 0);
    }

    #[test]
    fn test_cancel_while_decoding_is_idempotent() {
        let camera = small_camera();
        let recorder = camera.recorder();
        let engine = ScriptedEngine::new();
        let mut scanner = scanner(camera, &engine, 3);
        let video = RecordingVideo::default();
        let log = Arc::new(EventLog::new());

        let session = scanner.open(log.clone());
        let control = session.control();
        let report = thread::scope(|s| {
            let video = video.clone();
            let handle = s.spawn(move || session.run(&mut host(&video)));

            wait_for(|| control.state() == SessionState::Decoding);
            control.cancel();
            control.cancel();
            handle.join().unwrap()
        });
        control.cancel();

        assert_eq!(report.outcome, SessionOutcome::Closed);
        assert_eq!(log.events(), [ScanEvent::Closed]);
        assert_eq!(control.state(), SessionState::Closed);
        assert_released(&recorder, &video);
        assert_eq!(engine.created(), engine.shut_down());
    }

    #[test]
    fn test_manual_entry_while_decoding() {
        let camera = small_camera();
        let recorder = camera.recorder();
        let engine = ScriptedEngine::new();
        let mut scanner = scanner(camera, &engine, 3);
        let video = RecordingVideo::default();
        let log = Arc::new(EventLog::new());

        let session = scanner.open(log.clone());
        let control = session.control();
        let report = thread::scope(|s| {
            let video = video.clone();
            let handle = s.spawn(move || session.run(&mut host(&video)));

            wait_for(|| control.state() == SessionState::Decoding);
            control.submit_manual("5012345678900");
            handle.join().unwrap()
        });

        assert_eq!(
            report.outcome,
            SessionOutcome::Detected {
                code: "5012345678900".into(),
                source: DetectionSource::Manual
            }
        );
        assert_eq!(log.events(), [ScanEvent::Detected("5012345678900".into())]);
        assert_released(&recorder, &video);
        assert_eq!(scanner.stats().snapshot().manual_entries, 1);
    }

    #[test]
    fn test_manual_entry_before_run() {
        let camera = small_camera();
        let recorder = camera.recorder();
        let engine = ScriptedEngine::new();
        let mut scanner = scanner(camera, &engine, 3);
        let log = Arc::new(EventLog::new());

        let session = scanner.open(log.clone());
        session.control().submit_manual("42");
        let report = session.run(&mut HostSurface::headless());

        assert_eq!(report.code(), Some("42"));
        assert_eq!(log.events(), [ScanEvent::Detected("42".into())]);
        assert!(recorder.attempts().is_empty());
    }

    #[test]
    fn test_interrupt_relay_cancels_open_session() {
        let camera = small_camera();
        let recorder = camera.recorder();
        let engine = ScriptedEngine::new();
        let relay = InterruptRelay::new();
        let mut scanner = scanner(camera, &engine, 3).with_interrupts(Arc::clone(&relay));
        let log = Arc::new(EventLog::new());

        let session = scanner.open(log.clone());
        let control = session.control();
        let report = thread::scope(|s| {
            let handle = s.spawn(move || session.run(&mut HostSurface::headless()));
            wait_for(|| control.state() == SessionState::Decoding);
            assert_eq!(relay.fire(), 1);
            handle.join().unwrap()
        });

        assert_eq!(report.outcome, SessionOutcome::Closed);
        assert!(recorder.all_tracks_stopped());
        assert_eq!(relay.listener_count(), 0);
    }

    #[test]
    fn test_decoder_init_failure() {
        let camera = small_camera();
        let recorder = camera.recorder();
        let engine = ScriptedEngine::new().failing_init("engine assets missing");
        let mut scanner = scanner(camera, &engine, 3);
        let video = RecordingVideo::default();
        let log = Arc::new(EventLog::new());

        let report = scanner.scan(&mut host(&video), log.clone());
        let err = ScanError::DecoderInitFailed("engine assets missing".into());
        assert_eq!(log.events(), [ScanEvent::Error(err.user_message())]);
        assert_eq!(report.outcome, SessionOutcome::Failed(err));
        assert_released(&recorder, &video);
    }

    #[test]
    fn test_unready_stream_fails_not_ready() {
        let camera = small_camera().unready();
        let recorder = camera.recorder();
        let engine = ScriptedEngine::new();
        let mut scanner = scanner(camera, &engine, 3);
        let log = Arc::new(EventLog::new());

        let report = scanner.scan(&mut HostSurface::headless(), log.clone());
        assert_eq!(report.outcome, SessionOutcome::Failed(ScanError::NotReady));
        assert!(recorder.all_tracks_stopped());
        assert_eq!(engine.created(), 0);
    }

    #[test]
    fn test_track_ending_fails_session() {
        let camera = small_camera().with_frame_limit(1);
        let recorder = camera.recorder();
        let engine = ScriptedEngine::codes(["111"]);
        let mut scanner = scanner(camera, &engine, 3);
        let log = Arc::new(EventLog::new());

        let report = scanner.scan(&mut HostSurface::headless(), log.clone());
        assert_eq!(report.outcome, SessionOutcome::Failed(ScanError::StreamEnded));
        assert_eq!(report.frames_processed, 1);
        assert_eq!(log.events().len(), 1);
        assert!(recorder.all_tracks_stopped());
    }

    #[test]
    fn test_transient_read_failures_still_confirm() {
        let failures = MAX_CONSECUTIVE_READ_FAILURES - 1;
        let camera = small_camera().fail_reads(1..=u64::from(failures));
        let recorder = camera.recorder();
        let engine = ScriptedEngine::codes(["111", "111", "111"]);
        let mut scanner = scanner(camera, &engine, 3);
        let video = RecordingVideo::default();
        let log = Arc::new(EventLog::new());

        let report = scanner.scan(&mut host(&video), log.clone());

        assert_eq!(log.events(), [ScanEvent::Detected("111".into())]);
        assert_eq!(report.code(), Some("111"));
        assert_eq!(scanner.stats().snapshot().read_failures, u64::from(failures));
        assert_released(&recorder, &video);
    }

    #[test]
    fn test_consecutive_read_failures_fail_session() {
        let limit = u64::from(MAX_CONSECUTIVE_READ_FAILURES);
        let camera = small_camera().fail_reads(0..limit);
        let recorder = camera.recorder();
        let engine = ScriptedEngine::codes(["111", "111", "111"]);
        let mut scanner = scanner(camera, &engine, 3);
        let video = RecordingVideo::default();
        let log = Arc::new(EventLog::new());

        let report = scanner.scan(&mut host(&video), log.clone());

        let err = ScanError::Unknown(format!("corrupt buffer on read {}", limit - 1));
        assert_eq!(log.events(), [ScanEvent::Error(err.user_message())]);
        assert_eq!(report.outcome, SessionOutcome::Failed(err));
        assert_eq!(report.frames_processed, 0);
        assert_eq!(scanner.stats().snapshot().read_failures, limit);
        assert_released(&recorder, &video);
        assert_eq!(engine.created(), engine.shut_down());
    }

    #[test]
    fn test_cancel_reaches_stalled_track() {
        let camera = small_camera().stall_after(1);
        let recorder = camera.recorder();
        let engine = ScriptedEngine::new();
        let mut scanner = scanner(camera, &engine, 3);
        let log = Arc::new(EventLog::new());

        let session = scanner.open(log.clone());
        let control = session.control();
        let report = thread::scope(|s| {
            let handle = s.spawn(move || session.run(&mut HostSurface::headless()));
            wait_for(|| control.state() == SessionState::Decoding);
            thread::sleep(Duration::from_millis(30));
            control.cancel();
            handle.join().unwrap()
        });

        assert_eq!(report.outcome, SessionOutcome::Closed);
        assert_eq!(log.events(), [ScanEvent::Closed]);
        assert!(recorder.all_tracks_stopped());
    }

    #[test]
    fn test_retry_starts_with_fresh_tally() {
        let camera = small_camera().with_frame_limit(1);
        let recorder = camera.recorder();
        let engine = ScriptedEngine::codes(["111"]);
        let mut scanner = scanner(camera, &engine, 2);

        let first = Arc::new(EventLog::new());
        let report = scanner.scan(&mut HostSurface::headless(), first.clone());
        assert_eq!(report.outcome, SessionOutcome::Failed(ScanError::StreamEnded));

        // A carried-over tally would confirm on this read
        engine.push(Some(crate::decode::DetectionEvent::decoded(
            "111",
            crate::decode::Symbology::Ean13,
        )));
        let second = Arc::new(EventLog::new());
        let report = scanner.scan(&mut HostSurface::headless(), second.clone());
        assert_eq!(report.outcome, SessionOutcome::Failed(ScanError::StreamEnded));
        assert_ne!(report.session, 1);

        assert_eq!(first.events().len(), 1);
        assert_eq!(second.events().len(), 1);
        assert_eq!(recorder.probes().len(), 2);
        assert!(recorder.all_tracks_stopped());

        let stats = scanner.stats().snapshot();
        assert_eq!(stats.sessions_started, 2);
        assert_eq!(stats.sessions_failed, 2);
    }
}
