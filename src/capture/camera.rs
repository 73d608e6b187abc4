//! Camera backend abstraction.
//!
//! This module provides a trait-based abstraction over the platform's
//! media-capture API, allowing for both real camera input and mock
//! implementations for testing.

use super::{
    stream::{CaptureError, MediaStream, MediaTrack, ReadyState},
    CameraConstraintTier, Frame, Resolution,
};
use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;

/// Reasons a camera request can fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcquisitionError {
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),
    #[error("camera device not found: {0}")]
    NoDevice(String),
    #[error("camera device busy: {0}")]
    DeviceBusy(String),
    #[error("camera constraints not satisfiable: {0}")]
    ConstraintsNotSatisfiable(String),
    #[error("camera request aborted")]
    Aborted,
    #[error("camera request failed: {0}")]
    Unknown(String),
}

impl AcquisitionError {
    /// Stable short reason, for structured logs and metrics labels.
    pub fn reason(&self) -> &'static str {
        match self {
            AcquisitionError::PermissionDenied(_) => "permission_denied",
            AcquisitionError::NoDevice(_) => "no_device",
            AcquisitionError::DeviceBusy(_) => "device_busy",
            AcquisitionError::ConstraintsNotSatisfiable(_) => "constraints_not_satisfiable",
            AcquisitionError::Aborted => "aborted",
            AcquisitionError::Unknown(_) => "unknown",
        }
    }
}

/// The platform media-capture API.
///
/// One call requests one stream for one constraint tier. The call may
/// block for as long as the platform needs, including while a permission
/// prompt is showing.
pub trait CameraBackend: Send {
    fn get_user_media(
        &mut self,
        tier: &CameraConstraintTier,
    ) -> Result<MediaStream, AcquisitionError>;
}

/// Observes whether a track created by [`MockCameraBackend`] is still live.
#[derive(Debug, Clone)]
pub struct TrackProbe {
    label: String,
    live: Arc<AtomicBool>,
}

impl TrackProbe {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct RecorderState {
    attempts: Vec<String>,
    probes: Vec<TrackProbe>,
}

/// Shared view of everything a [`MockCameraBackend`] has handed out.
#[derive(Debug, Clone, Default)]
pub struct MockRecorder {
    inner: Arc<Mutex<RecorderState>>,
}

impl MockRecorder {
    /// Names of the tiers requested, in request order.
    pub fn attempts(&self) -> Vec<String> {
        self.lock().attempts.clone()
    }

    /// Probes for every track ever created.
    pub fn probes(&self) -> Vec<TrackProbe> {
        self.lock().probes.clone()
    }

    /// True if every created track has been stopped.
    pub fn all_tracks_stopped(&self) -> bool {
        self.lock().probes.iter().all(|p| !p.is_live())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RecorderState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Releases a gated [`MockCameraBackend`] request.
#[derive(Debug, Clone)]
pub struct MockGate {
    tx: Sender<()>,
}

impl MockGate {
    /// Lets one pending request complete.
    pub fn release(&self) {
        let _ = self.tx.send(());
    }
}

/// Mock camera backend for testing that produces synthetic frames.
///
/// Requests are answered from a script: each queued failure is returned
/// for one request, and once the script is empty every request succeeds.
pub struct MockCameraBackend {
    script: VecDeque<AcquisitionError>,
    resolution: Option<Resolution>,
    frame_limit: Option<u64>,
    frame_interval: Option<Duration>,
    read_failures: BTreeSet<u64>,
    stall_after: Option<u64>,
    ready: bool,
    gate: Option<Receiver<()>>,
    recorder: MockRecorder,
}

impl MockCameraBackend {
    pub fn new() -> Self {
        Self {
            script: VecDeque::new(),
            resolution: None,
            frame_limit: None,
            frame_interval: None,
            read_failures: BTreeSet::new(),
            stall_after: None,
            ready: true,
            gate: None,
            recorder: MockRecorder::default(),
        }
    }

    /// Fails the next unanswered request with `err`.
    pub fn fail_next(mut self, err: AcquisitionError) -> Self {
        self.script.push_back(err);
        self
    }

    /// Overrides the frame size (defaults to the tier's ideal size).
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.resolution = Some(Resolution::new(width, height));
        self
    }

    /// Ends each track after `frames` frames.
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.frame_limit = Some(frames);
        self
    }

    /// Paces frame delivery like a real device running at `fps`.
    pub fn with_frame_rate(mut self, fps: u32) -> Self {
        self.frame_interval = (fps > 0).then(|| Duration::from_secs_f64(1.0 / f64::from(fps)));
        self
    }

    /// Makes the given reads (counted from 0 per track) fail as if the
    /// device returned a corrupt buffer.
    pub fn fail_reads(mut self, reads: impl IntoIterator<Item = u64>) -> Self {
        self.read_failures.extend(reads);
        self
    }

    /// Stops delivering frames after `frames`, reporting `NotReady` on
    /// every later read while the track stays live.
    pub fn stall_after(mut self, frames: u64) -> Self {
        self.stall_after = Some(frames);
        self
    }

    /// Hands out streams that are live but never deliver frames.
    pub fn unready(mut self) -> Self {
        self.ready = false;
        self
    }

    /// Blocks every request until the returned gate is released.
    pub fn gated(mut self) -> (Self, MockGate) {
        let (tx, rx) = mpsc::channel();
        self.gate = Some(rx);
        (self, MockGate { tx })
    }

    pub fn recorder(&self) -> MockRecorder {
        self.recorder.clone()
    }
}

impl Default for MockCameraBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraBackend for MockCameraBackend {
    fn get_user_media(
        &mut self,
        tier: &CameraConstraintTier,
    ) -> Result<MediaStream, AcquisitionError> {
        self.recorder.lock().attempts.push(tier.name.clone());

        if let Some(gate) = &self.gate {
            // A dropped gate behaves like an immediate answer.
            let _ = gate.recv();
        }

        if let Some(err) = self.script.pop_front() {
            tracing::debug!(tier = %tier.name, error = %err, "MockCamera refusing request");
            return Err(err);
        }

        let resolution = self.resolution.unwrap_or(tier.ideal);
        let mut track = MockTrack::new(
            format!("mock-{}", tier.name),
            resolution,
            self.frame_limit,
            self.ready,
        );
        track.frame_interval = self.frame_interval;
        track.read_failures = self.read_failures.clone();
        track.stall_after = self.stall_after;
        self.recorder.lock().probes.push(track.probe());

        tracing::info!(tier = %tier.name, %resolution, "MockCamera opened");
        Ok(MediaStream::new(tier.name.clone(), vec![Box::new(track)]))
    }
}

/// Synthetic video track.
#[derive(Debug)]
pub struct MockTrack {
    label: String,
    resolution: Resolution,
    sequence: u64,
    frame_limit: Option<u64>,
    frame_interval: Option<Duration>,
    reads: u64,
    read_failures: BTreeSet<u64>,
    stall_after: Option<u64>,
    ready: bool,
    live: Arc<AtomicBool>,
}

impl MockTrack {
    pub fn new(
        label: impl Into<String>,
        resolution: Resolution,
        frame_limit: Option<u64>,
        ready: bool,
    ) -> Self {
        Self {
            label: label.into(),
            resolution,
            sequence: 0,
            frame_limit,
            frame_interval: None,
            reads: 0,
            read_failures: BTreeSet::new(),
            stall_after: None,
            ready,
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn probe(&self) -> TrackProbe {
        TrackProbe {
            label: self.label.clone(),
            live: Arc::clone(&self.live),
        }
    }
}

impl MediaTrack for MockTrack {
    fn label(&self) -> &str {
        &self.label
    }

    fn ready_state(&self) -> ReadyState {
        if self.live.load(Ordering::SeqCst) {
            ReadyState::Live
        } else {
            ReadyState::Ended
        }
    }

    fn has_frames(&self) -> bool {
        self.ready && self.ready_state() == ReadyState::Live
    }

    fn read_frame(&mut self) -> Result<Frame, CaptureError> {
        if self.ready_state() == ReadyState::Ended {
            return Err(CaptureError::Ended);
        }
        if !self.ready {
            return Err(CaptureError::NotReady);
        }
        if self.frame_limit.is_some_and(|limit| self.sequence >= limit) {
            self.live.store(false, Ordering::SeqCst);
            return Err(CaptureError::Ended);
        }
        if self.stall_after.is_some_and(|after| self.sequence >= after) {
            std::thread::sleep(self.frame_interval.unwrap_or(Duration::from_millis(1)));
            return Err(CaptureError::NotReady);
        }

        let read = self.reads;
        self.reads += 1;
        if self.read_failures.contains(&read) {
            return Err(CaptureError::ReadFailed(format!("corrupt buffer on read {read}")));
        }

        if let Some(interval) = self.frame_interval {
            std::thread::sleep(interval);
        }

        let Resolution { width, height } = self.resolution;
        let pixel_count = (width * height) as usize;
        let pixels: Vec<u8> = (0..pixel_count)
            .map(|i| ((i as u64 ^ self.sequence) % 256) as u8)
            .collect();

        self.sequence += 1;
        Ok(Frame::new(pixels, width, height, self.sequence))
    }

    fn stop(&mut self) {
        if self.live.swap(false, Ordering::SeqCst) {
            tracing::info!(track = %self.label, "MockTrack stopped");
        }
    }
}
