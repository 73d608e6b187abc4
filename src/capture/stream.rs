//! Media tracks and the stream that owns them.

use super::Frame;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

/// Errors reading from a live track.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("track has ended")]
    Ended,
    #[error("track is not delivering frames yet")]
    NotReady,
    #[error("failed to read frame: {0}")]
    ReadFailed(String),
}

/// Lifecycle state of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Live,
    Ended,
}

/// A single video track of a media stream.
///
/// Implementations wrap one platform capture handle. `stop` must be
/// idempotent and must release the underlying device.
pub trait MediaTrack {
    /// Device label, for logging.
    fn label(&self) -> &str;

    fn ready_state(&self) -> ReadyState;

    /// True once the track is live and delivering frames.
    fn has_frames(&self) -> bool {
        self.ready_state() == ReadyState::Live
    }

    /// Returns the next frame.
    ///
    /// May block for at most about one frame interval. A track with no
    /// frame in that time returns [`CaptureError::NotReady`]. Sessions
    /// check for cancellation and manual entry between reads. A
    /// recoverable error, such as one corrupt buffer, is
    /// [`CaptureError::ReadFailed`] and leaves the track live.
    fn read_frame(&mut self) -> Result<Frame, CaptureError>;

    /// Stops the track and releases the device.
    fn stop(&mut self);
}

/// A live camera stream: an exclusive owner of its tracks.
///
/// Dropping the stream stops every track, so a stream can never outlive
/// its owner with the camera still running.
pub struct MediaStream {
    id: u64,
    tier: String,
    tracks: Vec<Box<dyn MediaTrack>>,
}

impl MediaStream {
    /// Wraps tracks obtained for the tier named `tier`.
    pub fn new(tier: impl Into<String>, tracks: Vec<Box<dyn MediaTrack>>) -> Self {
        Self {
            id: NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed),
            tier: tier.into(),
            tracks,
        }
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Name of the constraint tier that produced this stream.
    #[inline]
    pub fn tier(&self) -> &str {
        &self.tier
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn live_track_count(&self) -> usize {
        self.tracks
            .iter()
            .filter(|t| t.ready_state() == ReadyState::Live)
            .count()
    }

    /// True if any track is still live.
    pub fn is_live(&self) -> bool {
        self.live_track_count() > 0
    }

    /// True if a track is live and already delivering frames.
    pub fn is_ready(&self) -> bool {
        self.tracks.iter().any(|t| t.has_frames())
    }

    /// Reads the next frame from the first live track.
    pub fn read_frame(&mut self) -> Result<Frame, CaptureError> {
        let track = self
            .tracks
            .iter_mut()
            .find(|t| t.ready_state() == ReadyState::Live)
            .ok_or(CaptureError::Ended)?;
        track.read_frame()
    }

    /// Stops every track. Safe to call repeatedly.
    pub fn stop(&mut self) {
        for track in self.tracks.iter_mut() {
            if track.ready_state() == ReadyState::Live {
                tracing::debug!(stream = self.id, track = track.label(), "Stopping track");
                track.stop();
            }
        }
    }
}

impl Drop for MediaStream {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStream")
            .field("id", &self.id)
            .field("tier", &self.tier)
            .field("tracks", &self.tracks.len())
            .field("live", &self.live_track_count())
            .finish()
    }
}
