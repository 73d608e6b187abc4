//! Host-owned display surfaces a session draws into.

use crate::capture::{Frame, MediaStream};
use crate::overlay::OverlaySurface;

/// The host's video element.
///
/// The session attaches its stream when decoding starts and always
/// detaches it during teardown, before the observer is notified.
pub trait VideoSurface {
    /// Binds the surface to a live stream.
    fn attach(&mut self, stream: &MediaStream);

    /// Shows one captured frame. Hosts that render the stream
    /// themselves can ignore this.
    fn present(&mut self, _frame: &Frame) {}

    /// Unbinds the stream. Must be safe to call when nothing is attached.
    fn detach(&mut self);

    fn is_attached(&self) -> bool;
}

/// A video surface that displays nothing.
#[derive(Debug, Default)]
pub struct HeadlessVideo {
    attached: Option<u64>,
    presented: u64,
}

impl HeadlessVideo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of the attached stream.
    pub fn stream_id(&self) -> Option<u64> {
        self.attached
    }

    /// Frames presented since creation.
    pub fn presented(&self) -> u64 {
        self.presented
    }
}

impl VideoSurface for HeadlessVideo {
    fn attach(&mut self, stream: &MediaStream) {
        self.attached = Some(stream.id());
    }

    fn present(&mut self, _frame: &Frame) {
        self.presented += 1;
    }

    fn detach(&mut self) {
        self.attached = None;
    }

    fn is_attached(&self) -> bool {
        self.attached.is_some()
    }
}

/// Video element plus optional overlay, as provided by the host.
///
/// The overlay may be absent, for instance when the host tears its view
/// down while a session is still running; rendering then becomes a no-op.
pub struct HostSurface {
    pub video: Box<dyn VideoSurface>,
    pub overlay: Option<Box<dyn OverlaySurface>>,
}

impl HostSurface {
    pub fn new(video: Box<dyn VideoSurface>, overlay: Option<Box<dyn OverlaySurface>>) -> Self {
        Self { video, overlay }
    }

    /// A surface with no display at all.
    pub fn headless() -> Self {
        Self::new(Box::new(HeadlessVideo::new()), None)
    }

    pub fn overlay_mut(&mut self) -> Option<&mut dyn OverlaySurface> {
        match self.overlay {
            Some(ref mut overlay) => Some(overlay.as_mut()),
            None => None,
        }
    }

    /// Blanks the overlay, if there is one.
    pub(crate) fn clear_overlay(&mut self) {
        if let Some(overlay) = self.overlay_mut() {
            overlay.clear();
        }
    }
}

impl std::fmt::Debug for HostSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostSurface")
            .field("video_attached", &self.video.is_attached())
            .field("overlay", &self.overlay.is_some())
            .finish()
    }
}
