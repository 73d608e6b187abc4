//! Camera input and frame handling.
//!
//! This module negotiates access to a camera across a ladder of
//! constraint tiers and owns the resulting media stream. The stream is
//! the only handle on the device: stopping or dropping it releases the
//! camera.

mod acquire;
mod camera;
mod frame;
#[cfg(feature = "camera")]
mod native;
mod stream;
mod tier;

pub use acquire::{Acquired, AcquisitionManager};
pub use camera::{
    AcquisitionError, CameraBackend, MockCameraBackend, MockGate, MockRecorder, MockTrack,
    TrackProbe,
};
pub use frame::Frame;
#[cfg(feature = "camera")]
pub use native::NativeCameraBackend;
pub use stream::{CaptureError, MediaStream, MediaTrack, ReadyState};
pub use tier::{CameraConstraintTier, FacingMode, Resolution};
