//! Native camera backend built on `nokhwa`.
//!
//! Facing direction is not exposed by every platform, so it is inferred
//! from the device name. Errors are classified from the backend's message
//! text into the acquisition taxonomy.

use super::{
    stream::{CaptureError, MediaStream, MediaTrack, ReadyState},
    AcquisitionError, CameraBackend, CameraConstraintTier, FacingMode, Frame, Resolution,
};
use nokhwa::{
    pixel_format::LumaFormat,
    utils::{
        ApiBackend, CameraFormat, CameraInfo, FrameFormat, RequestedFormat, RequestedFormatType,
        Resolution as NokhwaResolution,
    },
    Camera, NokhwaError,
};

/// Camera backend using the platform's native capture API.
#[derive(Debug, Default)]
pub struct NativeCameraBackend;

impl NativeCameraBackend {
    pub fn new() -> Self {
        Self
    }

    fn pick_device(
        &self,
        tier: &CameraConstraintTier,
    ) -> Result<CameraInfo, AcquisitionError> {
        let devices = nokhwa::query(ApiBackend::Auto).map_err(|e| classify(&e))?;
        if devices.is_empty() {
            return Err(AcquisitionError::NoDevice("no capture devices reported".into()));
        }

        let matching = devices
            .iter()
            .find(|info| guess_facing(&info.human_name()) == Some(tier.facing));

        match (matching, tier.facing, tier.exact_facing) {
            (Some(info), _, _) => Ok(info.clone()),
            (None, FacingMode::Any, _) | (None, _, false) => Ok(devices[0].clone()),
            (None, facing, true) => Err(AcquisitionError::ConstraintsNotSatisfiable(format!(
                "no camera facing {}",
                facing.as_str()
            ))),
        }
    }
}

impl CameraBackend for NativeCameraBackend {
    fn get_user_media(
        &mut self,
        tier: &CameraConstraintTier,
    ) -> Result<MediaStream, AcquisitionError> {
        let info = self.pick_device(tier)?;
        let format = CameraFormat::new(
            NokhwaResolution::new(tier.ideal.width, tier.ideal.height),
            FrameFormat::MJPEG,
            tier.frame_rate.unwrap_or(30),
        );
        let requested =
            RequestedFormat::new::<LumaFormat>(RequestedFormatType::Closest(format));

        let mut camera = Camera::new(info.index().clone(), requested).map_err(|e| classify(&e))?;
        camera.open_stream().map_err(|e| classify(&e))?;

        let actual = camera.resolution();
        let actual = Resolution::new(actual.width(), actual.height());
        if !tier.accepts(&actual) {
            let _ = camera.stop_stream();
            return Err(AcquisitionError::ConstraintsNotSatisfiable(format!(
                "device delivered {actual}"
            )));
        }

        let label = info.human_name();
        tracing::info!(tier = %tier.name, device = %label, resolution = %actual, "Native camera opened");

        let track = NativeTrack {
            label,
            camera,
            sequence: 0,
            live: true,
        };
        Ok(MediaStream::new(tier.name.clone(), vec![Box::new(track)]))
    }
}

struct NativeTrack {
    label: String,
    camera: Camera,
    sequence: u64,
    live: bool,
}

impl MediaTrack for NativeTrack {
    fn label(&self) -> &str {
        &self.label
    }

    fn ready_state(&self) -> ReadyState {
        if self.live && self.camera.is_stream_open() {
            ReadyState::Live
        } else {
            ReadyState::Ended
        }
    }

    fn read_frame(&mut self) -> Result<Frame, CaptureError> {
        if self.ready_state() == ReadyState::Ended {
            return Err(CaptureError::Ended);
        }
        // Returns with the driver's next buffer, one frame interval while streaming
        let buffer = self
            .camera
            .frame()
            .map_err(|e| CaptureError::ReadFailed(e.to_string()))?;
        let image = buffer
            .decode_image::<LumaFormat>()
            .map_err(|e| CaptureError::ReadFailed(e.to_string()))?;

        self.sequence += 1;
        let (width, height) = (image.width(), image.height());
        Ok(Frame::new(image.into_raw(), width, height, self.sequence))
    }

    fn stop(&mut self) {
        if !self.live {
            return;
        }
        self.live = false;
        if let Err(e) = self.camera.stop_stream() {
            tracing::warn!(track = %self.label, error = %e, "Failed to stop camera stream");
        }
    }
}

/// Infers facing direction from a device name.
fn guess_facing(name: &str) -> Option<FacingMode> {
    let name = name.to_lowercase();
    if ["back", "rear", "environment", "world"]
        .iter()
        .any(|k| name.contains(k))
    {
        Some(FacingMode::Environment)
    } else if ["front", "user", "facetime", "integrated", "webcam"]
        .iter()
        .any(|k| name.contains(k))
    {
        Some(FacingMode::User)
    } else {
        None
    }
}

fn classify(err: &NokhwaError) -> AcquisitionError {
    classify_message(&err.to_string())
}

fn classify_message(message: &str) -> AcquisitionError {
    let lower = message.to_lowercase();
    let has = |keys: &[&str]| keys.iter().any(|k| lower.contains(k));

    if has(&["permission", "denied", "not authorized", "notallowed"]) {
        AcquisitionError::PermissionDenied(message.to_string())
    } else if has(&["busy", "in use", "resource temporarily"]) {
        AcquisitionError::DeviceBusy(message.to_string())
    } else if has(&["no such device", "not found", "no device", "index out of"]) {
        AcquisitionError::NoDevice(message.to_string())
    } else if has(&["format", "resolution", "unsupported", "overconstrained"]) {
        AcquisitionError::ConstraintsNotSatisfiable(message.to_string())
    } else {
        AcquisitionError::Unknown(message.to_string())
    }
}
