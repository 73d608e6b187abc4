//! Session-level error taxonomy.
//!
//! Every failure a scan session can surface to its caller is one of these
//! variants. Each maps to a distinct sentence shown to the user, so the
//! host can explain *why* the camera is unavailable instead of a generic
//! "scanning failed".

use crate::capture::AcquisitionError;
use thiserror::Error;

/// Errors surfaced by a scan session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("camera permission denied")]
    PermissionDenied,
    #[error("no camera device available")]
    NoDevice,
    #[error("camera is busy")]
    DeviceBusy,
    #[error("camera constraints cannot be satisfied")]
    ConstraintsNotSatisfiable,
    #[error("camera request aborted")]
    Aborted,
    #[error("decoder initialization failed: {0}")]
    DecoderInitFailed(String),
    #[error("video stream not ready")]
    NotReady,
    #[error("camera stream ended unexpectedly")]
    StreamEnded,
    #[error("unknown scanner error: {0}")]
    Unknown(String),
}

impl ScanError {
    /// Human-readable explanation suitable for the `on_error` callback.
    pub fn user_message(&self) -> String {
        match self {
            ScanError::PermissionDenied => {
                "Camera access was denied. Allow camera access or enter the code manually.".into()
            }
            ScanError::NoDevice => "No camera was found on this device.".into(),
            ScanError::DeviceBusy => {
                "The camera is in use by another application. Close it and try again.".into()
            }
            ScanError::ConstraintsNotSatisfiable => {
                "The camera does not support the requested settings.".into()
            }
            ScanError::Aborted => "The camera request was interrupted. Please try again.".into(),
            ScanError::DecoderInitFailed(cause) => {
                format!("The barcode reader could not start: {cause}")
            }
            ScanError::NotReady => "The camera stream was not ready. Please try again.".into(),
            ScanError::StreamEnded => "The camera stopped unexpectedly. Please try again.".into(),
            ScanError::Unknown(cause) => format!("Camera error: {cause}"),
        }
    }
}

impl From<AcquisitionError> for ScanError {
    fn from(err: AcquisitionError) -> Self {
        match err {
            AcquisitionError::PermissionDenied(_) => ScanError::PermissionDenied,
            AcquisitionError::NoDevice(_) => ScanError::NoDevice,
            AcquisitionError::DeviceBusy(_) => ScanError::DeviceBusy,
            AcquisitionError::ConstraintsNotSatisfiable(_) => ScanError::ConstraintsNotSatisfiable,
            AcquisitionError::Aborted => ScanError::Aborted,
            AcquisitionError::Unknown(cause) => ScanError::Unknown(cause),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquisition_errors_keep_their_reason() {
        let err: ScanError = AcquisitionError::DeviceBusy("in use".into()).into();
        assert_eq!(err, ScanError::DeviceBusy);

        let err: ScanError = AcquisitionError::Unknown("boom".into()).into();
        assert_eq!(err, ScanError::Unknown("boom".into()));
    }

    #[test]
    fn test_user_messages_are_distinct() {
        let all = [
            ScanError::PermissionDenied,
            ScanError::NoDevice,
            ScanError::DeviceBusy,
            ScanError::ConstraintsNotSatisfiable,
            ScanError::Aborted,
            ScanError::DecoderInitFailed("x".into()),
            ScanError::NotReady,
            ScanError::StreamEnded,
            ScanError::Unknown("x".into()),
        ];
        let messages: std::collections::HashSet<String> =
            all.iter().map(ScanError::user_message).collect();
        assert_eq!(messages.len(), all.len());
    }
}
