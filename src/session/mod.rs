//! Scan session lifecycle.
//!
//! A session moves through
//! `Idle → AcquiringCamera → Decoding → {Confirmed | Failed} → Closed`,
//! owning the camera stream, the decoder binding, the consensus tally and
//! its interrupt listener for exactly as long as it is live. The
//! [`Scanner`] tears all of them down in a fixed order before the
//! [`ScanObserver`] hears about the outcome.

mod control;
mod host;
mod interrupt;
mod observer;
mod report;
mod scanner;
mod state;
mod stats;

pub use control::SessionControl;
pub use host::{HeadlessVideo, HostSurface, VideoSurface};
pub use interrupt::{InterruptRelay, InterruptSubscription, SignalError};
pub use observer::{EventLog, ScanEvent, ScanObserver};
pub use report::{DetectionSource, SessionOutcome, SessionReport};
pub use scanner::{ScanSession, Scanner, MAX_CONSECUTIVE_READ_FAILURES};
pub use state::SessionState;
pub use stats::{ScanStats, StatsSnapshot};

/// Exit code used when a scan is interrupted (128 + SIGINT).
pub const EXIT_CODE_INTERRUPTED: i32 = 130;
