//! Prometheus metrics for scan sessions.
//!
//! # Metrics Exposed
//!
//! ## Sessions
//! - `scan_guard_sessions_started_total` - Sessions opened
//! - `scan_guard_sessions_confirmed_total` - Sessions ended with a code
//! - `scan_guard_sessions_failed_total` - Sessions ended with an error
//! - `scan_guard_sessions_closed_total` - Sessions closed without a result
//! - `scan_guard_sessions_live` - Sessions currently running
//!
//! ## Decoding
//! - `scan_guard_frames_processed_total` - Frames the decoder processed
//! - `scan_guard_detections_total` - Frames that yielded a decoded code
//! - `scan_guard_frame_read_failures_total` - Camera frames that could not be read
//!
//! ## Input
//! - `scan_guard_camera_tier_failures_total` - Failed camera tier requests
//! - `scan_guard_manual_entries_total` - Manually entered codes
//!
//! # Example
//!
//! ```no_run
//! use scan_guard::metrics::MetricsRegistry;
//! use scan_guard::session::ScanStats;
//!
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//! let stats = ScanStats::new();
//!
//! registry.update(&stats.snapshot());
//! println!("{}", registry.encode().unwrap());
//! ```

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsRegistry};
#[cfg(feature = "metrics")]
pub use server::{MetricsServer, MetricsServerConfig, MetricsState, ServerError};
