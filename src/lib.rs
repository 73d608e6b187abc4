//! Scan Guard Library
//!
//! The core of a live barcode scanner: negotiates camera access across a
//! ladder of constraint tiers, drives a barcode decoder engine over the
//! resulting stream, confirms codes by multi-frame consensus, draws live
//! feedback over the video, and guarantees that every camera track and
//! decoder worker is released before the caller hears the result.
//!
//! # Architecture
//!
//! ```text
//! capture → decode → consensus → session callback
//!              ↓          ↓
//!           overlay (per processed frame)
//! ```
//!
//! # Design Principles
//!
//! - **One live session per scanner**: a session mutably borrows its scanner
//! - **Teardown before callback**: observers run after the camera is off
//! - **Independent tallies**: a misread never resets another code's progress
//! - **Late streams are discarded**: cancelling mid-request stops whatever arrives
//!
//! # Example
//!
//! ```no_run
//! use scan_guard::{
//!     capture::MockCameraBackend,
//!     config::ScanConfig,
//!     decode::ScriptedEngine,
//!     session::{EventLog, HostSurface, Scanner},
//! };
//! use std::sync::Arc;
//!
//! let engine = ScriptedEngine::codes(["4006381333931"; 3]);
//! let mut scanner = Scanner::new(
//!     Box::new(MockCameraBackend::new()),
//!     Arc::new(engine),
//!     ScanConfig::default(),
//! )
//! .unwrap();
//!
//! let observer = Arc::new(EventLog::new());
//! let report = scanner.scan(&mut HostSurface::headless(), observer.clone());
//! println!("{report}: {:?}", observer.last());
//! ```

#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod capture;
pub mod config;
pub mod consensus;
pub mod decode;
pub mod error;
pub mod geometry;
pub mod metrics;
pub mod overlay;
pub mod session;

// Re-export commonly used types at crate root
pub use capture::{AcquisitionManager, CameraBackend, CameraConstraintTier, Frame, MockCameraBackend};
pub use config::{FileConfig, ScanConfig};
pub use consensus::{ConsensusTally, Verdict};
pub use decode::{DecodeAdapter, DecoderConfig, DecoderEngine, DetectionEvent, EngineFactory};
pub use error::ScanError;
pub use overlay::OverlayRenderer;
pub use session::{ScanObserver, ScanSession, Scanner, SessionControl, SessionReport, SessionState};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
