//! Decoder lifecycle and detection events.
//!
//! This module wraps a barcode decoder engine behind a session-scoped
//! adapter: engines are created and initialized per session, frames are
//! cropped to the region of interest and throttled to the target
//! frequency, and results are delivered to subscribers strictly in frame
//! order.

mod adapter;
mod config;
mod engine;

pub use adapter::{AdapterStats, DecodeAdapter, ProcessedFrame, Submission, SubscriptionId};
pub use config::{DecoderConfig, LocatorPrecision, RegionOfInterest, Symbology, MAX_WORKERS};
pub use engine::{DecoderEngine, DetectionEvent, EngineError, EngineFactory, ScriptedEngine};
