//! Decoder engine abstraction.
//!
//! The engine is the computer-vision component that locates and decodes
//! barcodes in a single frame. The scanning core never decodes symbols
//! itself; it drives an engine through this trait.

use super::{DecoderConfig, Symbology};
use crate::capture::Frame;
use crate::geometry::Point;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Engine failure reported during initialization.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct EngineError(pub String);

/// Result of processing one frame.
///
/// Either a decoded `code`, a located-but-undecoded `region`, or both.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionEvent {
    /// Decoded payload, if the symbol was read.
    pub code: Option<String>,
    /// Symbology of the decoded payload.
    pub symbology: Option<Symbology>,
    /// Candidate polygon in frame coordinates.
    pub region: Option<Vec<Point>>,
}

impl DetectionEvent {
    pub fn decoded(code: impl Into<String>, symbology: Symbology) -> Self {
        Self {
            code: Some(code.into()),
            symbology: Some(symbology),
            region: None,
        }
    }

    pub fn located(region: Vec<Point>) -> Self {
        Self {
            code: None,
            symbology: None,
            region: Some(region),
        }
    }

    pub fn with_region(mut self, region: Vec<Point>) -> Self {
        self.region = Some(region);
        self
    }

    pub fn is_decoded(&self) -> bool {
        self.code.is_some()
    }

    /// Shifts the region by `(dx, dy)`, e.g. from crop to frame space.
    pub fn translated(mut self, dx: f32, dy: f32) -> Self {
        if let Some(region) = self.region.as_mut() {
            for point in region.iter_mut() {
                *point = point.offset(dx, dy);
            }
        }
        self
    }
}

/// A barcode decoder bound to one worker.
pub trait DecoderEngine: Send {
    /// Prepares the engine. Called once, before the first frame.
    fn init(&mut self, config: &DecoderConfig) -> Result<(), EngineError>;

    /// Processes one frame. Returns `None` when nothing was found.
    fn decode(&mut self, frame: &Frame) -> Option<DetectionEvent>;

    /// Releases engine resources. Called once when the worker exits.
    fn shutdown(&mut self) {}
}

/// Creates engine instances, one per decoder worker.
pub trait EngineFactory: Send + Sync {
    fn create(&self) -> Box<dyn DecoderEngine>;
}

type Script = Arc<Mutex<VecDeque<Option<DetectionEvent>>>>;

/// Engine factory that replays a fixed sequence of detections.
///
/// Every engine it creates pulls from the same shared script, one entry
/// per decoded frame. Once the script runs out, frames yield nothing.
#[derive(Debug, Clone, Default)]
pub struct ScriptedEngine {
    script: Script,
    init_failure: Option<String>,
    created: Arc<AtomicUsize>,
    shut_down: Arc<AtomicUsize>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// A script of decoded codes, one per frame.
    pub fn codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let engine = Self::new();
        for code in codes {
            engine.push(Some(DetectionEvent::decoded(code, Symbology::Ean13)));
        }
        engine
    }

    /// Appends one frame's outcome to the script.
    pub fn push(&self, event: Option<DetectionEvent>) {
        self.lock().push_back(event);
    }

    /// Makes every created engine fail `init` with `message`.
    pub fn failing_init(mut self, message: impl Into<String>) -> Self {
        self.init_failure = Some(message.into());
        self
    }

    /// Remaining, unconsumed script entries.
    pub fn remaining(&self) -> usize {
        self.lock().len()
    }

    /// Number of engines created so far.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Number of engines that have been shut down.
    pub fn shut_down(&self) -> usize {
        self.shut_down.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Option<DetectionEvent>>> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EngineFactory for ScriptedEngine {
    fn create(&self) -> Box<dyn DecoderEngine> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Box::new(ScriptedWorker {
            script: Arc::clone(&self.script),
            init_failure: self.init_failure.clone(),
            shut_down: Arc::clone(&self.shut_down),
            symbologies: Default::default(),
        })
    }
}

struct ScriptedWorker {
    script: Script,
    init_failure: Option<String>,
    shut_down: Arc<AtomicUsize>,
    symbologies: std::collections::BTreeSet<Symbology>,
}

impl DecoderEngine for ScriptedWorker {
    fn init(&mut self, config: &DecoderConfig) -> Result<(), EngineError> {
        if let Some(message) = &self.init_failure {
            return Err(EngineError(message.clone()));
        }
        self.symbologies = config.symbologies.clone();
        Ok(())
    }

    fn decode(&mut self, _frame: &Frame) -> Option<DetectionEvent> {
        let event = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .flatten()?;

        // Symbologies the caller did not ask for are never reported
        match event.symbology {
            Some(symbology) if !self.symbologies.contains(&symbology) => None,
            _ => Some(event),
        }
    }

    fn shutdown(&mut self) {
        self.shut_down.fetch_add(1, Ordering::SeqCst);
    }
}
