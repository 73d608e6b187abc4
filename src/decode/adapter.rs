//! Decode engine adapter.
//!
//! Owns a pool of decoder workers for the lifetime of one scan session
//! and turns their out-of-order results into a single, serialized stream
//! of [`ProcessedFrame`]s delivered in frame order.
//!
//! ```text
//! submit(frame) ──► job queue ──► worker 0..n (engine per worker)
//!                                        │
//! subscribers ◄── reorder buffer ◄── outcomes
//!        (pump)
//! ```
//!
//! Delivery happens only inside [`DecodeAdapter::pump`], on the caller's
//! thread, so subscribers never observe two frames concurrently.

use super::{DecoderConfig, DecoderEngine, DetectionEvent, EngineFactory};
use crate::capture::{Frame, MediaStream};
use crate::error::ScanError;
use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// One processed frame, as seen by subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedFrame {
    /// Sequence number of the source frame.
    pub sequence: u64,
    /// Full frame width (before region cropping).
    pub width: u32,
    /// Full frame height (before region cropping).
    pub height: u32,
    /// What the engine found, in full-frame coordinates.
    pub detection: Option<DetectionEvent>,
}

/// Handle identifying one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// What happened to a submitted frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Queued for decoding.
    Accepted,
    /// Dropped to honor the target frequency.
    Throttled,
    /// Dropped because every worker is busy.
    Busy,
    /// The adapter is not running.
    Stopped,
}

/// Frame counters for the current run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdapterStats {
    pub accepted: u64,
    pub throttled: u64,
    pub busy: u64,
    pub delivered: u64,
}

struct Job {
    ticket: u64,
    frame: Frame,
    origin: (u32, u32),
    full_size: (u32, u32),
}

struct Outcome {
    ticket: u64,
    frame: ProcessedFrame,
}

struct Pool {
    config: DecoderConfig,
    jobs: Option<Sender<Job>>,
    outcomes: Receiver<Outcome>,
    workers: Vec<JoinHandle<()>>,
    in_flight: usize,
    next_ticket: u64,
    next_delivery: u64,
    reorder: BTreeMap<u64, ProcessedFrame>,
    last_dispatch: Option<Instant>,
}

/// Drives decoder engines for one session at a time.
pub struct DecodeAdapter {
    factory: Arc<dyn EngineFactory>,
    pool: Option<Pool>,
    subscribers: Vec<(SubscriptionId, Sender<ProcessedFrame>)>,
    next_subscription: u64,
    stats: AdapterStats,
}

impl DecodeAdapter {
    pub fn new(factory: Arc<dyn EngineFactory>) -> Self {
        Self {
            factory,
            pool: None,
            subscribers: Vec::new(),
            next_subscription: 0,
            stats: AdapterStats::default(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.pool.is_some()
    }

    pub fn stats(&self) -> AdapterStats {
        self.stats
    }

    /// Frames submitted but not yet returned by a worker.
    pub fn in_flight(&self) -> usize {
        self.pool.as_ref().map_or(0, |p| p.in_flight)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Registers a new subscriber for processed frames.
    pub fn subscribe(&mut self) -> (SubscriptionId, Receiver<ProcessedFrame>) {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        let (tx, rx) = mpsc::channel();
        self.subscribers.push((id, tx));
        (id, rx)
    }

    /// Removes a subscriber. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub, _)| *sub != id);
        before != self.subscribers.len()
    }

    /// Initializes one engine per worker and starts the pool.
    ///
    /// The stream must already be delivering frames; otherwise this fails
    /// with [`ScanError::NotReady`] instead of waiting for it.
    pub fn start(&mut self, stream: &MediaStream, config: &DecoderConfig) -> Result<(), ScanError> {
        if self.pool.is_some() {
            return Err(ScanError::Unknown("decoder already started".into()));
        }
        if !stream.is_ready() {
            return Err(ScanError::NotReady);
        }
        config.validate().map_err(ScanError::DecoderInitFailed)?;

        let mut engines: Vec<Box<dyn DecoderEngine>> = Vec::with_capacity(config.workers);
        for _ in 0..config.workers {
            let mut engine = self.factory.create();
            if let Err(err) = engine.init(config) {
                engine.shutdown();
                engines.iter_mut().for_each(|e| e.shutdown());
                tracing::warn!(error = %err, "Decoder engine failed to initialize");
                return Err(ScanError::DecoderInitFailed(err.to_string()));
            }
            engines.push(engine);
        }

        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (outcome_tx, outcome_rx) = mpsc::channel();

        let mut workers = Vec::with_capacity(engines.len());
        for (index, engine) in engines.into_iter().enumerate() {
            let jobs = Arc::clone(&job_rx);
            let outcomes = outcome_tx.clone();
            let spawned = thread::Builder::new()
                .name(format!("scan-decoder-{index}"))
                .spawn(move || worker_loop(engine, jobs, outcomes));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(err) => {
                    drop(job_tx);
                    join_all(workers);
                    return Err(ScanError::DecoderInitFailed(format!(
                        "failed to spawn decoder worker: {err}"
                    )));
                }
            }
        }

        tracing::info!(
            stream = stream.id(),
            workers = workers.len(),
            frequency = ?config.frequency,
            locator = ?config.locator,
            patch = config.locator.patch_size(),
            "Decoder started"
        );

        self.stats = AdapterStats::default();
        self.pool = Some(Pool {
            config: config.clone(),
            jobs: Some(job_tx),
            outcomes: outcome_rx,
            workers,
            in_flight: 0,
            next_ticket: 0,
            next_delivery: 0,
            reorder: BTreeMap::new(),
            last_dispatch: None,
        });
        Ok(())
    }

    /// Offers a frame to the pool.
    ///
    /// Frames arriving faster than the target frequency, or while every
    /// worker is busy, are dropped rather than queued.
    pub fn submit(&mut self, frame: Frame) -> Submission {
        let Some(pool) = self.pool.as_mut() else {
            return Submission::Stopped;
        };

        if let (Some(hz), Some(last)) = (pool.config.frequency, pool.last_dispatch) {
            let interval = Duration::from_secs_f64(1.0 / f64::from(hz));
            if frame.timestamp().saturating_duration_since(last) < interval {
                self.stats.throttled += 1;
                return Submission::Throttled;
            }
        }
        if pool.in_flight >= pool.workers.len() {
            self.stats.busy += 1;
            return Submission::Busy;
        }

        let full_size = (frame.width(), frame.height());
        let timestamp = frame.timestamp();
        let rect = pool.config.region.to_rect(frame.width(), frame.height());
        let frame = if pool.config.region.is_full() {
            frame
        } else {
            frame.crop(rect)
        };

        let job = Job {
            ticket: pool.next_ticket,
            frame,
            origin: (rect.x, rect.y),
            full_size,
        };
        let sent = pool.jobs.as_ref().is_some_and(|jobs| jobs.send(job).is_ok());
        if !sent {
            return Submission::Stopped;
        }

        pool.next_ticket += 1;
        pool.in_flight += 1;
        pool.last_dispatch = Some(timestamp);
        self.stats.accepted += 1;
        Submission::Accepted
    }

    /// Collects finished work and delivers it to subscribers in order.
    ///
    /// Waits up to `wait` for the first outcome when frames are in flight.
    /// Returns the number of frames delivered.
    pub fn pump(&mut self, wait: Duration) -> usize {
        let Some(pool) = self.pool.as_mut() else {
            return 0;
        };

        let mut received = Vec::new();
        if pool.in_flight > 0 && !wait.is_zero() {
            if let Ok(outcome) = pool.outcomes.recv_timeout(wait) {
                received.push(outcome);
            }
        }
        while let Ok(outcome) = pool.outcomes.try_recv() {
            received.push(outcome);
        }
        for outcome in received {
            pool.in_flight = pool.in_flight.saturating_sub(1);
            pool.reorder.insert(outcome.ticket, outcome.frame);
        }

        let mut delivered = 0;
        while let Some(frame) = pool.reorder.remove(&pool.next_delivery) {
            pool.next_delivery += 1;
            tracing::trace!(
                sequence = frame.sequence,
                detected = frame.detection.is_some(),
                "Delivering processed frame"
            );
            self.subscribers
                .retain(|(_, tx)| tx.send(frame.clone()).is_ok());
            delivered += 1;
        }
        self.stats.delivered += delivered as u64;
        delivered
    }

    /// Pumps until nothing is in flight or `timeout` elapses.
    pub fn flush(&mut self, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        let mut delivered = 0;
        while self.in_flight() > 0 {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            delivered += self.pump((deadline - now).min(Duration::from_millis(10)));
        }
        delivered
    }

    /// Deregisters every subscriber, then stops and joins the workers.
    ///
    /// Idempotent, and safe to call when never started.
    pub fn stop(&mut self) {
        self.subscribers.clear();

        let Some(mut pool) = self.pool.take() else {
            return;
        };
        pool.jobs.take();
        let discarded = pool.in_flight + pool.reorder.len();
        join_all(std::mem::take(&mut pool.workers));

        tracing::info!(
            accepted = self.stats.accepted,
            delivered = self.stats.delivered,
            discarded,
            "Decoder stopped"
        );
    }
}

impl Drop for DecodeAdapter {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(
    mut engine: Box<dyn DecoderEngine>,
    jobs: Arc<Mutex<Receiver<Job>>>,
    outcomes: Sender<Outcome>,
) {
    loop {
        let job = match jobs.lock() {
            Ok(rx) => rx.recv(),
            Err(_) => break,
        };
        let Ok(job) = job else {
            break;
        };

        let (dx, dy) = (job.origin.0 as f32, job.origin.1 as f32);
        let detection = engine.decode(&job.frame).map(|d| d.translated(dx, dy));
        let outcome = Outcome {
            ticket: job.ticket,
            frame: ProcessedFrame {
                sequence: job.frame.sequence(),
                width: job.full_size.0,
                height: job.full_size.1,
                detection,
            },
        };
        if outcomes.send(outcome).is_err() {
            break;
        }
    }
    engine.shutdown();
}

fn join_all(workers: Vec<JoinHandle<()>>) {
    for handle in workers {
        if handle.join().is_err() {
            tracing::warn!("Decoder worker panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CameraBackend, CameraConstraintTier, MockCameraBackend};
    use crate::decode::{EngineError, RegionOfInterest, ScriptedEngine};
    use crate::geometry::Point;

    fn stream() -> MediaStream {
        MockCameraBackend::new()
            .with_resolution(640, 480)
            .get_user_media(&CameraConstraintTier::any())
            .unwrap()
    }

    fn every_frame(workers: usize) -> DecoderConfig {
        DecoderConfig {
            workers,
            frequency: None,
            ..Default::default()
        }
    }

    fn frame(sequence: u64) -> Frame {
        Frame::new(vec![0u8; 640 * 480], 640, 480, sequence)
    }

    /// Reports each frame's sequence number as its code, slower for
    /// early frames so workers finish out of order.
    struct EchoEngine;

    impl DecoderEngine for EchoEngine {
        fn init(&mut self, _config: &DecoderConfig) -> Result<(), EngineError> {
            Ok(())
        }

        fn decode(&mut self, frame: &Frame) -> Option<DetectionEvent> {
            thread::sleep(Duration::from_millis(5 * (5 - frame.sequence().min(4))));
            Some(DetectionEvent::decoded(
                frame.sequence().to_string(),
                crate::decode::Symbology::Code128,
            ))
        }
    }

    struct EchoFactory;

    impl EngineFactory for EchoFactory {
        fn create(&self) -> Box<dyn DecoderEngine> {
            Box::new(EchoEngine)
        }
    }

    #[test]
    fn test_not_ready_stream_rejected() {
        let unready = MockCameraBackend::new()
            .with_resolution(8, 8)
            .unready()
            .get_user_media(&CameraConstraintTier::any())
            .unwrap();
        let mut adapter = DecodeAdapter::new(Arc::new(ScriptedEngine::new()));

        assert_eq!(
            adapter.start(&unready, &every_frame(1)),
            Err(ScanError::NotReady)
        );
        assert!(!adapter.is_running());
    }

    #[test]
    fn test_init_failure_shuts_down_created_engines() {
        let factory = ScriptedEngine::new().failing_init("model missing");
        let mut adapter = DecodeAdapter::new(Arc::new(factory.clone()));

        let err = adapter.start(&stream(), &every_frame(2)).unwrap_err();
        assert_eq!(err, ScanError::DecoderInitFailed("model missing".into()));
        assert_eq!(factory.created(), factory.shut_down());
    }

    #[test]
    fn test_delivers_in_frame_order_across_workers() {
        let mut adapter = DecodeAdapter::new(Arc::new(EchoFactory));
        let (_, rx) = adapter.subscribe();
        adapter.start(&stream(), &every_frame(4)).unwrap();

        for seq in 1..=4 {
            assert_eq!(adapter.submit(frame(seq)), Submission::Accepted);
        }
        adapter.flush(Duration::from_secs(5));

        let codes: Vec<String> = rx
            .try_iter()
            .filter_map(|f| f.detection.and_then(|d| d.code))
            .collect();
        assert_eq!(codes, ["1", "2", "3", "4"]);
    }

    #[test]
    fn test_busy_when_all_workers_occupied() {
        let mut adapter = DecodeAdapter::new(Arc::new(EchoFactory));
        adapter.start(&stream(), &every_frame(1)).unwrap();

        assert_eq!(adapter.submit(frame(1)), Submission::Accepted);
        assert_eq!(adapter.submit(frame(2)), Submission::Busy);
        adapter.flush(Duration::from_secs(5));
        assert_eq!(adapter.submit(frame(3)), Submission::Accepted);
        assert_eq!(adapter.stats().busy, 1);
    }

    #[test]
    fn test_frequency_throttles_by_timestamp() {
        let mut adapter = DecodeAdapter::new(Arc::new(ScriptedEngine::new()));
        let config = DecoderConfig {
            frequency: Some(10),
            workers: 4,
            ..Default::default()
        };
        adapter.start(&stream(), &config).unwrap();

        let t0 = Instant::now();
        let at = |seq: u64, ms: u64| {
            Frame::with_timestamp(vec![0u8; 16], 4, 4, seq, t0 + Duration::from_millis(ms))
        };
        assert_eq!(adapter.submit(at(1, 0)), Submission::Accepted);
        assert_eq!(adapter.submit(at(2, 40)), Submission::Throttled);
        assert_eq!(adapter.submit(at(3, 100)), Submission::Accepted);
    }

    #[test]
    fn test_region_crop_translated_back() {
        let factory = ScriptedEngine::new();
        factory.push(Some(DetectionEvent::located(vec![Point::new(0.0, 0.0)])));
        let mut adapter = DecodeAdapter::new(Arc::new(factory));
        let (_, rx) = adapter.subscribe();
        let config = DecoderConfig {
            region: RegionOfInterest::centered(10.0, 25.0),
            ..every_frame(1)
        };
        adapter.start(&stream(), &config).unwrap();

        adapter.submit(frame(1));
        adapter.flush(Duration::from_secs(5));

        let processed = rx.try_recv().unwrap();
        assert_eq!((processed.width, processed.height), (640, 480));
        let region = processed.detection.unwrap().region.unwrap();
        assert_eq!(region[0], Point::new(64.0, 120.0));
    }

    #[test]
    fn test_stop_deregisters_and_is_idempotent() {
        let factory = ScriptedEngine::codes(["1"]);
        let mut adapter = DecodeAdapter::new(Arc::new(factory.clone()));
        let (_, rx) = adapter.subscribe();
        adapter.start(&stream(), &every_frame(2)).unwrap();

        adapter.stop();
        adapter.stop();

        assert!(!adapter.is_running());
        assert_eq!(adapter.subscriber_count(), 0);
        assert!(rx.recv().is_err());
        assert_eq!(factory.shut_down(), 2);
        assert_eq!(adapter.submit(frame(1)), Submission::Stopped);
    }

    #[test]
    fn test_stop_without_start() {
        let mut adapter = DecodeAdapter::new(Arc::new(ScriptedEngine::new()));
        adapter.stop();
        assert!(!adapter.is_running());
    }

    #[test]
    fn test_unsubscribe() {
        let mut adapter = DecodeAdapter::new(Arc::new(ScriptedEngine::new()));
        let (id, _rx) = adapter.subscribe();
        assert!(adapter.unsubscribe(id));
        assert!(!adapter.unsubscribe(id));
    }
}
