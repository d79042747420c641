//! Sensor adapters.
//!
//! Each adapter produces [`SensorReading`]s on its own thread and sends them
//! into the application's event channel. Stopping an adapter wakes its thread
//! and joins it, so once `stop()` returns nothing more will be sent.

use std::ops::ControlFlow;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rand::Rng;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::detector::SensorReading;
use crate::runtime::{AppEvent, SessionId};

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("failed to read capture: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed capture: {0}")]
    Csv(#[from] csv::Error),
    #[error("line {line}: {reason}")]
    InvalidRow { line: u64, reason: String },
}

/// Where an adapter delivers its readings. Every event is stamped with the
/// session the adapter was started for, so readings still queued from an
/// earlier session can be told apart after a restart.
#[derive(Debug, Clone)]
pub struct SensorSink {
    tx: Sender<AppEvent>,
    session: SessionId,
}

impl SensorSink {
    pub fn new(tx: Sender<AppEvent>, session: SessionId) -> Self {
        Self { tx, session }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Returns false once the receiving side is gone.
    pub fn send(&self, reading: SensorReading) -> bool {
        self.tx
            .send(AppEvent::Sensor {
                session: self.session,
                reading,
            })
            .is_ok()
    }

    pub fn finished(&self) -> bool {
        self.tx
            .send(AppEvent::ReplayFinished {
                session: self.session,
            })
            .is_ok()
    }
}

pub trait SensorAdapter: Send {
    fn name(&self) -> &str;
    /// Starts producing into `sink`. No-op while already running.
    fn start(&mut self, sink: SensorSink);
    /// Stops producing and waits for the producer thread to exit.
    fn stop(&mut self);
    fn is_running(&self) -> bool;
}

/// Producer loop shared by all adapters: wait, produce, repeat until told to
/// stop or the producer breaks.
#[derive(Debug)]
pub struct SensorThread {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl SensorThread {
    pub fn spawn<F>(initial_delay: Duration, mut produce: F) -> Self
    where
        F: FnMut() -> ControlFlow<(), Duration> + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            let mut wait = initial_delay;
            loop {
                let stopped = if wait.is_zero() {
                    !matches!(stop_rx.try_recv(), Err(TryRecvError::Empty))
                } else {
                    !matches!(stop_rx.recv_timeout(wait), Err(RecvTimeoutError::Timeout))
                };
                if stopped {
                    break;
                }
                match produce() {
                    ControlFlow::Continue(next) => wait = next,
                    ControlFlow::Break(()) => break,
                }
            }
        });

        Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn stop(&mut self) {
        // dropping the sender disconnects the stop channel and wakes the loop
        self.stop_tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SensorThread {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Simulated wearer shared between the keyboard and the simulated sensors.
#[derive(Debug)]
pub struct WearerModel {
    resting_bpm: AtomicU64,
    moving: AtomicBool,
}

impl WearerModel {
    pub const MIN_BPM: f64 = 30.0;
    pub const MAX_BPM: f64 = 220.0;

    pub fn new(resting_bpm: f64) -> Self {
        Self {
            resting_bpm: AtomicU64::new(resting_bpm.clamp(Self::MIN_BPM, Self::MAX_BPM).to_bits()),
            moving: AtomicBool::new(false),
        }
    }

    pub fn resting_bpm(&self) -> f64 {
        f64::from_bits(self.resting_bpm.load(Ordering::Relaxed))
    }

    pub fn set_resting_bpm(&self, bpm: f64) {
        let bpm = bpm.clamp(Self::MIN_BPM, Self::MAX_BPM);
        self.resting_bpm.store(bpm.to_bits(), Ordering::Relaxed);
    }

    pub fn adjust_resting_bpm(&self, delta: f64) -> f64 {
        let bpm = (self.resting_bpm() + delta).clamp(Self::MIN_BPM, Self::MAX_BPM);
        self.set_resting_bpm(bpm);
        bpm
    }

    pub fn is_moving(&self) -> bool {
        self.moving.load(Ordering::Relaxed)
    }

    pub fn set_moving(&self, moving: bool) {
        self.moving.store(moving, Ordering::Relaxed);
    }

    pub fn toggle_moving(&self) -> bool {
        !self.moving.fetch_xor(true, Ordering::Relaxed)
    }
}

/// Emits the wearer's heart rate, with a little noise, every interval.
pub struct SimulatedHeartRate {
    wearer: Arc<WearerModel>,
    interval: Duration,
    jitter: f64,
    thread: Option<SensorThread>,
}

impl SimulatedHeartRate {
    pub fn new(wearer: Arc<WearerModel>, interval: Duration) -> Self {
        Self {
            wearer,
            interval,
            jitter: 0.5,
            thread: None,
        }
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.abs();
        self
    }
}

impl SensorAdapter for SimulatedHeartRate {
    fn name(&self) -> &str {
        "heart-rate"
    }

    fn start(&mut self, sink: SensorSink) {
        if self.is_running() {
            return;
        }
        let wearer = Arc::clone(&self.wearer);
        let interval = self.interval;
        let jitter = self.jitter;
        self.thread = Some(SensorThread::spawn(Duration::ZERO, move || {
            let noise = if jitter > 0.0 {
                rand::thread_rng().gen_range(-jitter..=jitter)
            } else {
                0.0
            };
            let bpm = ((wearer.resting_bpm() + noise) * 10.0).round() / 10.0;
            if sink.send(SensorReading::HeartRate(bpm)) {
                ControlFlow::Continue(interval)
            } else {
                ControlFlow::Break(())
            }
        }));
        info!(sensor = self.name(), "sensor started");
    }

    fn stop(&mut self) {
        if let Some(mut thread) = self.thread.take() {
            thread.stop();
            info!(sensor = self.name(), "sensor stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(SensorThread::is_running)
    }
}

/// Reports the wearer's motion flag once on start and then on every change.
pub struct SimulatedMotion {
    wearer: Arc<WearerModel>,
    poll_interval: Duration,
    thread: Option<SensorThread>,
}

impl SimulatedMotion {
    pub fn new(wearer: Arc<WearerModel>, poll_interval: Duration) -> Self {
        Self {
            wearer,
            poll_interval,
            thread: None,
        }
    }
}

impl SensorAdapter for SimulatedMotion {
    fn name(&self) -> &str {
        "motion"
    }

    fn start(&mut self, sink: SensorSink) {
        if self.is_running() {
            return;
        }
        let wearer = Arc::clone(&self.wearer);
        let interval = self.poll_interval;
        let mut last: Option<bool> = None;
        self.thread = Some(SensorThread::spawn(Duration::ZERO, move || {
            let moving = wearer.is_moving();
            if last != Some(moving) {
                last = Some(moving);
                if !sink.send(SensorReading::Motion(moving)) {
                    return ControlFlow::Break(());
                }
            }
            ControlFlow::Continue(interval)
        }));
        info!(sensor = self.name(), "sensor started");
    }

    fn stop(&mut self) {
        if let Some(mut thread) = self.thread.take() {
            thread.stop();
            info!(sensor = self.name(), "sensor stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(SensorThread::is_running)
    }
}

/// One row of a replay capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplayStep {
    pub delay: Duration,
    pub reading: SensorReading,
}

#[derive(Debug, Deserialize)]
struct ReplayRow {
    kind: String,
    value: String,
    #[serde(default)]
    delay_ms: Option<u64>,
}

impl ReplayRow {
    fn into_step(self, line: u64) -> Result<ReplayStep, SensorError> {
        let invalid = |reason: String| SensorError::InvalidRow { line, reason };

        let reading = match self.kind.to_ascii_lowercase().as_str() {
            "hr" | "heart_rate" | "bpm" => {
                let bpm = self
                    .value
                    .parse::<f64>()
                    .map_err(|e| invalid(format!("bad heart rate {:?}: {}", self.value, e)))?;
                if !bpm.is_finite() {
                    return Err(invalid(format!("heart rate must be finite, got {}", bpm)));
                }
                SensorReading::HeartRate(bpm)
            }
            "motion" | "moving" => {
                let moving = match self.value.to_ascii_lowercase().as_str() {
                    "true" | "1" | "moving" | "yes" => true,
                    "false" | "0" | "still" | "stationary" | "no" => false,
                    other => return Err(invalid(format!("bad motion flag {:?}", other))),
                };
                SensorReading::Motion(moving)
            }
            other => return Err(invalid(format!("unknown kind {:?}", other))),
        };

        Ok(ReplayStep {
            delay: Duration::from_millis(self.delay_ms.unwrap_or(0)),
            reading,
        })
    }
}

/// Replays a recorded capture of heart-rate and motion readings.
///
/// The capture is CSV with a `kind,value[,delay_ms]` header, where `kind` is
/// `hr` or `motion` and `delay_ms` is the pause before that row is emitted.
pub struct ReplaySensor {
    steps: Vec<ReplayStep>,
    thread: Option<SensorThread>,
}

impl ReplaySensor {
    pub fn from_steps(steps: Vec<ReplayStep>) -> Self {
        Self {
            steps,
            thread: None,
        }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, SensorError> {
        let file = std::fs::File::open(path.as_ref())?;
        let sensor = Self::from_reader(file)?;
        info!(
            path = %path.as_ref().display(),
            steps = sensor.steps.len(),
            "loaded replay capture"
        );
        Ok(sensor)
    }

    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self, SensorError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .comment(Some(b'#'))
            .from_reader(reader);
        let headers = rdr.headers()?.clone();

        let mut steps = Vec::new();
        for record in rdr.records() {
            let record = record?;
            let line = record.position().map_or(0, |p| p.line());
            let row: ReplayRow = record.deserialize(Some(&headers))?;
            steps.push(row.into_step(line)?);
        }

        Ok(Self::from_steps(steps))
    }

    pub fn steps(&self) -> &[ReplayStep] {
        &self.steps
    }
}

impl SensorAdapter for ReplaySensor {
    fn name(&self) -> &str {
        "replay"
    }

    fn start(&mut self, sink: SensorSink) {
        if self.is_running() {
            return;
        }
        // a finished replay restarts from the top
        self.stop();

        let mut steps = self.steps.clone().into_iter().peekable();
        let first = steps.peek().map_or(Duration::ZERO, |s| s.delay);
        self.thread = Some(SensorThread::spawn(first, move || match steps.next() {
            Some(step) => {
                if !sink.send(step.reading) {
                    return ControlFlow::Break(());
                }
                ControlFlow::Continue(steps.peek().map_or(Duration::ZERO, |s| s.delay))
            }
            None => {
                debug!("replay exhausted");
                sink.finished();
                ControlFlow::Break(())
            }
        }));
        info!(sensor = self.name(), "sensor started");
    }

    fn stop(&mut self) {
        if let Some(mut thread) = self.thread.take() {
            thread.stop();
            info!(sensor = self.name(), "sensor stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(SensorThread::is_running)
    }
}

/// The set of adapters feeding one detection session.
#[derive(Default)]
pub struct SensorSuite {
    adapters: Vec<Box<dyn SensorAdapter>>,
}

impl SensorSuite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Heart-rate and motion adapters driven by a shared simulated wearer.
    pub fn simulated(wearer: Arc<WearerModel>, sample_interval: Duration) -> Self {
        Self::new()
            .with(SimulatedHeartRate::new(Arc::clone(&wearer), sample_interval))
            .with(SimulatedMotion::new(wearer, Duration::from_millis(50)))
    }

    pub fn with<A: SensorAdapter + 'static>(mut self, adapter: A) -> Self {
        self.adapters.push(Box::new(adapter));
        self
    }

    /// Starts every adapter, stamping their readings with `session`.
    pub fn start_all(&mut self, tx: &Sender<AppEvent>, session: SessionId) {
        for adapter in self.adapters.iter_mut() {
            adapter.start(SensorSink::new(tx.clone(), session));
        }
        debug!(session, adapters = self.adapters.len(), "sensor suite started");
    }

    pub fn stop_all(&mut self) {
        for adapter in self.adapters.iter_mut() {
            adapter.stop();
        }
    }

    pub fn is_running(&self) -> bool {
        self.adapters.iter().any(|a| a.is_running())
    }

    pub fn names(&self) -> Vec<&str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }
}
