//! Drowsiness detection core.
//!
//! The [`DetectionCore`] owns every piece of detection state: the baseline
//! estimator, the active sensitivity and threshold, the latest motion reading
//! and the session flag. It is driven from a single thread and never blocks;
//! each heart-rate sample is evaluated to completion before the next one.

use std::sync::mpsc::Sender;

use chrono::{DateTime, Local};
use tracing::{debug, info};

use crate::baseline::{BaselineEstimator, BASELINE_WINDOW};
use crate::sensitivity::Sensitivity;

/// A single observation produced by a sensor adapter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorReading {
    HeartRate(f64),
    Motion(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum DetectionPhase {
    #[strum(serialize = "OFF")]
    Idle,
    #[strum(serialize = "COLLECTING BASELINE")]
    CollectingBaseline,
    #[strum(serialize = "MONITORING")]
    Monitoring,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrowsinessAlert {
    pub sample: f64,
    pub baseline: f64,
    pub drop: f64,
    pub threshold: f64,
    pub sensitivity: Sensitivity,
    pub at: DateTime<Local>,
}

/// Outcome of feeding one heart-rate sample to the core.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    /// Detection is off; the sample was dropped.
    Ignored,
    Collecting { collected: usize },
    BaselineEstablished { baseline: f64 },
    /// Monitoring, but the wearer is moving so nothing was evaluated.
    Moving,
    Awake { drop: f64 },
    Drowsy(DrowsinessAlert),
}

impl std::fmt::Display for Evaluation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Evaluation::Ignored => write!(f, "ignored"),
            Evaluation::Collecting { collected } => {
                write!(f, "collecting {}/{}", collected, BASELINE_WINDOW)
            }
            Evaluation::BaselineEstablished { baseline } => write!(f, "baseline {:.1}", baseline),
            Evaluation::Moving => write!(f, "moving"),
            Evaluation::Awake { drop } => write!(f, "awake drop={:.1}", drop),
            Evaluation::Drowsy(alert) => write!(
                f,
                "drowsy drop={:.1} threshold={:.1}",
                alert.drop, alert.threshold
            ),
        }
    }
}

/// Receives every drowsiness alert raised by the core.
pub trait AlertSink {
    fn on_drowsiness_detected(&mut self, alert: &DrowsinessAlert);
}

impl AlertSink for Sender<DrowsinessAlert> {
    fn on_drowsiness_detected(&mut self, alert: &DrowsinessAlert) {
        // a dropped receiver just means nobody is listening anymore
        let _ = self.send(alert.clone());
    }
}

/// Read-only view of the core for presentation.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionSnapshot {
    pub active: bool,
    pub phase: DetectionPhase,
    pub sensitivity: Sensitivity,
    pub threshold: f64,
    pub baseline: Option<f64>,
    pub samples_collected: usize,
    pub is_moving: bool,
    pub last_sample: Option<f64>,
    pub alerts_fired: u64,
}

pub struct DetectionCore {
    active: bool,
    sensitivity: Sensitivity,
    threshold: f64,
    estimator: BaselineEstimator,
    is_moving: bool,
    last_sample: Option<f64>,
    alerts_fired: u64,
    sinks: Vec<Box<dyn AlertSink + Send>>,
}

impl std::fmt::Debug for DetectionCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionCore")
            .field("active", &self.active)
            .field("sensitivity", &self.sensitivity)
            .field("threshold", &self.threshold)
            .field("estimator", &self.estimator)
            .field("is_moving", &self.is_moving)
            .field("last_sample", &self.last_sample)
            .field("alerts_fired", &self.alerts_fired)
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl Default for DetectionCore {
    fn default() -> Self {
        Self::new(Sensitivity::default())
    }
}

impl DetectionCore {
    pub fn new(sensitivity: Sensitivity) -> Self {
        Self {
            active: false,
            sensitivity,
            threshold: sensitivity.threshold(),
            estimator: BaselineEstimator::new(),
            is_moving: false,
            last_sample: None,
            alerts_fired: 0,
            sinks: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, sink: Box<dyn AlertSink + Send>) {
        self.sinks.push(sink);
    }

    pub fn start_detection(&mut self) {
        self.active = true;
        self.estimator.reset();
        self.last_sample = None;
        info!(sensitivity = %self.sensitivity, "detection started");
    }

    pub fn stop_detection(&mut self) {
        self.active = false;
        self.estimator.reset();
        self.is_moving = false;
        self.last_sample = None;
        info!(alerts = self.alerts_fired, "detection stopped");
    }

    /// Changes the active threshold. The baseline is left untouched.
    pub fn set_sensitivity(&mut self, sensitivity: Sensitivity) {
        if self.sensitivity != sensitivity {
            info!(from = %self.sensitivity, to = %sensitivity, "sensitivity changed");
        }
        self.sensitivity = sensitivity;
        self.threshold = sensitivity.threshold();
    }

    pub fn on_motion_state_changed(&mut self, is_moving: bool) {
        if !self.active {
            return;
        }
        if self.is_moving != is_moving {
            debug!(is_moving, "motion state changed");
        }
        self.is_moving = is_moving;
    }

    pub fn on_heart_rate_sample(&mut self, bpm: f64) -> Evaluation {
        if !self.active {
            return Evaluation::Ignored;
        }

        self.last_sample = Some(bpm);

        let baseline = match self.estimator.baseline() {
            Some(baseline) => baseline,
            None => {
                return match self.estimator.ingest(bpm) {
                    Some(baseline) => {
                        info!(baseline, "baseline established");
                        Evaluation::BaselineEstablished { baseline }
                    }
                    None => Evaluation::Collecting {
                        collected: self.estimator.collected(),
                    },
                };
            }
        };

        if self.is_moving {
            return Evaluation::Moving;
        }

        let drop = baseline - bpm;
        if drop > self.threshold {
            let alert = DrowsinessAlert {
                sample: bpm,
                baseline,
                drop,
                threshold: self.threshold,
                sensitivity: self.sensitivity,
                at: Local::now(),
            };
            self.alerts_fired += 1;
            for sink in self.sinks.iter_mut() {
                sink.on_drowsiness_detected(&alert);
            }
            Evaluation::Drowsy(alert)
        } else {
            debug!(bpm, drop, threshold = self.threshold, "awake");
            Evaluation::Awake { drop }
        }
    }

    /// Routes a sensor reading. Motion readings produce no evaluation.
    pub fn ingest(&mut self, reading: SensorReading) -> Option<Evaluation> {
        match reading {
            SensorReading::HeartRate(bpm) => Some(self.on_heart_rate_sample(bpm)),
            SensorReading::Motion(is_moving) => {
                self.on_motion_state_changed(is_moving);
                None
            }
        }
    }

    pub fn phase(&self) -> DetectionPhase {
        match (self.active, self.estimator.is_established()) {
            (false, _) => DetectionPhase::Idle,
            (true, false) => DetectionPhase::CollectingBaseline,
            (true, true) => DetectionPhase::Monitoring,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn sensitivity(&self) -> Sensitivity {
        self.sensitivity
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn baseline(&self) -> Option<f64> {
        self.estimator.baseline()
    }

    pub fn is_moving(&self) -> bool {
        self.is_moving
    }

    pub fn last_sample(&self) -> Option<f64> {
        self.last_sample
    }

    pub fn alerts_fired(&self) -> u64 {
        self.alerts_fired
    }

    pub fn snapshot(&self) -> DetectionSnapshot {
        DetectionSnapshot {
            active: self.active,
            phase: self.phase(),
            sensitivity: self.sensitivity,
            threshold: self.threshold,
            baseline: self.estimator.baseline(),
            samples_collected: self.estimator.collected(),
            is_moving: self.is_moving,
            last_sample: self.last_sample,
            alerts_fired: self.alerts_fired,
        }
    }
}

impl DetectionSnapshot {
    /// Fraction of the baseline window collected so far, in `0.0..=1.0`.
    pub fn collection_progress(&self) -> f64 {
        self.samples_collected as f64 / BASELINE_WINDOW as f64
    }

    /// How far the last sample sits below the baseline, if both are known.
    pub fn current_drop(&self) -> Option<f64> {
        Some(self.baseline? - self.last_sample?)
    }
}
