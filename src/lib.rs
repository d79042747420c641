// Library surface for the binary, headless runs and integration tests.
pub mod app;
pub mod app_dirs;
pub mod baseline;
pub mod config;
pub mod detector;
pub mod notify;
pub mod runtime;
pub mod sensitivity;
pub mod sensors;
pub mod ui;

pub use baseline::{BaselineEstimator, BASELINE_WINDOW};
pub use detector::{
    AlertSink, DetectionCore, DetectionPhase, DetectionSnapshot, DrowsinessAlert, Evaluation,
    SensorReading,
};
pub use sensitivity::Sensitivity;
