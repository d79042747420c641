use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::{debug, info, warn};

use crate::config::{Config, ConfigStore};
use crate::detector::{
    AlertSink, DetectionCore, DetectionSnapshot, DrowsinessAlert, Evaluation, SensorReading,
};
use crate::runtime::{AppEvent, SessionId};
use crate::sensitivity::Sensitivity;
use crate::sensors::{SensorSuite, WearerModel};

/// How long the alert banner stays up after an alert.
pub const ALERT_FLASH: Duration = Duration::from_secs(3);

/// Application shell: owns the detection core, the sensors feeding it and
/// the preference store. Lives on the event-loop thread only.
pub struct App {
    core: DetectionCore,
    sensors: SensorSuite,
    events: Sender<AppEvent>,
    store: Box<dyn ConfigStore>,
    wearer: Option<Arc<WearerModel>>,
    session: SessionId,
    pub last_evaluation: Option<Evaluation>,
    pub last_alert: Option<DrowsinessAlert>,
    alert_flash_until: Option<Instant>,
    pub replay_finished: bool,
    should_quit: bool,
}

impl App {
    pub fn new(
        core: DetectionCore,
        sensors: SensorSuite,
        events: Sender<AppEvent>,
        store: Box<dyn ConfigStore>,
    ) -> Self {
        Self {
            core,
            sensors,
            events,
            store,
            wearer: None,
            session: 0,
            last_evaluation: None,
            last_alert: None,
            alert_flash_until: None,
            replay_finished: false,
            should_quit: false,
        }
    }

    /// Attaches the simulated wearer so the keyboard can drive it.
    pub fn with_wearer(mut self, wearer: Arc<WearerModel>) -> Self {
        self.wearer = Some(wearer);
        self
    }

    pub fn subscribe(&mut self, sink: Box<dyn AlertSink + Send>) {
        self.core.subscribe(sink);
    }

    pub fn core(&self) -> &DetectionCore {
        &self.core
    }

    pub fn snapshot(&self) -> DetectionSnapshot {
        self.core.snapshot()
    }

    pub fn wearer(&self) -> Option<&WearerModel> {
        self.wearer.as_deref()
    }

    pub fn sensors_running(&self) -> bool {
        self.sensors.is_running()
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    /// Session the sensors were last started for.
    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn start_detection(&mut self) {
        self.session = self.session.wrapping_add(1);
        self.core.start_detection();
        self.last_evaluation = None;
        self.replay_finished = false;
        self.sensors.start_all(&self.events, self.session);
    }

    /// Halts the sensors before clearing the core so no reading produced
    /// before the stop is evaluated against a fresh session.
    pub fn stop_detection(&mut self) {
        self.sensors.stop_all();
        self.core.stop_detection();
        self.last_evaluation = None;
        self.alert_flash_until = None;
    }

    pub fn toggle_detection(&mut self) {
        if self.core.is_active() {
            self.stop_detection();
        } else {
            self.start_detection();
        }
    }

    pub fn set_sensitivity(&mut self, sensitivity: Sensitivity) {
        self.core.set_sensitivity(sensitivity);
        if let Err(e) = self.store.save(&Config::from(sensitivity)) {
            warn!(error = %e, "failed to persist sensitivity");
        }
    }

    pub fn on_sensor(&mut self, reading: SensorReading) -> Option<Evaluation> {
        let evaluation = self.core.ingest(reading)?;
        match &evaluation {
            Evaluation::Ignored => return Some(evaluation),
            Evaluation::Drowsy(alert) => {
                self.last_alert = Some(alert.clone());
                self.alert_flash_until = Some(Instant::now() + ALERT_FLASH);
            }
            _ => {}
        }
        self.last_evaluation = Some(evaluation.clone());
        Some(evaluation)
    }

    /// Like `on_sensor`, but drops readings produced for an earlier session.
    pub fn on_sensor_event(
        &mut self,
        session: SessionId,
        reading: SensorReading,
    ) -> Option<Evaluation> {
        if session != self.session {
            debug!(session, current = self.session, ?reading, "dropping stale reading");
            return None;
        }
        self.on_sensor(reading)
    }

    pub fn on_tick(&mut self) {
        if self
            .alert_flash_until
            .is_some_and(|until| Instant::now() >= until)
        {
            self.alert_flash_until = None;
        }
    }

    pub fn alert_showing(&self) -> bool {
        self.alert_flash_until.is_some()
    }

    pub fn dismiss_alert(&mut self) {
        self.alert_flash_until = None;
    }

    pub fn on_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.quit();
            return;
        }

        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => self.quit(),
            KeyCode::Char(' ') => self.toggle_detection(),
            KeyCode::Enter => self.dismiss_alert(),
            KeyCode::Char('l') => self.set_sensitivity(Sensitivity::Low),
            KeyCode::Char('m') => self.set_sensitivity(Sensitivity::Medium),
            KeyCode::Char('h') => self.set_sensitivity(Sensitivity::High),
            KeyCode::Up => self.adjust_wearer_bpm(1.0),
            KeyCode::Down => self.adjust_wearer_bpm(-1.0),
            KeyCode::Char('w') => {
                if let Some(wearer) = &self.wearer {
                    let moving = wearer.toggle_moving();
                    info!(moving, "simulated wearer motion toggled");
                }
            }
            _ => {}
        }
    }

    fn adjust_wearer_bpm(&mut self, delta: f64) {
        if let Some(wearer) = &self.wearer {
            wearer.adjust_resting_bpm(delta);
        }
    }

    /// Applies one event. Returns true when the screen should be redrawn.
    pub fn handle(&mut self, event: AppEvent) -> bool {
        match event {
            AppEvent::Key(key) => {
                self.on_key(key);
                true
            }
            AppEvent::Resize => true,
            AppEvent::Tick => {
                let was_showing = self.alert_showing();
                self.on_tick();
                was_showing != self.alert_showing()
            }
            AppEvent::Sensor { session, reading } => {
                let current = session == self.session && self.core.is_active();
                self.on_sensor_event(session, reading);
                current
            }
            AppEvent::ReplayFinished { session } => {
                if session != self.session {
                    return false;
                }
                info!(session, "replay finished");
                self.replay_finished = true;
                true
            }
        }
    }

    /// Stops everything that is still running.
    pub fn shutdown(&mut self) {
        if self.core.is_active() || self.sensors.is_running() {
            self.stop_detection();
        }
    }
}
