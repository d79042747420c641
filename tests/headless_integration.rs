use std::sync::mpsc;
use std::time::Duration;

use assert_matches::assert_matches;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use dozewatch::app::App;
use dozewatch::config::MemoryConfigStore;
use dozewatch::runtime::{
    AppEvent, AppEventSource, ChannelEventSource, FixedTicker, Runner, SessionId,
};
use dozewatch::sensors::{ReplaySensor, SensorSuite};
use dozewatch::{DetectionCore, DetectionPhase, Evaluation, SensorReading, Sensitivity};

fn key(c: char) -> AppEvent {
    AppEvent::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE))
}

fn hr(session: SessionId, bpm: f64) -> AppEvent {
    AppEvent::Sensor {
        session,
        reading: SensorReading::HeartRate(bpm),
    }
}

fn motion(session: SessionId, moving: bool) -> AppEvent {
    AppEvent::Sensor {
        session,
        reading: SensorReading::Motion(moving),
    }
}

// Headless integration using the runtime + App without a TTY.
// Heart-rate and motion producers plus the keyboard all share one channel.
#[test]
fn headless_detection_flow_raises_alerts() {
    let es = ChannelEventSource::new();
    let tx = es.sender();
    let runner = Runner::new(es, FixedTicker::new(Duration::from_millis(5)));

    let (alert_tx, alert_rx) = mpsc::channel();
    let mut core = DetectionCore::new(Sensitivity::Medium);
    core.subscribe(Box::new(alert_tx));
    let mut app = App::new(
        core,
        SensorSuite::new(),
        runner.sender(),
        Box::new(MemoryConfigStore::default()),
    );

    // the first start opens session 1
    tx.send(key(' ')).unwrap();
    for _ in 0..10 {
        tx.send(hr(1, 70.0)).unwrap();
    }
    tx.send(hr(1, 66.0)).unwrap(); // awake
    tx.send(hr(1, 64.0)).unwrap(); // drowsy
    tx.send(motion(1, true)).unwrap();
    tx.send(hr(1, 50.0)).unwrap(); // gated
    tx.send(motion(1, false)).unwrap();
    tx.send(hr(1, 60.0)).unwrap(); // drowsy
    tx.send(key('q')).unwrap();

    let mut evaluations = Vec::new();
    for _ in 0..100u32 {
        match runner.step() {
            AppEvent::Sensor { session, reading } => {
                if let Some(eval) = app.on_sensor_event(session, reading) {
                    evaluations.push(eval);
                }
            }
            event => {
                app.handle(event);
            }
        }
        if app.should_quit() {
            break;
        }
    }

    assert!(app.should_quit());
    assert_eq!(evaluations.len(), 14);
    assert_matches!(evaluations[9], Evaluation::BaselineEstablished { baseline } if baseline == 70.0);
    assert_matches!(evaluations[10], Evaluation::Awake { .. });
    assert_matches!(evaluations[11], Evaluation::Drowsy(_));
    assert_matches!(evaluations[12], Evaluation::Moving);
    assert_matches!(evaluations[13], Evaluation::Drowsy(_));

    let alerts: Vec<_> = alert_rx.try_iter().collect();
    assert_eq!(alerts.len(), 2);
    assert_eq!(alerts[0].sample, 64.0);
    assert_eq!(alerts[1].sample, 60.0);
}

#[test]
fn headless_sensitivity_change_mid_session() {
    let es = ChannelEventSource::new();
    let tx = es.sender();
    let runner = Runner::new(es, FixedTicker::new(Duration::from_millis(5)));
    let mut app = App::new(
        DetectionCore::default(),
        SensorSuite::new(),
        runner.sender(),
        Box::new(MemoryConfigStore::default()),
    );

    app.start_detection();
    let session = app.session();
    for _ in 0..10 {
        tx.send(hr(session, 70.0)).unwrap();
    }
    tx.send(key('h')).unwrap();
    tx.send(hr(session, 66.0)).unwrap();

    for _ in 0..12 {
        let event = runner.step();
        app.handle(event);
    }

    let snap = app.snapshot();
    assert_eq!(snap.threshold, 3.0);
    assert_eq!(snap.baseline, Some(70.0));
    assert_eq!(snap.alerts_fired, 1);
}

#[test]
fn headless_restart_collects_new_baseline() {
    let es = ChannelEventSource::new();
    let tx = es.sender();
    let runner = Runner::new(es, FixedTicker::new(Duration::from_millis(5)));
    let mut app = App::new(
        DetectionCore::default(),
        SensorSuite::new(),
        runner.sender(),
        Box::new(MemoryConfigStore::default()),
    );

    app.start_detection();
    let first = app.session();
    for _ in 0..10 {
        tx.send(hr(first, 70.0)).unwrap();
    }
    tx.send(key(' ')).unwrap(); // stop
    tx.send(hr(first, 40.0)).unwrap(); // in flight when stopped
    tx.send(key(' ')).unwrap(); // start again
    for _ in 0..9 {
        tx.send(hr(first + 1, 80.0)).unwrap();
    }

    for _ in 0..21 {
        let event = runner.step();
        app.handle(event);
    }

    let snap = app.snapshot();
    assert_eq!(snap.phase, DetectionPhase::CollectingBaseline);
    assert_eq!(snap.samples_collected, 9);
    assert_eq!(snap.baseline, None);

    app.handle(hr(app.session(), 80.0));
    assert_eq!(app.snapshot().baseline, Some(80.0));
}

#[test]
fn headless_reading_behind_queued_restart_is_dropped() {
    let es = ChannelEventSource::new();
    let tx = es.sender();
    let runner = Runner::new(es, FixedTicker::new(Duration::from_millis(5)));
    let mut app = App::new(
        DetectionCore::default(),
        SensorSuite::new(),
        runner.sender(),
        Box::new(MemoryConfigStore::default()),
    );

    app.start_detection();
    let old = app.session();
    for _ in 0..10 {
        app.handle(hr(old, 70.0));
    }
    assert_eq!(app.snapshot().baseline, Some(70.0));

    // stop and start both queued, then a reading the adapter sent before it was joined
    tx.send(key(' ')).unwrap();
    tx.send(key(' ')).unwrap();
    tx.send(hr(old, 70.0)).unwrap();
    tx.send(motion(old, true)).unwrap();

    for _ in 0..4 {
        let event = runner.step();
        app.handle(event);
    }

    let snap = app.snapshot();
    assert_eq!(app.session(), old + 1);
    assert_eq!(snap.phase, DetectionPhase::CollectingBaseline);
    assert_eq!(snap.samples_collected, 0);
    assert!(!snap.is_moving);
}

#[test]
fn headless_replay_sensor_drives_session() {
    let capture = "kind,value\n\
                   hr,70\nhr,70\nhr,70\nhr,70\nhr,70\n\
                   hr,70\nhr,70\nhr,70\nhr,70\nhr,70\n\
                   motion,true\nhr,55\nmotion,false\nhr,55\n";
    let replay = ReplaySensor::from_reader(capture.as_bytes()).unwrap();

    let es = ChannelEventSource::new();
    let runner = Runner::new(es, FixedTicker::new(Duration::from_millis(20)));
    let mut app = App::new(
        DetectionCore::default(),
        SensorSuite::new().with(replay),
        runner.sender(),
        Box::new(MemoryConfigStore::default()),
    );

    app.start_detection();
    for _ in 0..500u32 {
        let event = runner.step();
        app.handle(event);
        if app.replay_finished {
            break;
        }
    }

    assert!(app.replay_finished);
    assert_eq!(app.snapshot().alerts_fired, 1);
    app.shutdown();
    assert!(!app.sensors_running());
}
