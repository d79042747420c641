use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    sync::{mpsc::Sender, Arc, Mutex},
    time::Duration,
};

use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use dozewatch::{
    app::App,
    app_dirs::AppDirs,
    config::{ConfigStore, FileConfigStore},
    detector::{DetectionCore, Evaluation, SensorReading},
    notify::TerminalHaptics,
    runtime::{
        AppEvent, AppEventSource, ChannelEventSource, CrosstermEventSource, FixedTicker, Runner,
        Ticker,
    },
    sensitivity::Sensitivity,
    sensors::{ReplaySensor, SensorError, SensorSuite, WearerModel},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use tracing::info;
use tracing_subscriber::filter::LevelFilter;

const TICK_RATE_MS: u64 = 250;

/// heart-rate and motion based drowsiness detector
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Watches heart rate and wrist motion, learns a baseline from the first samples of each session and alerts when the heart rate drops below it while you sit still."
)]
pub struct Cli {
    /// alert sensitivity; overrides and replaces the stored preference
    #[clap(short = 's', long, value_enum)]
    sensitivity: Option<Sensitivity>,

    /// replay heart-rate and motion readings from a CSV capture instead of simulating them
    #[clap(short = 'r', long)]
    replay: Option<PathBuf>,

    /// initial heart rate of the simulated wearer
    #[clap(long, default_value_t = 68.0)]
    resting_bpm: f64,

    /// milliseconds between simulated heart-rate samples
    #[clap(long, default_value_t = 1000)]
    sample_interval_ms: u64,

    /// start detecting immediately
    #[clap(long)]
    start: bool,

    /// run without a terminal UI, printing each evaluation (requires --replay)
    #[clap(long, requires = "replay")]
    headless: bool,

    /// log level written to the log file
    #[clap(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn build_sensors(&self) -> Result<(SensorSuite, Option<Arc<WearerModel>>), SensorError> {
        match &self.replay {
            Some(path) => Ok((SensorSuite::new().with(ReplaySensor::from_path(path)?), None)),
            None => {
                let wearer = Arc::new(WearerModel::new(self.resting_bpm));
                let interval = Duration::from_millis(self.sample_interval_ms.max(1));
                Ok((
                    SensorSuite::simulated(Arc::clone(&wearer), interval),
                    Some(wearer),
                ))
            }
        }
    }
}

fn init_tracing(level: &str) {
    let filter = level.parse::<LevelFilter>().unwrap_or(LevelFilter::INFO);
    let builder = tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_target(false)
        .with_ansi(false);

    let log_file = AppDirs::log_path().and_then(|path| {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok()?;
        }
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
    });

    match log_file {
        Some(file) => builder.with_writer(Mutex::new(file)).init(),
        None => builder.with_writer(io::stderr).init(),
    }
}

fn build_app(cli: &Cli, events: Sender<AppEvent>) -> Result<App, Box<dyn Error>> {
    let store = FileConfigStore::new();
    let stored = store.load().sensitivity();
    info!(path = %store.path().display(), sensitivity = %stored, "loaded preferences");
    let (sensors, wearer) = cli.build_sensors()?;

    let mut app = App::new(
        DetectionCore::new(stored),
        sensors,
        events,
        Box::new(store),
    );
    if let Some(wearer) = wearer {
        app = app.with_wearer(wearer);
    }
    if let Some(sensitivity) = cli.sensitivity {
        app.set_sensitivity(sensitivity);
    }
    Ok(app)
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if !cli.headless && !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    init_tracing(&cli.log_level);
    info!(version = env!("CARGO_PKG_VERSION"), "dozewatch starting");

    if cli.headless {
        let runner = Runner::new(
            ChannelEventSource::new(),
            FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
        );
        let mut app = build_app(&cli, runner.sender())?;
        return run_headless(&mut app, &runner);
    }

    let events = CrosstermEventSource::new();
    let mut app = build_app(&cli, events.sender())?;
    app.subscribe(Box::new(TerminalHaptics::stdout()));
    if cli.start {
        app.start_detection();
    }
    let runner = Runner::new(events, FixedTicker::new(Duration::from_millis(TICK_RATE_MS)));

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &mut app, &runner);
    app.shutdown();

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen,)?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend, E: AppEventSource, T: Ticker>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &Runner<E, T>,
) -> Result<(), Box<dyn Error>> {
    terminal.draw(|f| ui(app, f))?;

    loop {
        let redraw = app.handle(runner.step());
        if app.should_quit() {
            break;
        }
        if redraw {
            terminal.draw(|f| ui(app, f))?;
        }
    }

    Ok(())
}

fn ui(app: &App, f: &mut Frame) {
    f.render_widget(app, f.area());
}

fn run_headless<E: AppEventSource, T: Ticker>(
    app: &mut App,
    runner: &Runner<E, T>,
) -> Result<(), Box<dyn Error>> {
    app.start_detection();

    while !app.replay_finished {
        let line = match runner.step() {
            AppEvent::Sensor { session, reading } if session == app.session() => app
                .on_sensor(reading)
                .and_then(|eval| describe(reading, &eval))
                .or_else(|| describe_motion(reading)),
            event => {
                app.handle(event);
                None
            }
        };
        if let Some(line) = line {
            println!("{}", line);
        }
    }

    app.shutdown();
    println!("alerts: {}", app.snapshot().alerts_fired);
    Ok(())
}

fn describe(reading: SensorReading, eval: &Evaluation) -> Option<String> {
    match (reading, eval) {
        (_, Evaluation::Ignored) => None,
        (SensorReading::HeartRate(bpm), eval) => Some(format!("{:>6.1} bpm  {}", bpm, eval)),
        (SensorReading::Motion(_), _) => None,
    }
}

fn describe_motion(reading: SensorReading) -> Option<String> {
    match reading {
        SensorReading::Motion(moving) => Some(format!(
            "motion     {}",
            if moving { "moving" } else { "still" }
        )),
        SensorReading::HeartRate(_) => None,
    }
}
