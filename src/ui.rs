use chrono::Local;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Widget},
};
use time_humanize::{Accuracy, HumanTime, Tense};

use crate::app::App;
use crate::baseline::BASELINE_WINDOW;
use crate::detector::{DetectionPhase, DetectionSnapshot};
use crate::sensitivity::Sensitivity;

const HORIZONTAL_MARGIN: u16 = 2;

/// Green while the heart rate sits at baseline, through yellow, to red once
/// the drop reaches the active threshold.
pub fn heart_rate_color(drop: Option<f64>, threshold: f64) -> Color {
    let ratio = match drop {
        Some(drop) if threshold > 0.0 => (drop / threshold).clamp(0.0, 1.0),
        _ => return Color::White,
    };

    let (r, g) = if ratio < 0.5 {
        ((ratio * 2.0 * 255.0) as u8, 200)
    } else {
        (255, ((1.0 - ratio) * 2.0 * 200.0) as u8)
    };
    Color::Rgb(r, g, 0)
}

fn phase_style(phase: DetectionPhase) -> Style {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    match phase {
        DetectionPhase::Idle => bold.fg(Color::DarkGray),
        DetectionPhase::CollectingBaseline => bold.fg(Color::Yellow),
        DetectionPhase::Monitoring => bold.fg(Color::Green),
    }
}

fn sensitivity_line(current: Sensitivity) -> Line<'static> {
    let mut spans = vec![Span::raw("Sensitivity  ")];
    for s in Sensitivity::ALL {
        let label = format!(" {} ", s);
        if s == current {
            spans.push(Span::styled(
                label,
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ));
        } else {
            spans.push(Span::styled(label, Style::default().fg(Color::DarkGray)));
        }
        spans.push(Span::raw(" "));
    }
    spans.push(Span::raw(format!("(drop > {:.0} bpm)", current.threshold())));
    Line::from(spans)
}

fn status_lines(app: &App, snap: &DetectionSnapshot) -> Vec<Line<'static>> {
    let toggle = if snap.active { "[ ON ]" } else { "[ OFF ]" };
    let toggle_style = if snap.active {
        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let motion = if !snap.active {
        Span::styled("-", Style::default().fg(Color::DarkGray))
    } else if snap.is_moving {
        Span::styled("moving (alerts paused)", Style::default().fg(Color::Blue))
    } else {
        Span::raw("stationary")
    };

    let heart = match snap.last_sample {
        Some(bpm) => Span::styled(
            format!("{:.1} bpm", bpm),
            Style::default()
                .fg(heart_rate_color(snap.current_drop(), snap.threshold))
                .add_modifier(Modifier::BOLD),
        ),
        None => Span::styled("waiting for samples", Style::default().fg(Color::DarkGray)),
    };

    let baseline = match snap.baseline {
        Some(b) => Span::raw(format!("{:.1} bpm", b)),
        None if snap.active => Span::styled(
            format!("collecting {}/{}", snap.samples_collected, BASELINE_WINDOW),
            Style::default().fg(Color::Yellow),
        ),
        None => Span::styled("-", Style::default().fg(Color::DarkGray)),
    };

    let mut lines = vec![
        Line::from(vec![
            Span::raw("Detection    "),
            Span::styled(toggle, toggle_style),
            Span::raw("  "),
            Span::styled(snap.phase.to_string(), phase_style(snap.phase)),
        ]),
        sensitivity_line(snap.sensitivity),
        Line::from(vec![Span::raw("Motion       "), motion]),
        Line::from(vec![Span::raw("Heart rate   "), heart]),
        Line::from(vec![Span::raw("Baseline     "), baseline]),
    ];

    let mut alerts = vec![
        Span::raw("Alerts       "),
        Span::raw(snap.alerts_fired.to_string()),
    ];
    if let Some(alert) = &app.last_alert {
        let ago = Local::now()
            .signed_duration_since(alert.at)
            .to_std()
            .unwrap_or_default();
        alerts.push(Span::styled(
            format!(
                "  last {} ({:.1} bpm below baseline)",
                HumanTime::from(ago).to_text_en(Accuracy::Rough, Tense::Past),
                alert.drop
            ),
            Style::default().fg(Color::Red),
        ));
    }
    lines.push(Line::from(alerts));

    if let Some(wearer) = app.wearer() {
        lines.push(Line::from(Span::styled(
            format!(
                "Simulated    {:.0} bpm, {}",
                wearer.resting_bpm(),
                if wearer.is_moving() { "moving" } else { "still" }
            ),
            Style::default().add_modifier(Modifier::DIM),
        )));
    } else if app.replay_finished {
        lines.push(Line::from(Span::styled(
            "Replay       finished",
            Style::default().add_modifier(Modifier::DIM),
        )));
    }

    lines
}

/// `Gauge` panics outside `0..=1`, and `clamp` lets NaN through.
fn gauge_ratio(ratio: f64) -> f64 {
    if ratio.is_finite() {
        ratio.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn progress_gauge(snap: &DetectionSnapshot) -> Gauge<'static> {
    match (snap.phase, snap.current_drop()) {
        (DetectionPhase::Monitoring, Some(drop)) => {
            let ratio = gauge_ratio(drop / snap.threshold);
            Gauge::default()
                .block(Block::default().borders(Borders::ALL).title("Drop vs threshold"))
                .gauge_style(Style::default().fg(heart_rate_color(Some(drop), snap.threshold)))
                .label(format!("{:.1} / {:.1} bpm", drop.max(0.0), snap.threshold))
                .ratio(ratio)
        }
        (DetectionPhase::Monitoring, None) => Gauge::default()
            .block(Block::default().borders(Borders::ALL).title("Drop vs threshold"))
            .ratio(0.0),
        _ => Gauge::default()
            .block(Block::default().borders(Borders::ALL).title("Baseline"))
            .gauge_style(Style::default().fg(Color::Yellow))
            .label(format!("{}/{}", snap.samples_collected, BASELINE_WINDOW))
            .ratio(gauge_ratio(snap.collection_progress())),
    }
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let snap = self.snapshot();
        let status = status_lines(self, &snap);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .constraints(
                [
                    Constraint::Length(3),
                    Constraint::Length(status.len() as u16 + 2),
                    Constraint::Length(3),
                    Constraint::Length(3),
                    Constraint::Min(0),
                    Constraint::Length(2),
                ]
                .as_ref(),
            )
            .split(area);

        Paragraph::new(Span::styled(
            "dozewatch",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ))
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

        Paragraph::new(status)
            .block(Block::default().borders(Borders::ALL).title("Status"))
            .render(chunks[1], buf);

        progress_gauge(&snap).render(chunks[2], buf);

        if self.alert_showing() {
            Paragraph::new(Span::styled(
                "WAKE UP! Heart rate dropped below baseline",
                Style::default()
                    .fg(Color::White)
                    .bg(Color::Red)
                    .add_modifier(Modifier::BOLD | Modifier::SLOW_BLINK),
            ))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Red)),
            )
            .alignment(Alignment::Center)
            .render(chunks[3], buf);
        }

        let help = if self.wearer().is_some() {
            "(space) detection  (l/m/h) sensitivity  (↑/↓) heart rate  (w) motion  (enter) dismiss  (q) quit"
        } else {
            "(space) detection  (l/m/h) sensitivity  (enter) dismiss  (q) quit"
        };
        Paragraph::new(Span::styled(
            help,
            Style::default()
                .add_modifier(Modifier::ITALIC)
                .fg(Color::Magenta),
        ))
        .alignment(Alignment::Center)
        .render(chunks[5], buf);
    }
}
