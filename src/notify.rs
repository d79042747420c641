use std::io::Write;

use tracing::warn;

use crate::detector::{AlertSink, DrowsinessAlert};

/// Stand-in for the wrist haptic: rings the terminal bell once per alert.
pub struct TerminalHaptics<W: Write + Send> {
    out: W,
    pulses: u64,
}

impl TerminalHaptics<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> TerminalHaptics<W> {
    pub fn new(out: W) -> Self {
        Self { out, pulses: 0 }
    }

    pub fn pulses(&self) -> u64 {
        self.pulses
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> AlertSink for TerminalHaptics<W> {
    fn on_drowsiness_detected(&mut self, alert: &DrowsinessAlert) {
        warn!(
            bpm = alert.sample,
            baseline = alert.baseline,
            drop = alert.drop,
            threshold = alert.threshold,
            "drowsiness detected"
        );
        self.pulses += 1;
        if let Err(e) = self.out.write_all(b"\x07").and_then(|_| self.out.flush()) {
            warn!(error = %e, "haptic pulse failed");
        }
    }
}
