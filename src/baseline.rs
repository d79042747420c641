/// Number of samples averaged into the baseline.
pub const BASELINE_WINDOW: usize = 10;

/// Collects the first samples of a session and freezes their mean.
#[derive(Debug, Clone, Default)]
pub struct BaselineEstimator {
    history: Vec<f64>,
    baseline: Option<f64>,
}

impl BaselineEstimator {
    pub fn new() -> Self {
        Self {
            history: Vec::with_capacity(BASELINE_WINDOW),
            baseline: None,
        }
    }

    /// Feeds one sample. Returns the baseline only on the call that established it.
    pub fn ingest(&mut self, sample: f64) -> Option<f64> {
        if self.baseline.is_some() || self.history.len() >= BASELINE_WINDOW {
            return None;
        }

        self.history.push(sample);

        if self.history.len() == BASELINE_WINDOW {
            let baseline = self.history.iter().sum::<f64>() / BASELINE_WINDOW as f64;
            self.baseline = Some(baseline);
            return self.baseline;
        }

        None
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.baseline = None;
    }

    pub fn baseline(&self) -> Option<f64> {
        self.baseline
    }

    pub fn is_established(&self) -> bool {
        self.baseline.is_some()
    }

    pub fn collected(&self) -> usize {
        self.history.len()
    }

    #[cfg(test)]
    pub(crate) fn history(&self) -> &[f64] {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(estimator: &mut BaselineEstimator, samples: &[f64]) -> Vec<Option<f64>> {
        samples.iter().map(|s| estimator.ingest(*s)).collect()
    }

    #[test]
    fn no_baseline_before_window_is_full() {
        let mut est = BaselineEstimator::new();
        for i in 0..BASELINE_WINDOW - 1 {
            assert_eq!(est.ingest(70.0 + i as f64), None);
            assert!(est.baseline().is_none());
        }
        assert_eq!(est.collected(), BASELINE_WINDOW - 1);
    }

    #[test]
    fn tenth_sample_establishes_mean() {
        let mut est = BaselineEstimator::new();
        let samples = [60., 62., 64., 66., 68., 70., 72., 74., 76., 78.];
        let results = fill(&mut est, &samples);

        assert!(results[..9].iter().all(Option::is_none));
        assert_eq!(results[9], Some(69.0));
        assert_eq!(est.baseline(), Some(69.0));
        assert!(est.is_established());
    }

    #[test]
    fn baseline_is_frozen_after_established() {
        let mut est = BaselineEstimator::new();
        fill(&mut est, &[70.0; BASELINE_WINDOW]);

        assert_eq!(est.ingest(20.0), None);
        assert_eq!(est.ingest(200.0), None);
        assert_eq!(est.baseline(), Some(70.0));
        assert_eq!(est.history().len(), BASELINE_WINDOW);
        assert!(est.history().iter().all(|s| *s == 70.0));
    }

    #[test]
    fn reset_clears_history_and_baseline() {
        let mut est = BaselineEstimator::new();
        fill(&mut est, &[70.0; BASELINE_WINDOW]);
        est.reset();

        assert_eq!(est.baseline(), None);
        assert_eq!(est.collected(), 0);

        fill(&mut est, &[80.0; BASELINE_WINDOW - 1]);
        assert_eq!(est.baseline(), None);
        assert_eq!(est.ingest(80.0), Some(80.0));
    }

    #[test]
    fn accepts_implausible_values() {
        let mut est = BaselineEstimator::new();
        fill(&mut est, &[-10.0, 0.0, 500.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0]);
        assert_eq!(est.baseline(), Some(56.0));
    }
}
