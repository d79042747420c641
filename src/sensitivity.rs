use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// How eagerly a heart-rate drop is treated as drowsiness.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Sensitivity {
    Low,
    #[default]
    Medium,
    High,
}

impl Sensitivity {
    pub const ALL: [Sensitivity; 3] = [Sensitivity::Low, Sensitivity::Medium, Sensitivity::High];

    /// Drop below baseline, in bpm, that must be exceeded to raise an alert.
    pub fn threshold(self) -> f64 {
        match self {
            Sensitivity::Low => 7.0,
            Sensitivity::Medium => 5.0,
            Sensitivity::High => 3.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Sensitivity::Low => "low",
            Sensitivity::Medium => "medium",
            Sensitivity::High => "high",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|s| s.label().eq_ignore_ascii_case(label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_are_fixed_per_level() {
        assert_eq!(Sensitivity::Low.threshold(), 7.0);
        assert_eq!(Sensitivity::Medium.threshold(), 5.0);
        assert_eq!(Sensitivity::High.threshold(), 3.0);
    }

    #[test]
    fn default_is_medium() {
        assert_eq!(Sensitivity::default(), Sensitivity::Medium);
    }

    #[test]
    fn labels_roundtrip_through_from_label() {
        for s in Sensitivity::ALL {
            assert_eq!(Sensitivity::from_label(s.label()), Some(s));
            assert_eq!(s.to_string(), s.label());
        }
    }

    #[test]
    fn from_label_is_lenient_about_case_and_whitespace() {
        assert_eq!(Sensitivity::from_label(" HIGH "), Some(Sensitivity::High));
        assert_eq!(Sensitivity::from_label("Low"), Some(Sensitivity::Low));
    }

    #[test]
    fn from_label_rejects_unknown() {
        assert_eq!(Sensitivity::from_label("extreme"), None);
        assert_eq!(Sensitivity::from_label(""), None);
    }
}
