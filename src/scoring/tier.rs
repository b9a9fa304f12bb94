//! Display tiers for probabilities and PHQ-8 totals.
//!
//! Both mappings are pure and their boundaries are fixed: the severity cut
//! points drive the guidance text shown to the user.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of PHQ-8 items.
pub const PHQ_ITEMS: usize = 8;

/// Highest possible PHQ-8 total.
pub const PHQ_MAX_SCORE: u8 = 24;

// ---------------------------------------------------------------------------
// RiskTier
// ---------------------------------------------------------------------------

/// Probability band.
///
/// ```rust
/// use mindscan::scoring::RiskTier;
///
/// assert_eq!(RiskTier::from_probability(0.6), RiskTier::High);
/// assert_eq!(RiskTier::from_probability(0.4), RiskTier::Moderate);
/// assert_eq!(RiskTier::from_probability(0.39), RiskTier::Low);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskTier {
    Low,
    Moderate,
    High,
}

impl RiskTier {
    pub fn from_probability(p: f64) -> Self {
        if p >= 0.6 {
            RiskTier::High
        } else if p >= 0.4 {
            RiskTier::Moderate
        } else {
            RiskTier::Low
        }
    }

    /// Parse the service's `riskLevel` string.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "low" | "normal" => Some(RiskTier::Low),
            "moderate" => Some(RiskTier::Moderate),
            "high" | "elevated" => Some(RiskTier::High),
            _ => None,
        }
    }

    /// Risk wording used for the combined score.
    pub fn label(&self) -> &'static str {
        match self {
            RiskTier::Low => "Low",
            RiskTier::Moderate => "Moderate",
            RiskTier::High => "High",
        }
    }

    /// Badge wording used for per-signal scores.
    pub fn badge(&self) -> &'static str {
        match self {
            RiskTier::Low => "Normal",
            RiskTier::Moderate => "Moderate",
            RiskTier::High => "Elevated",
        }
    }

    /// Style class of the badge.
    pub fn class(&self) -> BadgeClass {
        match self {
            RiskTier::Low => BadgeClass::Low,
            RiskTier::Moderate => BadgeClass::Moderate,
            RiskTier::High => BadgeClass::High,
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Visual emphasis of a result badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeClass {
    Low,
    Moderate,
    High,
}

impl BadgeClass {
    /// Badge class for a PHQ-8 total: `high` from 10, `moderate` from 5.
    pub fn for_phq_score(score: u8) -> Self {
        if score >= 10 {
            BadgeClass::High
        } else if score >= 5 {
            BadgeClass::Moderate
        } else {
            BadgeClass::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BadgeClass::Low => "low",
            BadgeClass::Moderate => "moderate",
            BadgeClass::High => "high",
        }
    }
}

// ---------------------------------------------------------------------------
// PhqSeverity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PhqSeverity {
    Minimal,
    Mild,
    Moderate,
    ModeratelySevere,
    Severe,
}

impl PhqSeverity {
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=4 => PhqSeverity::Minimal,
            5..=9 => PhqSeverity::Mild,
            10..=14 => PhqSeverity::Moderate,
            15..=19 => PhqSeverity::ModeratelySevere,
            _ => PhqSeverity::Severe,
        }
    }

    /// Parse the service's `severity` string.
    pub fn from_label(label: &str) -> Option<Self> {
        [
            PhqSeverity::Minimal,
            PhqSeverity::Mild,
            PhqSeverity::Moderate,
            PhqSeverity::ModeratelySevere,
            PhqSeverity::Severe,
        ]
        .into_iter()
        .find(|s| s.label().eq_ignore_ascii_case(label.trim()))
    }

    pub fn label(&self) -> &'static str {
        match self {
            PhqSeverity::Minimal => "Minimal",
            PhqSeverity::Mild => "Mild",
            PhqSeverity::Moderate => "Moderate",
            PhqSeverity::ModeratelySevere => "Moderately Severe",
            PhqSeverity::Severe => "Severe",
        }
    }

    pub fn guidance(&self) -> &'static str {
        match self {
            PhqSeverity::Minimal => "Your PHQ-8 score suggests minimal depressive symptoms.",
            PhqSeverity::Mild => "Your PHQ-8 score suggests mild symptoms. Consider monitoring.",
            PhqSeverity::Moderate => {
                "Your score suggests moderate depression. Professional consultation recommended."
            }
            PhqSeverity::ModeratelySevere => {
                "Your score suggests moderately severe depression. Please seek help."
            }
            PhqSeverity::Severe => {
                "Your score suggests severe depression. Contact a healthcare provider."
            }
        }
    }
}

impl fmt::Display for PhqSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Sum of the answered items.  Unanswered (`-1`) items count as zero.
pub fn phq_total(answers: &[i8]) -> u8 {
    answers
        .iter()
        .filter(|&&a| a > 0)
        .map(|&a| a as u8)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_boundaries() {
        assert_eq!(RiskTier::from_probability(0.0), RiskTier::Low);
        assert_eq!(RiskTier::from_probability(0.399_999), RiskTier::Low);
        assert_eq!(RiskTier::from_probability(0.4), RiskTier::Moderate);
        assert_eq!(RiskTier::from_probability(0.599_999), RiskTier::Moderate);
        assert_eq!(RiskTier::from_probability(0.6), RiskTier::High);
        assert_eq!(RiskTier::from_probability(1.0), RiskTier::High);
    }

    #[test]
    fn risk_labels_round_trip_service_strings() {
        assert_eq!(RiskTier::from_label("High"), Some(RiskTier::High));
        assert_eq!(RiskTier::from_label("moderate"), Some(RiskTier::Moderate));
        assert_eq!(RiskTier::from_label("Normal"), Some(RiskTier::Low));
        assert_eq!(RiskTier::from_label("unknown"), None);
        assert_eq!(RiskTier::High.badge(), "Elevated");
        assert_eq!(RiskTier::Low.badge(), "Normal");
    }

    #[test]
    fn severity_boundaries_on_both_sides() {
        let cases = [
            (0, PhqSeverity::Minimal),
            (4, PhqSeverity::Minimal),
            (5, PhqSeverity::Mild),
            (9, PhqSeverity::Mild),
            (10, PhqSeverity::Moderate),
            (14, PhqSeverity::Moderate),
            (15, PhqSeverity::ModeratelySevere),
            (19, PhqSeverity::ModeratelySevere),
            (20, PhqSeverity::Severe),
            (24, PhqSeverity::Severe),
        ];
        for (score, expected) in cases {
            assert_eq!(PhqSeverity::from_score(score), expected, "score {score}");
        }
    }

    #[test]
    fn severity_parses_service_labels() {
        assert_eq!(
            PhqSeverity::from_label("Moderately Severe"),
            Some(PhqSeverity::ModeratelySevere)
        );
        assert_eq!(PhqSeverity::from_label("mild"), Some(PhqSeverity::Mild));
        assert_eq!(PhqSeverity::from_label("none"), None);
    }

    #[test]
    fn phq_badge_class_thresholds() {
        assert_eq!(BadgeClass::for_phq_score(4), BadgeClass::Low);
        assert_eq!(BadgeClass::for_phq_score(5), BadgeClass::Moderate);
        assert_eq!(BadgeClass::for_phq_score(9), BadgeClass::Moderate);
        assert_eq!(BadgeClass::for_phq_score(10), BadgeClass::High);
    }

    #[test]
    fn total_ignores_unanswered_items() {
        assert_eq!(phq_total(&[0; 8]), 0);
        assert_eq!(phq_total(&[3; 8]), PHQ_MAX_SCORE);
        assert_eq!(phq_total(&[1, 2, -1, 3, 0, 0, 0, 0]), 6);
    }
}
