//! Visual-risk summary over the collected expression history.
//!
//! ```text
//! flatAffect  = mean(neutral)
//! sadScore    = mean(sad) + 0.5 * mean(fearful)
//! happyScore  = mean(happy)
//! visualProb  = clamp(0.4 * flatAffect + 0.4 * sadScore + 0.2 * (1 - happyScore), 0, 1)
//! ```
//!
//! The weights are fixed constants shared with the scoring service.

use serde::{Deserialize, Serialize};

use crate::expression::{ExpressionHistory, ExpressionSample};

const FLAT_AFFECT_WEIGHT: f64 = 0.4;
const SADNESS_WEIGHT: f64 = 0.4;
const LOW_HAPPINESS_WEIGHT: f64 = 0.2;
const FEAR_IN_SADNESS: f64 = 0.5;

/// `visualData` in the scoring request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualSummary {
    /// Per-emotion mean over every sample.
    pub averages: ExpressionSample,
    pub flat_affect: f64,
    #[serde(rename = "visualProb")]
    pub visual_probability: f64,
    #[serde(rename = "samplesCollected")]
    pub sample_count: usize,
    /// `detections / attempts`; reported for transparency only.
    #[serde(rename = "faceDetectionRate")]
    pub detection_rate: f64,
}

/// `None` when no face was ever detected, which is distinct from a zero
/// score.
pub fn compute_visual_summary(history: &ExpressionHistory) -> Option<VisualSummary> {
    let averages = ExpressionSample::mean(history.samples())?;

    let flat_affect = averages.neutral;
    let sad_score = averages.sad + FEAR_IN_SADNESS * averages.fearful;
    let happy_score = averages.happy;
    let visual_probability = (FLAT_AFFECT_WEIGHT * flat_affect
        + SADNESS_WEIGHT * sad_score
        + LOW_HAPPINESS_WEIGHT * (1.0 - happy_score))
        .clamp(0.0, 1.0);

    Some(VisualSummary {
        averages,
        flat_affect,
        visual_probability,
        sample_count: history.len(),
        detection_rate: history.detection_rate(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::RiskTier;

    fn history_of(samples: &[ExpressionSample], misses: usize) -> ExpressionHistory {
        let mut history = ExpressionHistory::new();
        for sample in samples {
            history.record_detection(*sample);
        }
        for _ in 0..misses {
            history.record_miss();
        }
        history
    }

    fn uniform(value: f64) -> ExpressionSample {
        ExpressionSample {
            neutral: value,
            happy: value,
            sad: value,
            angry: value,
            fearful: value,
            disgusted: value,
            surprised: value,
        }
    }

    #[test]
    fn empty_history_has_no_summary() {
        assert!(compute_visual_summary(&ExpressionHistory::new()).is_none());
        // Attempts without detections are still "no visual data".
        assert!(compute_visual_summary(&history_of(&[], 5)).is_none());
    }

    #[test]
    fn steady_flat_affect_lands_in_moderate_tier() {
        let sample = ExpressionSample {
            neutral: 0.8,
            happy: 0.05,
            sad: 0.1,
            ..Default::default()
        };
        let summary = compute_visual_summary(&history_of(&[sample; 10], 0)).unwrap();

        assert!((summary.flat_affect - 0.8).abs() < 1e-12);
        assert!((summary.visual_probability - 0.55).abs() < 1e-9);
        assert_eq!(summary.sample_count, 10);
        assert_eq!(summary.detection_rate, 1.0);
        assert_eq!(RiskTier::from_probability(summary.visual_probability), RiskTier::Moderate);
    }

    #[test]
    fn flat_affect_is_mean_neutral() {
        let a = ExpressionSample {
            neutral: 0.9,
            ..Default::default()
        };
        let b = ExpressionSample {
            neutral: 0.3,
            ..Default::default()
        };
        let summary = compute_visual_summary(&history_of(&[a, b], 2)).unwrap();
        assert_eq!(summary.flat_affect, (0.9 + 0.3) / 2.0);
        assert_eq!(summary.detection_rate, 0.5);
    }

    #[test]
    fn probability_is_clamped_for_extreme_inputs() {
        let all_one = compute_visual_summary(&history_of(&[uniform(1.0)], 0)).unwrap();
        // 0.4 + 0.4 * 1.5 + 0 = 1.0
        assert!((0.0..=1.0).contains(&all_one.visual_probability));

        let all_zero = compute_visual_summary(&history_of(&[uniform(0.0)], 0)).unwrap();
        assert!((all_zero.visual_probability - 0.2).abs() < 1e-12);

        let heavy = ExpressionSample {
            neutral: 1.0,
            sad: 1.0,
            fearful: 1.0,
            ..Default::default()
        };
        let clamped = compute_visual_summary(&history_of(&[heavy], 0)).unwrap();
        assert_eq!(clamped.visual_probability, 1.0);
    }

    #[test]
    fn serialises_with_service_field_names() {
        let summary = compute_visual_summary(&history_of(&[uniform(0.5)], 1)).unwrap();
        let json = serde_json::to_value(&summary).unwrap();

        assert_eq!(json["flatAffect"], 0.5);
        assert_eq!(json["samplesCollected"], 1);
        assert_eq!(json["faceDetectionRate"], 0.5);
        assert!(json["visualProb"].is_f64());
        assert_eq!(json["averages"]["neutral"], 0.5);
    }
}
