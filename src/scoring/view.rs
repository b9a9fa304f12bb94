//! Presentation model for the Results stage.

use std::fmt;

use super::client::{ScoringResult, Sentiment};
use super::summary::VisualSummary;
use super::tier::{BadgeClass, PhqSeverity, RiskTier, PHQ_MAX_SCORE};
use crate::expression::Emotion;

/// Visual-signal panel.  `NoData` is distinct from a low score.
#[derive(Debug, Clone, PartialEq)]
pub enum VisualPanel {
    NoData,
    Measured {
        flat_affect_percent: u8,
        tier: RiskTier,
        /// Emotion averages, highest first.
        emotions: Vec<(Emotion, f64)>,
        note: String,
    },
}

/// Everything the Results stage shows, derived from the service result and
/// the locally computed visual summary.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultView {
    pub combined_percent: u8,
    pub combined_tier: RiskTier,
    pub phq_score: u8,
    pub phq_severity: PhqSeverity,
    pub phq_badge: BadgeClass,
    pub guidance: &'static str,
    pub text_percent: u8,
    pub text_tier: RiskTier,
    pub visual: VisualPanel,
    pub sentiment: Option<Sentiment>,
}

fn percent(p: f64) -> u8 {
    (p.clamp(0.0, 1.0) * 100.0).round() as u8
}

impl ResultView {
    pub fn new(result: &ScoringResult, visual: Option<&VisualSummary>) -> Self {
        let combined_tier = RiskTier::from_label(&result.combined.risk_level)
            .unwrap_or_else(|| RiskTier::from_probability(result.combined.probability));
        let phq_score = result.phq.score.min(PHQ_MAX_SCORE);
        let phq_severity = PhqSeverity::from_label(&result.phq.severity)
            .unwrap_or_else(|| PhqSeverity::from_score(phq_score));

        let visual = match visual {
            Some(summary) if summary.sample_count > 0 => {
                let mut emotions = summary.averages.scores().to_vec();
                emotions.sort_by(|a, b| b.1.total_cmp(&a.1));
                VisualPanel::Measured {
                    flat_affect_percent: percent(summary.flat_affect),
                    tier: RiskTier::from_probability(summary.visual_probability),
                    emotions,
                    note: format!(
                        "Based on {} snapshots ({}% detection rate).",
                        summary.sample_count,
                        percent(summary.detection_rate)
                    ),
                }
            }
            _ => VisualPanel::NoData,
        };

        Self {
            combined_percent: percent(result.combined.probability),
            combined_tier,
            phq_score,
            phq_severity,
            phq_badge: BadgeClass::for_phq_score(phq_score),
            guidance: phq_severity.guidance(),
            text_percent: percent(result.text.probability),
            text_tier: RiskTier::from_probability(result.text.probability),
            visual,
            sentiment: None,
        }
    }

    pub fn with_sentiment(mut self, sentiment: Sentiment) -> Self {
        self.sentiment = Some(sentiment);
        self
    }

    /// e.g. `"Moderate Risk"`.
    pub fn risk_label(&self) -> String {
        format!("{} Risk", self.combined_tier.label())
    }
}

impl fmt::Display for ResultView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Overall: {}% ({})", self.combined_percent, self.risk_label())?;
        writeln!(
            f,
            "PHQ-8: {} / {} [{}] {}",
            self.phq_score,
            PHQ_MAX_SCORE,
            self.phq_severity,
            self.guidance
        )?;
        writeln!(f, "Text: {}% [{}]", self.text_percent, self.text_tier.badge())?;
        match &self.visual {
            VisualPanel::NoData => {
                writeln!(f, "Visual: No Data (camera was not enabled)")?;
            }
            VisualPanel::Measured {
                flat_affect_percent,
                tier,
                emotions,
                note,
            } => {
                writeln!(
                    f,
                    "Visual: flat affect {flat_affect_percent}% [{}]",
                    tier.badge()
                )?;
                for (emotion, value) in emotions {
                    writeln!(
                        f,
                        "  {} {:<10} {:>3.0}%",
                        emotion.emoji(),
                        emotion.name(),
                        value * 100.0
                    )?;
                }
                writeln!(f, "  {note}")?;
            }
        }
        if let Some(s) = &self.sentiment {
            writeln!(
                f,
                "Sentiment: negative {}%, neutral {}%, positive {}%",
                percent(s.neg),
                percent(s.neu),
                percent(s.pos)
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{ExpressionHistory, ExpressionSample};
    use crate::scoring::client::mock::result;
    use crate::scoring::compute_visual_summary;

    #[test]
    fn camera_less_result_shows_no_data() {
        let view = ResultView::new(&result(0.2, 0), None);
        assert_eq!(view.visual, VisualPanel::NoData);
        assert_eq!(view.combined_percent, 20);
        assert_eq!(view.risk_label(), "Low Risk");
        assert_eq!(view.phq_badge, BadgeClass::Low);
        assert!(view.to_string().contains("Visual: No Data"));
    }

    #[test]
    fn phq_badge_and_guidance_follow_score() {
        let view = ResultView::new(&result(0.7, 12), None);
        assert_eq!(view.phq_severity, PhqSeverity::Moderate);
        assert_eq!(view.phq_badge, BadgeClass::High);
        assert_eq!(
            view.guidance,
            "Your score suggests moderate depression. Professional consultation recommended."
        );
        assert_eq!(view.combined_tier, RiskTier::High);
    }

    #[test]
    fn visual_panel_sorts_emotions_and_builds_note() {
        let mut history = ExpressionHistory::new();
        for _ in 0..3 {
            history.record_detection(ExpressionSample {
                neutral: 0.2,
                happy: 0.7,
                sad: 0.1,
                ..Default::default()
            });
        }
        history.record_miss();
        let summary = compute_visual_summary(&history).unwrap();

        let view = ResultView::new(&result(0.3, 2), Some(&summary));
        let VisualPanel::Measured {
            flat_affect_percent,
            tier,
            emotions,
            note,
        } = &view.visual
        else {
            panic!("expected measured visual panel");
        };

        assert_eq!(*flat_affect_percent, 20);
        assert_eq!(*tier, RiskTier::Low);
        assert_eq!(emotions[0].0, Emotion::Happy);
        assert_eq!(emotions[1].0, Emotion::Neutral);
        assert_eq!(note, "Based on 3 snapshots (75% detection rate).");
    }

    #[test]
    fn sentiment_is_rendered_when_present() {
        let view = ResultView::new(&result(0.5, 6), None).with_sentiment(Sentiment {
            neg: 0.25,
            neu: 0.5,
            pos: 0.25,
        });
        let text = view.to_string();
        assert!(text.contains("negative 25%"));
        assert!(text.contains("PHQ-8: 6 / 24 [Mild]"));
    }
}
