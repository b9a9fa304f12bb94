//! Outbound scoring payload.

use serde::Serialize;
use thiserror::Error;

use super::summary::{compute_visual_summary, VisualSummary};
use super::tier::PHQ_ITEMS;
use crate::expression::ExpressionHistory;
use crate::session::Session;

/// Body of the scoring call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringRequest {
    pub phq_answers: [u8; PHQ_ITEMS],
    /// Interview utterances joined with single spaces.  May be empty.
    pub interview_text: String,
    /// `null` when no face was ever detected.
    pub visual_data: Option<VisualSummary>,
}

/// The questionnaire still has an unanswered item.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("questionnaire item {} is unanswered", .first_unanswered + 1)]
pub struct IncompleteQuestionnaire {
    pub first_unanswered: usize,
}

/// Assemble the scoring payload from the session's collected signals.
pub fn build_scoring_request(
    session: &Session,
    history: &ExpressionHistory,
) -> Result<ScoringRequest, IncompleteQuestionnaire> {
    let mut phq_answers = [0u8; PHQ_ITEMS];
    for (i, (slot, &answer)) in phq_answers
        .iter_mut()
        .zip(session.questionnaire.answers())
        .enumerate()
    {
        if !(0..=3).contains(&answer) {
            return Err(IncompleteQuestionnaire { first_unanswered: i });
        }
        *slot = answer as u8;
    }

    Ok(ScoringRequest {
        phq_answers,
        interview_text: session.interview.transcript().join(" "),
        visual_data: compute_visual_summary(history),
    })
}
