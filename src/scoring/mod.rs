//! Aggregation of the collected signals and the scoring round trip.
//!
//! * [`compute_visual_summary`] condenses the expression history into one
//!   bounded visual-risk probability.
//! * [`build_scoring_request`] assembles the payload for the scoring service.
//! * [`RiskTier`] / [`PhqSeverity`] map numbers to display tiers.
//! * [`HttpScoringClient`] implements [`ScoringService`] and
//!   [`SentimentService`] over HTTP.
//! * [`ResultView`] is what the Results stage renders.

pub mod client;
pub mod request;
pub mod summary;
pub mod tier;
pub mod view;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use client::{
    CombinedScore, HttpScoringClient, PhqScore, ScoringError, ScoringResult, ScoringService,
    Sentiment, SentimentService, TextScore, VisualScore,
};
pub use request::{build_scoring_request, IncompleteQuestionnaire, ScoringRequest};
pub use summary::{compute_visual_summary, VisualSummary};
pub use tier::{phq_total, BadgeClass, PhqSeverity, RiskTier, PHQ_ITEMS, PHQ_MAX_SCORE};
pub use view::{ResultView, VisualPanel};
