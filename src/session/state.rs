//! Session data and the local contracts of the questionnaire and interview.
//!
//! Everything here is synchronous and side-effect free; the controller adds
//! sensors, speech and timing on top.

use std::fmt;

use super::content::{INTERVIEW_TOPICS, N_PROMPTS};
use super::stage::Stage;
use crate::scoring::{phq_total, PHQ_ITEMS};

/// Stored value of an unanswered questionnaire item.
pub const UNANSWERED: i8 = -1;

// ---------------------------------------------------------------------------
// Questionnaire
// ---------------------------------------------------------------------------

/// Result of a questionnaire navigation action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    /// The index moved by one.
    Moved,
    /// The current item is unanswered; nothing happened.
    Blocked,
    /// Advance on the last answered item: time to submit.
    Submit,
    /// Retreat at the first item; nothing happened.
    AtStart,
}

/// PHQ-8 answers and the item currently shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Questionnaire {
    answers: [i8; PHQ_ITEMS],
    index: usize,
}

impl Default for Questionnaire {
    fn default() -> Self {
        Self {
            answers: [UNANSWERED; PHQ_ITEMS],
            index: 0,
        }
    }
}

impl Questionnaire {
    pub fn answers(&self) -> &[i8; PHQ_ITEMS] {
        &self.answers
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Answer of the current item, if any.
    pub fn current(&self) -> Option<u8> {
        let value = self.answers[self.index];
        (value != UNANSWERED).then_some(value as u8)
    }

    pub fn is_last(&self) -> bool {
        self.index == PHQ_ITEMS - 1
    }

    /// Record `value` for the current item, overwriting any earlier answer.
    /// Returns `false` (and changes nothing) for values outside `0..=3`.
    pub fn select(&mut self, value: u8) -> bool {
        if value > 3 {
            return false;
        }
        self.answers[self.index] = value as i8;
        true
    }

    pub fn can_advance(&self) -> bool {
        self.answers[self.index] != UNANSWERED
    }

    pub fn advance(&mut self) -> Navigation {
        if !self.can_advance() {
            Navigation::Blocked
        } else if self.is_last() {
            Navigation::Submit
        } else {
            self.index += 1;
            Navigation::Moved
        }
    }

    pub fn retreat(&mut self) -> Navigation {
        if self.index == 0 {
            return Navigation::AtStart;
        }
        self.index -= 1;
        Navigation::Moved
    }

    /// Index of the first unanswered item.
    pub fn first_unanswered(&self) -> Option<usize> {
        self.answers.iter().position(|&a| a == UNANSWERED)
    }

    pub fn total(&self) -> u8 {
        phq_total(&self.answers)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// ---------------------------------------------------------------------------
// Interview
// ---------------------------------------------------------------------------

/// Progress marker of one interview topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicProgress {
    Done,
    Current,
    Pending,
}

/// Transcript of the conversational interview.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Interview {
    transcript: Vec<String>,
    prompt_index: usize,
}

impl Interview {
    pub fn transcript(&self) -> &[String] {
        &self.transcript
    }

    pub fn prompt_index(&self) -> usize {
        self.prompt_index
    }

    pub fn is_finished(&self) -> bool {
        self.prompt_index >= N_PROMPTS
    }

    /// Append a trimmed utterance and move to the next prompt.
    ///
    /// Blank text, or any text once every prompt has been answered, is
    /// ignored and returns `None`.  Otherwise returns the new prompt index.
    pub fn submit(&mut self, text: &str) -> Option<usize> {
        let text = text.trim();
        if text.is_empty() || self.is_finished() {
            return None;
        }
        self.transcript.push(text.to_string());
        self.prompt_index += 1;
        Some(self.prompt_index)
    }

    /// Topic labels with their progress, in prompt order.
    pub fn progress(&self) -> Vec<(&'static str, TopicProgress)> {
        INTERVIEW_TOPICS
            .iter()
            .enumerate()
            .map(|(i, &topic)| {
                let state = if i < self.prompt_index {
                    TopicProgress::Done
                } else if i == self.prompt_index {
                    TopicProgress::Current
                } else {
                    TopicProgress::Pending
                };
                (topic, state)
            })
            .collect()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// ---------------------------------------------------------------------------
// Device checks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckStatus {
    #[default]
    NotChecked,
    Working,
    Failed,
    Played,
}

impl CheckStatus {
    pub fn label(&self) -> &'static str {
        match self {
            CheckStatus::NotChecked => "Not checked",
            CheckStatus::Working => "✓ Working",
            CheckStatus::Failed => "✗ Failed",
            CheckStatus::Played => "✓ Played",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckedDevice {
    Camera,
    Microphone,
    Voice,
}

/// Setup-stage indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceChecks {
    pub camera: CheckStatus,
    pub microphone: CheckStatus,
    pub voice: CheckStatus,
}

impl DeviceChecks {
    pub fn set(&mut self, device: CheckedDevice, status: CheckStatus) {
        match device {
            CheckedDevice::Camera => self.camera = status,
            CheckedDevice::Microphone => self.microphone = status,
            CheckedDevice::Voice => self.voice = status,
        }
    }
}

// ---------------------------------------------------------------------------
// Modalities
// ---------------------------------------------------------------------------

/// Capabilities that can be missing without failing the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modality {
    Camera,
    Microphone,
    ExpressionDetection,
    SpeechRecognition,
    SpeechSynthesis,
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Modality::Camera => "camera",
            Modality::Microphone => "microphone",
            Modality::ExpressionDetection => "expression detection",
            Modality::SpeechRecognition => "speech recognition",
            Modality::SpeechSynthesis => "speech synthesis",
        })
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// All data of one visit, from landing to an explicit reset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub stage: Stage,
    pub questionnaire: Questionnaire,
    pub interview: Interview,
    pub checks: DeviceChecks,
    absent: Vec<Modality>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `modality` as unavailable.  Returns `true` the first time only,
    /// so the status is surfaced once.
    pub fn mark_absent(&mut self, modality: Modality) -> bool {
        if self.absent.contains(&modality) {
            return false;
        }
        self.absent.push(modality);
        true
    }

    pub fn absent(&self) -> &[Modality] {
        &self.absent
    }

    /// Back to a fresh Landing session.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_is_blocked_iff_current_item_unanswered() {
        let mut q = Questionnaire::default();
        assert_eq!(q.advance(), Navigation::Blocked);
        assert_eq!(q.index(), 0);

        for value in [2, 0, 3, 1] {
            q.select(value);
            assert!(q.can_advance());
        }
        assert_eq!(q.advance(), Navigation::Moved);
        assert_eq!(q.index(), 1);
        assert_eq!(q.advance(), Navigation::Blocked);

        // Going back to an answered item keeps its answer.
        assert_eq!(q.retreat(), Navigation::Moved);
        assert_eq!(q.current(), Some(1));
        assert_eq!(q.retreat(), Navigation::AtStart);
    }

    #[test]
    fn last_item_triggers_submit_instead_of_moving() {
        let mut q = Questionnaire::default();
        for _ in 0..PHQ_ITEMS - 1 {
            q.select(0);
            assert_eq!(q.advance(), Navigation::Moved);
        }
        assert!(q.is_last());
        assert_eq!(q.advance(), Navigation::Blocked);
        q.select(2);
        assert_eq!(q.advance(), Navigation::Submit);
        assert_eq!(q.index(), PHQ_ITEMS - 1);
        assert_eq!(q.first_unanswered(), None);
        assert_eq!(q.total(), 2);
    }

    #[test]
    fn out_of_range_selection_is_ignored() {
        let mut q = Questionnaire::default();
        assert!(!q.select(4));
        assert_eq!(q.current(), None);
        assert_eq!(q.first_unanswered(), Some(0));
    }

    #[test]
    fn blank_utterances_are_ignored() {
        let mut interview = Interview::default();
        assert_eq!(interview.submit("   \n\t"), None);
        assert_eq!(interview.submit("  I'm okay "), Some(1));
        assert_eq!(interview.transcript(), &["I'm okay".to_string()]);
    }

    #[test]
    fn interview_stops_accepting_after_last_prompt() {
        let mut interview = Interview::default();
        for i in 0..N_PROMPTS {
            assert_eq!(interview.submit("answer"), Some(i + 1));
        }
        assert!(interview.is_finished());
        assert_eq!(interview.submit("extra"), None);
        assert_eq!(interview.transcript().len(), N_PROMPTS);
    }

    #[test]
    fn progress_marks_done_current_pending() {
        let mut interview = Interview::default();
        interview.submit("one");
        interview.submit("two");
        let progress = interview.progress();
        assert_eq!(progress[0], ("General wellbeing", TopicProgress::Done));
        assert_eq!(progress[1].1, TopicProgress::Done);
        assert_eq!(progress[2], ("Sleep quality", TopicProgress::Current));
        assert_eq!(progress[7].1, TopicProgress::Pending);
    }

    #[test]
    fn modality_is_reported_once_until_reset() {
        let mut session = Session::new();
        assert!(session.mark_absent(Modality::Camera));
        assert!(!session.mark_absent(Modality::Camera));
        assert!(session.mark_absent(Modality::SpeechSynthesis));

        session.reset();
        assert!(session.absent().is_empty());
        assert!(session.mark_absent(Modality::Camera));
    }

    #[test]
    fn reset_restores_fresh_session() {
        let mut session = Session::new();
        session.stage = Stage::Questionnaire;
        session.questionnaire.select(3);
        session.interview.submit("hello");
        session.checks.set(CheckedDevice::Camera, CheckStatus::Working);

        session.reset();
        assert_eq!(session.stage, Stage::Landing);
        assert_eq!(session.questionnaire.answers(), &[UNANSWERED; PHQ_ITEMS]);
        assert!(session.interview.transcript().is_empty());
        assert_eq!(session.checks, DeviceChecks::default());
    }
}
