//! Session orchestrator.
//!
//! [`SessionController`] owns the [`Session`] data together with every
//! subsystem that has a lifecycle: the [`SensorManager`] (camera, setup
//! microphone, expression sampler), [`SpeechOutput`] and [`SpeechInput`].
//! User actions arrive as method calls; everything the presentation layer
//! needs to know is pushed as a [`SessionEvent`] on an unbounded channel.
//!
//! ```text
//! begin()            Landing ─▶ Setup
//! start_interview()  Setup ─▶ Interview       camera transferred or acquired, sampler started
//! submit_utterance() ... 8th answer ─▶ Questionnaire (automatic, sampler keeps running)
//! advance() on last  Questionnaire ─▶ submit: teardown, scoring call ─▶ Results
//! reset()            any ─▶ Landing           teardown, all data cleared
//! ```
//!
//! Teardown order is fixed: cancel speech, stop timers and recording,
//! release device handles.  Teardown never fails.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;

use super::content::{
    CLOSING_MESSAGE, CLOSING_SPOKEN, INTERVIEW_PROMPTS, N_PROMPTS, VOICE_TEST_LINE,
};
use super::stage::Stage;
use super::state::{CheckStatus, CheckedDevice, Modality, Navigation, Session};
use crate::config::AppConfig;
use crate::expression::{ExpressionDetector, LiveExpression};
use crate::scoring::{
    build_scoring_request, IncompleteQuestionnaire, ResultView, ScoringError, ScoringService,
    Sentiment, SentimentService,
};
use crate::sensor::{CameraOwner, MediaDevices, SensorManager};
use crate::speech::{
    RecognitionEngine, Recording, SpeechError, SpeechInput, SpeechOutput, SpeechSynthesizer,
};

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

/// External capabilities a session runs against.  Optional entries may be
/// missing on a given host; the matching modality is then reported absent.
pub struct Platform {
    pub devices: Arc<dyn MediaDevices>,
    pub detector: Option<Arc<dyn ExpressionDetector>>,
    pub synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    pub recognizer: Option<Arc<dyn RecognitionEngine>>,
    pub scoring: Arc<dyn ScoringService>,
    pub sentiment: Option<Arc<dyn SentimentService>>,
}

// ---------------------------------------------------------------------------
// Events and errors
// ---------------------------------------------------------------------------

/// State-change notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StageChanged(Stage),
    CheckUpdated {
        device: CheckedDevice,
        status: CheckStatus,
    },
    /// Shown once per modality until the next reset.
    ModalityUnavailable {
        modality: Modality,
        reason: String,
    },
    AssistantTyping,
    AssistantMessage(String),
    UserMessage(String),
    /// Prompt index after an answer; drives the topic progress list.
    InterviewProgress(usize),
    InputEnabled(bool),
    RecordingChanged(bool),
    PlaybackAvailable(bool),
    QuestionShown {
        index: usize,
        answer: Option<u8>,
    },
    Submitting,
    /// Retryable; all collected data is kept.
    SubmissionFailed(String),
    ResultsReady(ResultView),
    SentimentReady(Sentiment),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("action not available in {actual} (needs {expected})")]
    InvalidStage { expected: Stage, actual: Stage },

    #[error(transparent)]
    Incomplete(#[from] IncompleteQuestionnaire),

    #[error("scoring failed: {0}")]
    Network(#[from] ScoringError),

    #[error(transparent)]
    Speech(#[from] SpeechError),
}

// ---------------------------------------------------------------------------
// SessionController
// ---------------------------------------------------------------------------

pub struct SessionController {
    config: AppConfig,
    session: Session,
    sensors: SensorManager,
    speech_out: SpeechOutput,
    speech_in: SpeechInput,
    detector: Option<Arc<dyn ExpressionDetector>>,
    scoring: Arc<dyn ScoringService>,
    sentiment: Option<Arc<dyn SentimentService>>,
    result: Option<ResultView>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionController {
    pub fn new(
        config: AppConfig,
        platform: Platform,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let controller = Self {
            sensors: SensorManager::new(platform.devices, config.speech.level_bars),
            speech_out: SpeechOutput::new(platform.synthesizer, config.speech.clone()),
            speech_in: SpeechInput::new(platform.recognizer, config.speech.clone()),
            detector: platform.detector,
            scoring: platform.scoring,
            sentiment: platform.sentiment,
            session: Session::new(),
            result: None,
            config,
            events,
        };
        (controller, rx)
    }

    // -----------------------------------------------------------------------
    // Read access
    // -----------------------------------------------------------------------

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn stage(&self) -> Stage {
        self.session.stage
    }

    pub fn sensors(&self) -> &SensorManager {
        &self.sensors
    }

    pub fn speech_input(&self) -> &SpeechInput {
        &self.speech_in
    }

    pub fn is_speaking(&self) -> bool {
        self.speech_out.is_speaking()
    }

    pub fn live_expression(&self) -> Option<LiveExpression> {
        self.sensors.sampler().live_expression()
    }

    pub fn playback(&self) -> Option<Recording> {
        self.speech_in.last_recording()
    }

    pub fn result_view(&self) -> Option<&ResultView> {
        self.result.as_ref()
    }

    /// Live device handles across all subsystems.
    pub fn live_handles(&self) -> usize {
        self.sensors.live_handles() + self.speech_in.live_handles()
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn emit(&self, event: SessionEvent) {
        // The presentation layer may have gone away; the session carries on.
        let _ = self.events.send(event);
    }

    fn require(&self, expected: Stage) -> Result<(), SessionError> {
        let actual = self.session.stage;
        if actual == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidStage { expected, actual })
        }
    }

    fn set_stage(&mut self, stage: Stage) {
        log::info!("session: {} -> {}", self.session.stage, stage);
        self.session.stage = stage;
        self.emit(SessionEvent::StageChanged(stage));
    }

    fn set_check(&mut self, device: CheckedDevice, status: CheckStatus) {
        self.session.checks.set(device, status);
        self.emit(SessionEvent::CheckUpdated { device, status });
    }

    fn report_absent(&mut self, modality: Modality, reason: impl ToString) {
        if self.session.mark_absent(modality) {
            let reason = reason.to_string();
            log::warn!("session: {modality} unavailable: {reason}");
            self.emit(SessionEvent::ModalityUnavailable { modality, reason });
        }
    }

    fn show_question(&self) {
        let q = &self.session.questionnaire;
        self.emit(SessionEvent::QuestionShown {
            index: q.index(),
            answer: q.current(),
        });
    }

    // -----------------------------------------------------------------------
    // Landing / Setup
    // -----------------------------------------------------------------------

    /// Landing ─▶ Setup.  Device indicators start as not checked.
    pub fn begin(&mut self) -> Result<(), SessionError> {
        self.require(Stage::Landing)?;
        self.set_stage(Stage::Setup);
        for device in [CheckedDevice::Camera, CheckedDevice::Microphone, CheckedDevice::Voice] {
            self.set_check(device, CheckStatus::NotChecked);
        }
        Ok(())
    }

    /// Enable the camera preview, or disable and release it.
    pub async fn toggle_setup_camera(&mut self) -> Result<CheckStatus, SessionError> {
        self.require(Stage::Setup)?;
        let status = if self.sensors.has_camera() {
            self.sensors.release_camera();
            CheckStatus::NotChecked
        } else {
            match self.sensors.acquire_camera(CameraOwner::Setup).await {
                Ok(_) => CheckStatus::Working,
                Err(e) => {
                    self.report_absent(Modality::Camera, &e);
                    CheckStatus::Failed
                }
            }
        };
        self.set_check(CheckedDevice::Camera, status);
        Ok(status)
    }

    /// Start or stop the microphone level test.
    pub async fn toggle_setup_microphone(&mut self) -> Result<CheckStatus, SessionError> {
        self.require(Stage::Setup)?;
        let status = if self.sensors.microphone_test_running() {
            self.sensors.stop_microphone_test();
            CheckStatus::NotChecked
        } else {
            match self.sensors.start_microphone_test().await {
                Ok(()) => CheckStatus::Working,
                Err(e) => {
                    self.report_absent(Modality::Microphone, &e);
                    CheckStatus::Failed
                }
            }
        };
        self.set_check(CheckedDevice::Microphone, status);
        Ok(status)
    }

    /// Current bars of the setup microphone test.
    pub fn setup_microphone_levels(&self) -> Vec<f32> {
        self.sensors.microphone_levels()
    }

    /// Speak the voice-test line and wait for it to finish.
    pub async fn test_voice(&mut self) -> Result<CheckStatus, SessionError> {
        self.require(Stage::Setup)?;
        if !self.speech_out.is_available() {
            self.report_absent(
                Modality::SpeechSynthesis,
                SpeechError::CapabilityUnavailable("speech synthesis"),
            );
        }
        self.speech_out.speak(VOICE_TEST_LINE).wait().await;
        self.set_check(CheckedDevice::Voice, CheckStatus::Played);
        Ok(CheckStatus::Played)
    }

    // -----------------------------------------------------------------------
    // Interview
    // -----------------------------------------------------------------------

    /// Setup ─▶ Interview, then ask the first prompt after the opening delay.
    pub async fn start_interview(&mut self) -> Result<(), SessionError> {
        self.require(Stage::Setup)?;
        self.sensors.stop_microphone_test();

        if !self.sensors.transfer_camera(CameraOwner::Interview) {
            if let Err(e) = self.sensors.acquire_camera(CameraOwner::Interview).await {
                self.report_absent(Modality::Camera, &e);
            }
        }
        if self.sensors.has_camera() {
            match self.detector.clone() {
                Some(detector) => {
                    self.sensors.start_sampling(detector, &self.config.sampler);
                }
                None => self.report_absent(
                    Modality::ExpressionDetection,
                    "no expression detector on this platform",
                ),
            }
        }

        self.session.interview.reset();
        self.speech_in.clear_transcript();
        self.speech_in.clear_playback();
        self.set_stage(Stage::Interview);
        self.emit(SessionEvent::InputEnabled(true));
        self.emit(SessionEvent::PlaybackAvailable(false));
        self.emit(SessionEvent::InterviewProgress(0));

        tokio::time::sleep(self.config.session.opening_delay()).await;
        self.ask_prompt(0).await;
        Ok(())
    }

    async fn ask_prompt(&mut self, index: usize) {
        let Some(&prompt) = INTERVIEW_PROMPTS.get(index) else {
            return;
        };
        self.emit(SessionEvent::AssistantTyping);
        tokio::time::sleep(self.config.session.typing_delay()).await;
        self.emit(SessionEvent::AssistantMessage(prompt.to_string()));
        drop(self.speech_out.speak(prompt));
    }

    /// Record one answer.  Blank text is ignored and returns `Ok(false)`.
    ///
    /// After the think delay the next prompt is asked, or, after the last
    /// one, the closing message is shown and the session moves on to the
    /// questionnaire by itself.
    pub async fn submit_utterance(&mut self, text: &str) -> Result<bool, SessionError> {
        self.require(Stage::Interview)?;
        let Some(next) = self.session.interview.submit(text) else {
            return Ok(false);
        };

        if self.speech_in.is_recording() {
            self.speech_in.stop();
            self.emit(SessionEvent::RecordingChanged(false));
        }
        self.speech_in.clear_transcript();
        self.speech_in.clear_playback();
        self.emit(SessionEvent::UserMessage(text.trim().to_string()));
        self.emit(SessionEvent::PlaybackAvailable(false));
        self.emit(SessionEvent::InterviewProgress(next));

        tokio::time::sleep(self.config.session.think_delay()).await;
        if next < N_PROMPTS {
            self.ask_prompt(next).await;
        } else {
            self.finish_interview().await;
        }
        Ok(true)
    }

    async fn finish_interview(&mut self) {
        self.emit(SessionEvent::AssistantTyping);
        tokio::time::sleep(self.config.session.closing_typing_delay()).await;
        self.emit(SessionEvent::AssistantMessage(CLOSING_MESSAGE.to_string()));
        drop(self.speech_out.speak(CLOSING_SPOKEN));
        self.emit(SessionEvent::InputEnabled(false));

        tokio::time::sleep(self.config.session.closing_ack_delay()).await;
        // The sampler keeps running through the questionnaire.
        self.set_stage(Stage::Questionnaire);
        self.show_question();
    }

    /// Start or stop voice input.  Returns whether a recording is now active.
    pub async fn toggle_recording(&mut self) -> Result<bool, SessionError> {
        self.require(Stage::Interview)?;
        if self.speech_in.is_recording() {
            self.speech_in.stop();
            self.emit(SessionEvent::RecordingChanged(false));
            self.emit(SessionEvent::PlaybackAvailable(
                self.speech_in.last_recording().is_some(),
            ));
            return Ok(false);
        }

        self.speech_out.cancel();
        match self.speech_in.start(&self.sensors).await {
            Ok(()) => {
                self.emit(SessionEvent::RecordingChanged(true));
                Ok(true)
            }
            Err(e) => {
                if matches!(e, SpeechError::CapabilityUnavailable(_)) {
                    self.report_absent(Modality::SpeechRecognition, &e);
                }
                Err(e.into())
            }
        }
    }

    /// Live transcript of the current or last recording, for review before
    /// sending.
    pub fn recording_transcript(&self) -> String {
        self.speech_in.transcript()
    }

    // -----------------------------------------------------------------------
    // Questionnaire
    // -----------------------------------------------------------------------

    /// Answer the current item.  Values outside `0..=3` are ignored and
    /// return `Ok(false)`.
    pub fn select_answer(&mut self, value: u8) -> Result<bool, SessionError> {
        self.require(Stage::Questionnaire)?;
        if !self.session.questionnaire.select(value) {
            log::debug!("session: answer {value} out of range, ignored");
            return Ok(false);
        }
        self.show_question();
        Ok(true)
    }

    /// Digit keys `0`-`3` select an answer while the questionnaire is shown.
    /// Returns whether the key was used.
    pub fn handle_key(&mut self, key: char) -> bool {
        if self.session.stage != Stage::Questionnaire {
            return false;
        }
        match key.to_digit(10) {
            Some(value @ 0..=3) => matches!(self.select_answer(value as u8), Ok(true)),
            _ => false,
        }
    }

    /// Next item, or submission on the last one.  Does nothing while the
    /// current item is unanswered.
    pub async fn advance(&mut self) -> Result<Navigation, SessionError> {
        self.require(Stage::Questionnaire)?;
        let navigation = self.session.questionnaire.advance();
        match navigation {
            Navigation::Moved => self.show_question(),
            Navigation::Submit => self.submit().await?,
            Navigation::Blocked | Navigation::AtStart => {}
        }
        Ok(navigation)
    }

    pub fn retreat(&mut self) -> Result<Navigation, SessionError> {
        self.require(Stage::Questionnaire)?;
        let navigation = self.session.questionnaire.retreat();
        if navigation == Navigation::Moved {
            self.show_question();
        }
        Ok(navigation)
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    /// Close visual sampling, release every device and send the collected
    /// signals for scoring.
    ///
    /// On a scoring failure the session stays in the questionnaire with all
    /// data intact; calling `submit` again retries.
    pub async fn submit(&mut self) -> Result<(), SessionError> {
        self.require(Stage::Questionnaire)?;
        if let Some(first_unanswered) = self.session.questionnaire.first_unanswered() {
            return Err(IncompleteQuestionnaire { first_unanswered }.into());
        }

        self.teardown();
        let history = self.sensors.sampler().snapshot();
        let request = build_scoring_request(&self.session, &history)?;
        log::info!(
            "session: submitting (PHQ total {}, {} utterances, {} expression samples)",
            self.session.questionnaire.total(),
            self.session.interview.transcript().len(),
            history.len()
        );
        self.emit(SessionEvent::Submitting);

        let result = match self.scoring.predict(&request).await {
            Ok(result) => result,
            Err(e) => {
                log::error!("session: scoring failed: {e}");
                self.emit(SessionEvent::SubmissionFailed(e.to_string()));
                return Err(e.into());
            }
        };

        let view = ResultView::new(&result, request.visual_data.as_ref());
        self.set_stage(Stage::Results);
        self.emit(SessionEvent::ResultsReady(view.clone()));
        self.result = Some(view);

        if self.config.scoring.fetch_sentiment {
            self.fetch_sentiment(&request.interview_text).await;
        }
        Ok(())
    }

    async fn fetch_sentiment(&mut self, text: &str) {
        let Some(service) = self.sentiment.clone() else {
            return;
        };
        match service.sentiment(text).await {
            Ok(sentiment) => {
                if let Some(view) = self.result.take() {
                    self.result = Some(view.with_sentiment(sentiment));
                }
                self.emit(SessionEvent::SentimentReady(sentiment));
            }
            Err(e) => log::warn!("session: sentiment unavailable: {e}"),
        }
    }

    /// Cancel speech, stop the sampler and any recording, release every
    /// device handle.  Idempotent; collected data is untouched.
    fn teardown(&mut self) {
        self.speech_out.cancel();
        if self.speech_in.is_recording() {
            self.speech_in.stop();
            self.emit(SessionEvent::RecordingChanged(false));
        }
        self.sensors.stop_sampling();
        self.sensors.release_all();
    }

    // -----------------------------------------------------------------------
    // Reset
    // -----------------------------------------------------------------------

    /// Back to Landing from any stage with all devices released and all
    /// collected data cleared.
    pub fn reset(&mut self) {
        self.teardown();
        self.speech_in.reset();
        self.sensors.sampler().clear();
        self.session.reset();
        self.result = None;
        self.set_stage(Stage::Landing);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
