//! The assessment session: stages, collected data and the orchestrator.
//!
//! # Architecture
//!
//! ```text
//! user actions ──▶ SessionController ──SessionEvent──▶ presentation layer
//!                    │   │   │    │
//!                    │   │   │    └─▶ ScoringService / SentimentService
//!                    │   │   └─▶ SpeechInput (recognition + recording)
//!                    │   └─▶ SpeechOutput (prompts, voice test)
//!                    └─▶ SensorManager (camera, mic test, expression sampler)
//! ```
//!
//! [`Session`] holds only data; every side effect goes through the
//! controller, which is the single place that knows the stage order.

pub mod content;
pub mod controller;
pub mod stage;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use content::{
    PhqOption, ASSISTANT_NAME, CLOSING_MESSAGE, CLOSING_SPOKEN, INTERVIEW_PROMPTS,
    INTERVIEW_TOPICS, N_PROMPTS, PHQ_OPTIONS, PHQ_QUESTIONS, VOICE_TEST_LINE,
};
pub use controller::{Platform, SessionController, SessionError, SessionEvent};
pub use stage::Stage;
pub use state::{
    CheckStatus, CheckedDevice, DeviceChecks, Interview, Modality, Navigation, Questionnaire,
    Session, TopicProgress, UNANSWERED,
};
