//! Speech in and out.
//!
//! * [`SpeechOutput`] speaks interview prompts through an optional
//!   [`SpeechSynthesizer`], one utterance at a time.
//! * [`SpeechInput`] runs recognition and a raw recorder behind a single
//!   recording toggle.
//!
//! Both degrade to "absent" when the platform offers no capability.

pub mod input;
pub mod output;

use thiserror::Error;

// ---------------------------------------------------------------------------
// SpeechError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SpeechError {
    /// The platform has no such capability.  The feature is disabled for the
    /// rest of the session.
    #[error("{0} is not available on this platform")]
    CapabilityUnavailable(&'static str),

    #[error("speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("speech recognition failed: {0}")]
    Recognition(String),

    #[error("audio recorder failed: {0}")]
    Recorder(String),
}

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use input::{
    format_elapsed, RecognitionEngine, RecognitionErrorKind, RecognitionEvent,
    RecognitionRequest, Recording, SpeechInput,
};
pub use output::{
    clean_for_speech, select_voice, SpeechDone, SpeechOutcome, SpeechOutput, SpeechSynthesizer,
    Utterance, Voice,
};
