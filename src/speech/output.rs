//! Spoken prompts.
//!
//! [`SpeechOutput`] wraps an optional platform [`SpeechSynthesizer`].  At
//! most one utterance is in flight: starting a new one cancels the current
//! one (last write wins).  Without a synthesizer every call completes
//! immediately so callers waiting on [`SpeechDone`] never block.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use super::SpeechError;
use crate::config::SpeechConfig;

// ---------------------------------------------------------------------------
// Synthesizer boundary
// ---------------------------------------------------------------------------

/// A voice offered by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    pub name: String,
    /// BCP-47 tag, e.g. `"en-GB"`.
    pub language: String,
}

/// Fully prepared request for the synthesizer.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub voice: Option<Voice>,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

/// Platform text-to-speech capability.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    fn voices(&self) -> Vec<Voice>;

    /// Resolves when playback finishes or fails.
    async fn speak(&self, utterance: Utterance) -> Result<(), SpeechError>;

    /// Abort whatever is currently playing.  Must be safe to call when idle.
    fn cancel(&self);
}

// ---------------------------------------------------------------------------
// Text preparation
// ---------------------------------------------------------------------------

/// `**bold**` prompt markup.
static EMPHASIS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("valid emphasis regex"));

/// Strip `**emphasis**` markers and turn line breaks into sentence pauses.
///
/// ```rust
/// use mindscan::speech::clean_for_speech;
///
/// assert_eq!(
///     clean_for_speech("**How are you?**\nTake your time."),
///     "How are you?. Take your time."
/// );
/// ```
pub fn clean_for_speech(text: &str) -> String {
    let stripped = EMPHASIS.replace_all(text, "$1");
    stripped.replace('\n', ". ")
}

/// First voice whose name contains a `priority` entry (in priority order),
/// else the first voice whose language shares the primary subtag of
/// `language`.
pub fn select_voice(voices: &[Voice], priority: &[String], language: &str) -> Option<Voice> {
    for wanted in priority {
        if let Some(voice) = voices.iter().find(|v| v.name.contains(wanted.as_str())) {
            return Some(voice.clone());
        }
    }
    let primary = language.split('-').next().unwrap_or(language);
    voices
        .iter()
        .find(|v| v.language.starts_with(primary))
        .cloned()
}

// ---------------------------------------------------------------------------
// SpeechOutput
// ---------------------------------------------------------------------------

/// How an utterance ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechOutcome {
    Finished,
    Cancelled,
}

/// Completion signal for one [`SpeechOutput::speak`] call.
#[must_use = "dropping SpeechDone does not cancel speech; call wait() to sequence on it"]
pub struct SpeechDone(oneshot::Receiver<SpeechOutcome>);

impl SpeechDone {
    /// Wait for the utterance to finish or be cancelled.
    pub async fn wait(self) -> SpeechOutcome {
        self.0.await.unwrap_or(SpeechOutcome::Cancelled)
    }
}

pub struct SpeechOutput {
    synth: Option<Arc<dyn SpeechSynthesizer>>,
    config: SpeechConfig,
    speaking: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
    current: Mutex<Option<CancellationToken>>,
}

impl SpeechOutput {
    pub fn new(synth: Option<Arc<dyn SpeechSynthesizer>>, config: SpeechConfig) -> Self {
        if synth.is_none() {
            log::info!("speech: no synthesizer available, prompts will be silent");
        }
        Self {
            synth,
            config,
            speaking: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
            current: Mutex::new(None),
        }
    }

    pub fn is_available(&self) -> bool {
        self.synth.is_some()
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }

    /// Speak `text`, cancelling anything already playing.
    pub fn speak(&self, text: &str) -> SpeechDone {
        let (tx, rx) = oneshot::channel();
        let Some(synth) = self.synth.clone() else {
            let _ = tx.send(SpeechOutcome::Finished);
            return SpeechDone(rx);
        };

        self.cancel();

        let utterance = Utterance {
            text: clean_for_speech(text),
            voice: select_voice(
                &synth.voices(),
                &self.config.voice_priority,
                &self.config.language,
            ),
            rate: self.config.rate,
            pitch: self.config.pitch,
            volume: self.config.volume,
        };

        let token = CancellationToken::new();
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.speaking.store(true, Ordering::SeqCst);

        let speaking = Arc::clone(&self.speaking);
        let current_generation = Arc::clone(&self.generation);
        tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = token.cancelled() => SpeechOutcome::Cancelled,
                result = synth.speak(utterance) => {
                    if let Err(e) = result {
                        log::warn!("speech: {e}");
                    }
                    SpeechOutcome::Finished
                }
            };
            if current_generation.load(Ordering::SeqCst) == generation {
                speaking.store(false, Ordering::SeqCst);
            }
            let _ = tx.send(outcome);
        });

        SpeechDone(rx)
    }

    /// Stop the current utterance, if any.  Idempotent.
    pub fn cancel(&self) {
        let token = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(token) = token {
            token.cancel();
            if let Some(synth) = &self.synth {
                synth.cancel();
            }
        }
        self.speaking.store(false, Ordering::SeqCst);
    }
}

impl Drop for SpeechOutput {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::mock::RecordingSynthesizer;
    use super::*;

    fn voice(name: &str, language: &str) -> Voice {
        Voice {
            name: name.into(),
            language: language.into(),
        }
    }

    #[test]
    fn clean_strips_emphasis_and_line_breaks() {
        assert_eq!(
            clean_for_speech("Hello!\n\n**How have you been sleeping?**"),
            "Hello!. . How have you been sleeping?"
        );
        assert_eq!(clean_for_speech("plain"), "plain");
    }

    #[test]
    fn emphasis_pattern_is_shared_across_prompts() {
        for prompt in crate::session::INTERVIEW_PROMPTS {
            assert!(!clean_for_speech(prompt).contains("**"));
        }
        assert!(Lazy::get(&EMPHASIS).is_some());
        assert_eq!(clean_for_speech("**a** and **b**"), "a and b");
    }

    #[test]
    fn voice_selection_follows_priority_then_language() {
        let voices = vec![
            voice("Alex", "en-US"),
            voice("Google UK English Female", "en-GB"),
            voice("Thomas", "fr-FR"),
        ];
        let priority = SpeechConfig::default().voice_priority;
        assert_eq!(
            select_voice(&voices, &priority, "en-US").unwrap().name,
            "Google UK English Female"
        );

        let fallback = vec![voice("Thomas", "fr-FR"), voice("Daniel", "en-GB")];
        assert_eq!(
            select_voice(&fallback, &priority, "en-US").unwrap().name,
            "Daniel"
        );
        assert!(select_voice(&[voice("Thomas", "fr-FR")], &priority, "en-US").is_none());
    }

    #[tokio::test]
    async fn missing_synthesizer_completes_immediately() {
        let output = SpeechOutput::new(None, SpeechConfig::default());
        assert!(!output.is_available());
        assert_eq!(output.speak("hello").wait().await, SpeechOutcome::Finished);
        assert!(!output.is_speaking());
    }

    #[tokio::test(start_paused = true)]
    async fn speak_prepares_utterance_and_tracks_state() {
        let synth = RecordingSynthesizer::new(Duration::from_secs(2));
        let output = SpeechOutput::new(Some(synth.clone()), SpeechConfig::default());

        let done = output.speak("**Hi** there");
        assert!(output.is_speaking());
        assert_eq!(done.wait().await, SpeechOutcome::Finished);
        assert!(!output.is_speaking());

        let utterance = synth.last().unwrap();
        assert_eq!(utterance.text, "Hi there");
        assert_eq!(utterance.voice.unwrap().name, "Samantha");
        assert!((utterance.rate - 0.9).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn new_utterance_cancels_the_previous_one() {
        let synth = RecordingSynthesizer::new(Duration::from_secs(5));
        let output = SpeechOutput::new(Some(synth.clone()), SpeechConfig::default());

        let first = output.speak("one");
        tokio::time::sleep(Duration::from_millis(100)).await;
        let second = output.speak("two");

        assert_eq!(first.wait().await, SpeechOutcome::Cancelled);
        // The cancelled task must not clear the flag of the live utterance.
        assert!(output.is_speaking());
        assert_eq!(second.wait().await, SpeechOutcome::Finished);
        assert_eq!(synth.spoken(), vec!["one", "two"]);
        assert_eq!(synth.cancels(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_is_idempotent() {
        let synth = RecordingSynthesizer::new(Duration::from_secs(5));
        let output = SpeechOutput::new(Some(synth.clone()), SpeechConfig::default());
        output.cancel();

        let done = output.speak("one");
        output.cancel();
        output.cancel();

        assert_eq!(done.wait().await, SpeechOutcome::Cancelled);
        assert!(!output.is_speaking());
        assert_eq!(synth.cancels(), 1);
    }
}
