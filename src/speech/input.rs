//! Voice answers: live recognition plus a raw recording for playback.
//!
//! One toggle drives two independently failing consumers:
//!
//! ```text
//! start ─▶ engine.start()          (fails fast: CapabilityUnavailable)
//!       ─▶ pump task               final segments accumulate, interim overwrites
//!       ─▶ mic #1 ─▶ level meter   (visualiser)
//!       ─▶ mic #2 ─▶ capture task  (playback buffer)
//!
//! stop / engine end / fatal engine error ─▶ finish: cancel tasks, release
//!                                          mics, publish Recording
//! ```
//!
//! Microphone failures only lose the visualiser or the playback buffer; the
//! transcript keeps working.  The transcript is never submitted
//! automatically.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::SpeechError;
use crate::config::SpeechConfig;
use crate::sensor::{AudioChunk, LevelMeter, SensorHandle, SensorManager};

// ---------------------------------------------------------------------------
// Recognition boundary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionErrorKind {
    /// Silence timeout.  Not fatal to a recording.
    NoSpeech,
    Aborted,
    AudioCapture,
    NotAllowed,
    Network,
    Other(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionEvent {
    Result { text: String, is_final: bool },
    Error(RecognitionErrorKind),
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionRequest {
    pub language: String,
    pub continuous: bool,
    pub interim_results: bool,
    pub max_alternatives: u8,
}

/// Platform speech-recognition capability.
#[async_trait]
pub trait RecognitionEngine: Send + Sync {
    /// Begin a recognition session; events arrive on the returned channel
    /// until [`RecognitionEvent::End`] or the channel closes.
    async fn start(
        &self,
        request: RecognitionRequest,
    ) -> Result<mpsc::Receiver<RecognitionEvent>, SpeechError>;

    fn stop(&self);
}

// ---------------------------------------------------------------------------
// Recording
// ---------------------------------------------------------------------------

/// Raw audio of one finished recording, kept for local playback only.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    /// Playback handle; a new recording always gets a new id.
    pub id: u64,
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Recording {
    pub fn duration(&self) -> Duration {
        let frames_per_sec = self.sample_rate as f64 * self.channels.max(1) as f64;
        if frames_per_sec == 0.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / frames_per_sec)
    }
}

/// `"MM:SS"` for the recording timer.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

// ---------------------------------------------------------------------------
// SpeechInput
// ---------------------------------------------------------------------------

#[derive(Default)]
struct InputState {
    recording: bool,
    /// Bumped on every start so late events from an older run are ignored.
    generation: u64,
    final_text: String,
    interim: String,
    started_at: Option<Instant>,
    captured: Vec<f32>,
    sample_rate: u32,
    channels: u16,
    handles: Vec<SensorHandle>,
    cancel: Option<CancellationToken>,
    last_recording: Option<Recording>,
    next_recording_id: u64,
}

type SharedInput = Arc<Mutex<InputState>>;

fn lock(state: &SharedInput) -> std::sync::MutexGuard<'_, InputState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct SpeechInput {
    engine: Option<Arc<dyn RecognitionEngine>>,
    config: SpeechConfig,
    state: SharedInput,
    meter: LevelMeter,
}

impl SpeechInput {
    pub fn new(engine: Option<Arc<dyn RecognitionEngine>>, config: SpeechConfig) -> Self {
        let meter = LevelMeter::new(config.level_bars);
        Self {
            engine,
            config,
            state: Arc::new(Mutex::new(InputState::default())),
            meter,
        }
    }

    pub fn is_available(&self) -> bool {
        self.engine.is_some()
    }

    pub fn is_recording(&self) -> bool {
        lock(&self.state).recording
    }

    /// Start recognition and recording together.  No-op while recording.
    pub async fn start(&self, sensors: &SensorManager) -> Result<(), SpeechError> {
        if self.is_recording() {
            return Ok(());
        }
        let Some(engine) = self.engine.clone() else {
            return Err(SpeechError::CapabilityUnavailable("speech recognition"));
        };

        let events = engine
            .start(RecognitionRequest {
                language: self.config.language.clone(),
                continuous: true,
                interim_results: true,
                max_alternatives: 3,
            })
            .await?;

        let cancel = CancellationToken::new();
        let generation = {
            let mut state = lock(&self.state);
            state.generation += 1;
            state.recording = true;
            state.final_text.clear();
            state.interim.clear();
            state.captured.clear();
            state.started_at = Some(Instant::now());
            state.cancel = Some(cancel.clone());
            state.generation
        };
        log::info!("speech: recording #{generation} started");

        tokio::spawn(pump_events(
            events,
            Arc::clone(&self.state),
            Arc::clone(&engine),
            generation,
            cancel.clone(),
        ));

        match sensors.acquire_microphone_for_recognition().await {
            Ok(mut handle) => {
                if let Some(audio) = handle.take_audio() {
                    self.meter.spawn_feed(audio, cancel.clone());
                }
                self.adopt(handle, generation);
            }
            Err(e) => log::warn!("speech: visualiser disabled: {e}"),
        }

        match sensors.acquire_microphone_for_recording().await {
            Ok(mut handle) => {
                if let Some(audio) = handle.take_audio() {
                    let max_secs = self.config.max_recording_secs;
                    tokio::spawn(capture_audio(
                        audio,
                        Arc::clone(&self.state),
                        generation,
                        max_secs,
                        cancel.clone(),
                    ));
                }
                self.adopt(handle, generation);
            }
            Err(e) => log::warn!("speech: playback recording disabled: {e}"),
        }

        Ok(())
    }

    /// Keep `handle` for the current run, or release it right away when the
    /// run already ended while the grant was pending.
    fn adopt(&self, handle: SensorHandle, generation: u64) {
        let mut state = lock(&self.state);
        if state.recording && state.generation == generation {
            state.handles.push(handle);
        } else {
            drop(state);
            drop(handle);
        }
    }

    /// Stop both consumers.  Idempotent.
    pub fn stop(&self) {
        if !self.is_recording() {
            return;
        }
        if let Some(engine) = &self.engine {
            engine.stop();
        }
        let generation = lock(&self.state).generation;
        finish(&self.state, generation);
    }

    /// Final segments followed by the current interim segment.
    pub fn transcript(&self) -> String {
        let state = lock(&self.state);
        format!("{}{}", state.final_text, state.interim)
    }

    pub fn clear_transcript(&self) {
        let mut state = lock(&self.state);
        state.final_text.clear();
        state.interim.clear();
    }

    /// Time since the current recording started; zero when idle.
    pub fn elapsed(&self) -> Duration {
        lock(&self.state)
            .started_at
            .map(|t| t.elapsed())
            .unwrap_or_default()
    }

    pub fn timer_label(&self) -> String {
        format_elapsed(self.elapsed())
    }

    pub fn levels(&self) -> Vec<f32> {
        self.meter.snapshot()
    }

    /// The last finished recording offered for playback.
    pub fn last_recording(&self) -> Option<Recording> {
        lock(&self.state).last_recording.clone()
    }

    /// Withdraw the playback offer.
    pub fn clear_playback(&self) {
        lock(&self.state).last_recording = None;
    }

    pub fn live_handles(&self) -> usize {
        lock(&self.state)
            .handles
            .iter()
            .filter(|h| h.is_live())
            .count()
    }

    /// Stop any recording and forget transcript and playback.
    pub fn reset(&self) {
        self.stop();
        self.clear_transcript();
        self.clear_playback();
    }
}

impl Drop for SpeechInput {
    fn drop(&mut self) {
        self.stop();
    }
}

/// End run `generation`: cancel its tasks, release its microphones and
/// publish the captured audio as the new playback recording.
fn finish(state: &SharedInput, generation: u64) {
    let handles = {
        let mut s = lock(state);
        if !s.recording || s.generation != generation {
            return;
        }
        s.recording = false;
        s.started_at = None;
        if let Some(cancel) = s.cancel.take() {
            cancel.cancel();
        }
        let interim = std::mem::take(&mut s.interim);
        s.final_text.push_str(&interim);

        if !s.captured.is_empty() {
            s.next_recording_id += 1;
            let recording = Recording {
                id: s.next_recording_id,
                samples: std::mem::take(&mut s.captured),
                sample_rate: s.sample_rate,
                channels: s.channels,
            };
            log::debug!(
                "speech: recording #{} kept for playback ({:.1}s)",
                recording.id,
                recording.duration().as_secs_f32()
            );
            s.last_recording = Some(recording);
        }
        std::mem::take(&mut s.handles)
    };

    for mut handle in handles {
        handle.release();
    }
    log::info!("speech: recording #{generation} stopped");
}

async fn pump_events(
    mut events: mpsc::Receiver<RecognitionEvent>,
    state: SharedInput,
    engine: Arc<dyn RecognitionEngine>,
    generation: u64,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => return,
            event = events.recv() => event,
        };
        match event {
            Some(RecognitionEvent::Result { text, is_final }) => {
                let mut s = lock(&state);
                if s.generation != generation || !s.recording {
                    return;
                }
                if is_final {
                    s.final_text.push_str(text.trim());
                    s.final_text.push(' ');
                    s.interim.clear();
                } else {
                    s.interim = text;
                }
            }
            Some(RecognitionEvent::Error(RecognitionErrorKind::NoSpeech)) => {
                log::debug!("speech: no speech detected, still listening");
            }
            Some(RecognitionEvent::Error(kind)) => {
                log::warn!("speech: recognition error {kind:?}, stopping recording");
                engine.stop();
                finish(&state, generation);
                return;
            }
            Some(RecognitionEvent::End) | None => {
                finish(&state, generation);
                return;
            }
        }
    }
}

async fn capture_audio(
    mut audio: mpsc::Receiver<AudioChunk>,
    state: SharedInput,
    generation: u64,
    max_secs: u32,
    cancel: CancellationToken,
) {
    loop {
        let chunk = tokio::select! {
            _ = cancel.cancelled() => return,
            chunk = audio.recv() => chunk,
        };
        let Some(chunk) = chunk else { return };

        let mut s = lock(&state);
        if s.generation != generation || !s.recording {
            return;
        }
        s.sample_rate = chunk.sample_rate;
        s.channels = chunk.channels;
        let cap = max_secs as usize * chunk.sample_rate as usize * chunk.channels.max(1) as usize;
        let room = cap.saturating_sub(s.captured.len());
        let take = room.min(chunk.samples.len());
        s.captured.extend_from_slice(&chunk.samples[..take]);
    }
}

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
