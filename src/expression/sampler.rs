//! Periodic facial-expression sampling.
//!
//! [`ExpressionSampler`] owns one repeating tokio task.  Every tick it grabs
//! the current camera frame, asks the [`ExpressionDetector`] for a
//! classification and records the outcome in the shared
//! [`ExpressionHistory`]:
//!
//! ```text
//! tick ─▶ feed not playable ─▶ skip (nothing counted)
//!      ─▶ detector: face     ─▶ attempts+1, detections+1, push sample
//!      ─▶ detector: no face  ─▶ attempts+1
//!      ─▶ detector: error    ─▶ attempts+1 (error swallowed)
//! ```
//!
//! [`stop`](ExpressionSampler::stop) cancels the task and then takes the
//! history lock once.  Any tick that was mid-append finishes before `stop`
//! returns; any tick that resolves afterwards sees the cancelled token under
//! the same lock and discards its result.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::detector::ExpressionDetector;
use super::sample::{Emotion, ExpressionHistory};
use crate::config::SamplerConfig;
use crate::sensor::FrameSource;

/// Thread-safe handle to the session's [`ExpressionHistory`].
pub type SharedHistory = Arc<Mutex<ExpressionHistory>>;

/// Dominant emotion of the most recent detection, for live display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveExpression {
    pub emotion: Emotion,
    pub score: f64,
}

impl LiveExpression {
    /// e.g. `"😢 sad (72%)"`.
    pub fn label(&self) -> String {
        format!(
            "{} {} ({:.0}%)",
            self.emotion.emoji(),
            self.emotion,
            self.score * 100.0
        )
    }
}

struct SamplerTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Cancellable repeating sampler bound to one camera feed.
pub struct ExpressionSampler {
    history: SharedHistory,
    live: Arc<Mutex<Option<LiveExpression>>>,
    task: Option<SamplerTask>,
}

impl Default for ExpressionSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpressionSampler {
    pub fn new() -> Self {
        Self {
            history: Arc::new(Mutex::new(ExpressionHistory::new())),
            live: Arc::new(Mutex::new(None)),
            task: None,
        }
    }

    pub fn history(&self) -> SharedHistory {
        Arc::clone(&self.history)
    }

    /// Copy of the history as it stands right now.
    pub fn snapshot(&self) -> ExpressionHistory {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn live_expression(&self) -> Option<LiveExpression> {
        *self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `true` while the sampling task is alive.
    pub fn is_running(&self) -> bool {
        self.task
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Start sampling `frames` every `config.interval()`.  The first tick
    /// fires one full interval after this call.
    ///
    /// Returns `false` (and does nothing) when already running.
    pub fn start(
        &mut self,
        frames: Arc<dyn FrameSource>,
        detector: Arc<dyn ExpressionDetector>,
        config: &SamplerConfig,
    ) -> bool {
        if self.is_running() {
            log::debug!("sampler: start ignored, already running");
            return false;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_sampler(
            frames,
            detector,
            Arc::clone(&self.history),
            Arc::clone(&self.live),
            config.interval(),
            config.min_confidence,
            cancel.clone(),
        ));
        self.task = Some(SamplerTask { cancel, handle });
        log::info!(
            "sampler: started ({} ms interval)",
            config.interval().as_millis()
        );
        true
    }

    /// Stop sampling.  Safe to call when never started.  No sample is
    /// appended after this returns.
    pub fn stop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        task.cancel.cancel();
        task.handle.abort();
        // Barrier with an in-flight append.
        drop(self.history.lock().unwrap_or_else(PoisonError::into_inner));

        let history = self.snapshot();
        log::info!(
            "sampler: stopped after {} attempts, {} detections",
            history.attempts(),
            history.detections()
        );
    }

    /// Drop every sample, reset both counters and the live display.
    pub fn clear(&self) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        *self.live.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl Drop for ExpressionSampler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_sampler(
    frames: Arc<dyn FrameSource>,
    detector: Arc<dyn ExpressionDetector>,
    history: SharedHistory,
    live: Arc<Mutex<Option<LiveExpression>>>,
    interval: Duration,
    min_confidence: f32,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(frame) = frames.current_frame() else {
            log::trace!("sampler: feed not playable, tick skipped");
            continue;
        };

        let outcome = tokio::select! {
            _ = cancel.cancelled() => break,
            outcome = detector.detect(&frame, min_confidence) => outcome,
        };

        let mut hist = history.lock().unwrap_or_else(PoisonError::into_inner);
        if cancel.is_cancelled() {
            break;
        }
        match outcome {
            Ok(Some(detection)) => {
                hist.record_detection(detection.expressions);
                let (emotion, score) = detection.expressions.dominant();
                *live.lock().unwrap_or_else(PoisonError::into_inner) =
                    Some(LiveExpression { emotion, score });
            }
            Ok(None) => hist.record_miss(),
            Err(e) => {
                log::debug!("sampler: {e}");
                hist.record_miss();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
