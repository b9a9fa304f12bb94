//! Live microphone level meter.
//!
//! Drives the bar visualiser shown while the setup microphone test or an
//! interview recording is running.  A feed task drains [`AudioChunk`]s from
//! a microphone handle and replaces the latest snapshot with the levels of
//! the newest chunk, on a decibel scale from -60 dB (empty) to full scale.
//!
//! ```rust
//! use mindscan::sensor::compute_levels;
//!
//! let audio: Vec<f32> = (0..1_600).map(|i| (i as f32 * 0.01).sin() * 0.5).collect();
//! let bars = compute_levels(&audio, 16);
//! assert_eq!(bars.len(), 16);
//! assert!(bars.iter().all(|&b| (0.0..=1.0).contains(&b)));
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::device::AudioChunk;

/// Quietest level shown on the meter; anything below reads as an empty bar.
const FLOOR_DB: f32 = -60.0;

/// Map an RMS amplitude onto the meter scale: `FLOOR_DB` and below is 0.0,
/// full scale is 1.0, linear in decibels in between.
fn meter_level(rms: f32) -> f32 {
    if rms <= 0.0 {
        return 0.0;
    }
    let db = 20.0 * rms.log10();
    ((db - FLOOR_DB) / -FLOOR_DB).clamp(0.0, 1.0)
}

/// Meter levels of `audio` split into `num_bars` consecutive windows.
///
/// Every bar covers `len / num_bars` samples (at least one); bars past the
/// end of short audio stay at 0.0.
pub fn compute_levels(audio: &[f32], num_bars: usize) -> Vec<f32> {
    let mut levels = vec![0.0; num_bars];
    if num_bars == 0 || audio.is_empty() {
        return levels;
    }

    let window = (audio.len() / num_bars).max(1);
    for (level, start) in levels.iter_mut().zip((0..audio.len()).step_by(window)) {
        let samples = &audio[start..(start + window).min(audio.len())];
        let energy: f32 = samples.iter().map(|s| s * s).sum();
        *level = meter_level((energy / samples.len() as f32).sqrt());
    }
    levels
}

/// Shared, continuously refreshed level snapshot.
#[derive(Clone)]
pub struct LevelMeter {
    bars: usize,
    latest: Arc<Mutex<Vec<f32>>>,
}

impl LevelMeter {
    pub fn new(bars: usize) -> Self {
        Self {
            bars,
            latest: Arc::new(Mutex::new(vec![0.0; bars])),
        }
    }

    /// Most recent bar values; all zero when idle.
    pub fn snapshot(&self) -> Vec<f32> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Loudest bar in the current snapshot.
    pub fn peak(&self) -> f32 {
        self.snapshot().into_iter().fold(0.0_f32, f32::max)
    }

    pub fn clear(&self) {
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        latest.iter_mut().for_each(|b| *b = 0.0);
    }

    /// Spawn a task that feeds the meter from `audio` until `cancel` fires or
    /// the stream ends.  The snapshot is zeroed when the task exits.
    pub fn spawn_feed(
        &self,
        mut audio: mpsc::Receiver<AudioChunk>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let meter = self.clone();
        tokio::spawn(async move {
            loop {
                let chunk = tokio::select! {
                    _ = cancel.cancelled() => break,
                    chunk = audio.recv() => chunk,
                };
                let Some(chunk) = chunk else { break };
                let bars = compute_levels(&chunk.samples, meter.bars);
                *meter.latest.lock().unwrap_or_else(PoisonError::into_inner) = bars;
            }
            meter.clear();
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
