//! Expression samples and the session-scoped history they accumulate in.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The seven expression dimensions reported by the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Neutral,
    Happy,
    Sad,
    Angry,
    Fearful,
    Disgusted,
    Surprised,
}

impl Emotion {
    /// Canonical order.  Ties for the dominant emotion go to the earlier
    /// entry.
    pub const ALL: [Emotion; 7] = [
        Emotion::Neutral,
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Angry,
        Emotion::Fearful,
        Emotion::Disgusted,
        Emotion::Surprised,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Emotion::Neutral => "neutral",
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Angry => "angry",
            Emotion::Fearful => "fearful",
            Emotion::Disgusted => "disgusted",
            Emotion::Surprised => "surprised",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Emotion::Neutral => "😐",
            Emotion::Happy => "😊",
            Emotion::Sad => "😢",
            Emotion::Angry => "😠",
            Emotion::Fearful => "😨",
            Emotion::Disgusted => "🤢",
            Emotion::Surprised => "😲",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One detector classification.  Each score is a probability in `[0, 1]`;
/// the seven values need not sum to 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpressionSample {
    pub neutral: f64,
    pub happy: f64,
    pub sad: f64,
    pub angry: f64,
    pub fearful: f64,
    pub disgusted: f64,
    pub surprised: f64,
}

impl ExpressionSample {
    pub fn get(&self, emotion: Emotion) -> f64 {
        match emotion {
            Emotion::Neutral => self.neutral,
            Emotion::Happy => self.happy,
            Emotion::Sad => self.sad,
            Emotion::Angry => self.angry,
            Emotion::Fearful => self.fearful,
            Emotion::Disgusted => self.disgusted,
            Emotion::Surprised => self.surprised,
        }
    }

    fn slot(&mut self, emotion: Emotion) -> &mut f64 {
        match emotion {
            Emotion::Neutral => &mut self.neutral,
            Emotion::Happy => &mut self.happy,
            Emotion::Sad => &mut self.sad,
            Emotion::Angry => &mut self.angry,
            Emotion::Fearful => &mut self.fearful,
            Emotion::Disgusted => &mut self.disgusted,
            Emotion::Surprised => &mut self.surprised,
        }
    }

    /// Scores paired with their emotion, in canonical order.
    pub fn scores(&self) -> [(Emotion, f64); 7] {
        Emotion::ALL.map(|e| (e, self.get(e)))
    }

    /// Highest-scoring emotion; ties go to the first in [`Emotion::ALL`].
    pub fn dominant(&self) -> (Emotion, f64) {
        let mut best = (Emotion::Neutral, self.neutral);
        for (emotion, score) in self.scores().into_iter().skip(1) {
            if score > best.1 {
                best = (emotion, score);
            }
        }
        best
    }

    /// Per-dimension arithmetic mean.  `None` for an empty slice.
    pub fn mean(samples: &[ExpressionSample]) -> Option<ExpressionSample> {
        if samples.is_empty() {
            return None;
        }
        let n = samples.len() as f64;
        let mut avg = ExpressionSample::default();
        for emotion in Emotion::ALL {
            *avg.slot(emotion) = samples.iter().map(|s| s.get(emotion)).sum::<f64>() / n;
        }
        Some(avg)
    }
}

// ---------------------------------------------------------------------------
// ExpressionHistory
// ---------------------------------------------------------------------------

/// Every sample collected this session plus tick counters.
///
/// Invariant: `detections <= attempts` and `detections == samples.len()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpressionHistory {
    samples: Vec<ExpressionSample>,
    attempts: u64,
    detections: u64,
}

impl ExpressionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A tick that ran the detector and found a face.
    pub fn record_detection(&mut self, sample: ExpressionSample) {
        self.attempts += 1;
        self.detections += 1;
        self.samples.push(sample);
    }

    /// A tick that ran the detector without a usable result.
    pub fn record_miss(&mut self) {
        self.attempts += 1;
    }

    pub fn samples(&self) -> &[ExpressionSample] {
        &self.samples
    }

    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    pub fn detections(&self) -> u64 {
        self.detections
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// `detections / attempts`, or 0 before the first attempt.
    pub fn detection_rate(&self) -> f64 {
        if self.attempts == 0 {
            return 0.0;
        }
        self.detections as f64 / self.attempts as f64
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
