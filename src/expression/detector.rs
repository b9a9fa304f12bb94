//! Boundary to the external face/expression detector.

use async_trait::async_trait;
use thiserror::Error;

use super::sample::ExpressionSample;
use crate::sensor::VideoFrame;

/// Face location in frame pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// A single detected face with its expression scores.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub expressions: ExpressionSample,
    pub bounding_box: BoundingBox,
    /// Face confidence as reported by the detector.
    pub score: f32,
}

/// Transient, per-frame detector failure.  Never fatal to a session.
#[derive(Debug, Clone, Error)]
#[error("expression detection failed: {0}")]
pub struct DetectorError(pub String);

/// Classifies the expression of the most prominent face in a frame.
///
/// `min_confidence` is the face-score cutoff below which the detector must
/// report no detection.
#[async_trait]
pub trait ExpressionDetector: Send + Sync {
    async fn detect(
        &self,
        frame: &VideoFrame,
        min_confidence: f32,
    ) -> Result<Option<Detection>, DetectorError>;
}

#[cfg(test)]
pub mod mock {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use tokio::sync::Notify;

    use super::*;

    /// One scripted detector reply.
    #[derive(Debug, Clone)]
    pub enum Reply {
        Face(ExpressionSample),
        NoFace,
        Fail,
    }

    /// Replays queued replies, then repeats `fallback`.  With a gate set,
    /// every call blocks until the gate is opened.
    pub struct ScriptedDetector {
        replies: Mutex<VecDeque<Reply>>,
        fallback: Reply,
        gate: Option<Notify>,
    }

    impl ScriptedDetector {
        pub fn always(reply: Reply) -> Self {
            Self {
                replies: Mutex::new(VecDeque::new()),
                fallback: reply,
                gate: None,
            }
        }

        pub fn script(replies: Vec<Reply>, fallback: Reply) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                fallback,
                gate: None,
            }
        }

        pub fn gated(reply: Reply) -> Self {
            Self {
                gate: Some(Notify::new()),
                ..Self::always(reply)
            }
        }

        pub fn open_gate(&self) {
            if let Some(gate) = &self.gate {
                gate.notify_waiters();
            }
        }
    }

    #[async_trait]
    impl ExpressionDetector for ScriptedDetector {
        async fn detect(
            &self,
            _frame: &VideoFrame,
            _min_confidence: f32,
        ) -> Result<Option<Detection>, DetectorError> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone());
            match reply {
                Reply::Face(expressions) => Ok(Some(Detection {
                    expressions,
                    bounding_box: BoundingBox::default(),
                    score: 0.9,
                })),
                Reply::NoFace => Ok(None),
                Reply::Fail => Err(DetectorError("model not loaded".into())),
            }
        }
    }
}
