//! Facial-expression signal: samples, history, detector boundary and the
//! periodic sampler.
//!
//! # Architecture
//!
//! ```text
//! camera SensorHandle ──frames──▶ ExpressionSampler (tokio task, 2.5 s)
//!                                      │ detect()
//!                                      ▼
//!                              ExpressionDetector (external)
//!                                      │
//!                                      ▼
//!                      SharedHistory (Arc<Mutex<ExpressionHistory>>)
//!                                      │
//!                                      ▼
//!                      scoring::compute_visual_summary
//! ```

pub mod detector;
pub mod sample;
pub mod sampler;

pub use detector::{BoundingBox, Detection, DetectorError, ExpressionDetector};
pub use sample::{Emotion, ExpressionHistory, ExpressionSample};
pub use sampler::{ExpressionSampler, LiveExpression, SharedHistory};
