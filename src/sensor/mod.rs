//! Sensor lifecycle: camera and microphone streams and their consumers.
//!
//! # Ownership
//!
//! ```text
//! SensorManager
//!   ├─ camera slot ── SensorHandle (owner: Setup | Interview)
//!   │                    └─ frames ─▶ ExpressionSampler
//!   ├─ setup mic test ── SensorHandle ─▶ LevelMeter
//!   └─ per-recording grants (handed to speech::SpeechInput)
//! ```
//!
//! Every [`SensorHandle`] stops its tracks when released or dropped, and the
//! manager never keeps more than one live camera handle.

pub mod device;
pub mod level;
pub mod manager;

pub use device::{
    AudioChunk, DeviceKind, FrameSource, MediaDevices, MediaStream, MediaTrack, NoMediaDevices,
    SensorError, SensorHandle, StreamRequest, VideoFrame,
};
pub use level::{compute_levels, LevelMeter};
pub use manager::{CameraOwner, SensorManager};

#[cfg(test)]
pub use device::mock;
