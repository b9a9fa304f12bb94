//! Device streams and the handles that own them.
//!
//! A [`MediaDevices`] implementation is the platform boundary: it turns a
//! [`StreamRequest`] into a live [`MediaStream`] (or a permission/device
//! error).  The stream is immediately wrapped in a [`SensorHandle`], which is
//! the only thing the rest of the crate ever holds.  Releasing a handle stops
//! every underlying track; dropping it does the same, so a handle can never
//! leak a live camera or microphone.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// DeviceKind
// ---------------------------------------------------------------------------

/// The two device classes a session can hold streams for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Camera,
    Microphone,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Camera => write!(f, "camera"),
            DeviceKind::Microphone => write!(f, "microphone"),
        }
    }
}

// ---------------------------------------------------------------------------
// SensorError
// ---------------------------------------------------------------------------

/// Errors that can occur while acquiring a device stream.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SensorError {
    /// The user (or platform policy) refused access to the device.
    #[error("{0} access denied")]
    PermissionDenied(DeviceKind),

    /// The device is missing, busy, or failed to start.
    #[error("{kind} error: {message}")]
    Device { kind: DeviceKind, message: String },

    /// An operation needed a live handle that was never acquired.
    #[error("no {0} stream acquired")]
    NotAcquired(DeviceKind),
}

impl SensorError {
    pub fn kind(&self) -> DeviceKind {
        match self {
            SensorError::PermissionDenied(kind) | SensorError::NotAcquired(kind) => *kind,
            SensorError::Device { kind, .. } => *kind,
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, SensorError::PermissionDenied(_))
    }
}

// ---------------------------------------------------------------------------
// Stream primitives
// ---------------------------------------------------------------------------

/// One track of a device stream (a camera feed or a microphone channel).
pub trait MediaTrack: Send + Sync {
    /// Stable identifier; unchanged for the whole life of the track.
    fn id(&self) -> &str;

    /// Stop the track.  Calling it on an already stopped track is a no-op.
    fn stop(&self);

    fn is_live(&self) -> bool;
}

/// A single still taken from a camera feed.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    /// Packed RGBA pixels.
    pub pixels: Arc<[u8]>,
}

/// Read access to the most recent camera frame.
pub trait FrameSource: Send + Sync {
    /// `None` while the feed is not in a playable state (paused, ended, or
    /// still warming up).
    fn current_frame(&self) -> Option<VideoFrame>;
}

/// A buffer of raw microphone audio.
///
/// Samples are interleaved `f32` in the range `[-1.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub samples: Vec<f32>,
    /// Sample rate of this chunk in Hz.
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub channels: u16,
}

/// What the caller wants from [`MediaDevices::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamRequest {
    /// Front-facing camera at the requested resolution.
    Camera { width: u32, height: u32 },
    Microphone,
}

impl StreamRequest {
    pub fn kind(&self) -> DeviceKind {
        match self {
            StreamRequest::Camera { .. } => DeviceKind::Camera,
            StreamRequest::Microphone => DeviceKind::Microphone,
        }
    }
}

/// A freshly granted device stream, as produced by the platform.
pub struct MediaStream {
    pub tracks: Vec<Arc<dyn MediaTrack>>,
    /// Present for camera streams.
    pub video: Option<Arc<dyn FrameSource>>,
    /// Present for microphone streams.
    pub audio: Option<mpsc::Receiver<AudioChunk>>,
}

/// Platform capability that grants camera and microphone streams.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn open(&self, request: StreamRequest) -> Result<MediaStream, SensorError>;
}

/// [`MediaDevices`] for hosts without any capture backend.  Every request
/// fails with [`SensorError::Device`], which the session treats as an absent
/// modality.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMediaDevices;

#[async_trait]
impl MediaDevices for NoMediaDevices {
    async fn open(&self, request: StreamRequest) -> Result<MediaStream, SensorError> {
        Err(SensorError::Device {
            kind: request.kind(),
            message: "no capture backend on this host".into(),
        })
    }
}

// ---------------------------------------------------------------------------
// SensorHandle
// ---------------------------------------------------------------------------

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Exclusive owner of one acquired device stream.
///
/// [`release`](Self::release) is idempotent.  Dropping an unreleased handle
/// releases it.
pub struct SensorHandle {
    id: u64,
    kind: DeviceKind,
    tracks: Vec<Arc<dyn MediaTrack>>,
    video: Option<Arc<dyn FrameSource>>,
    audio: Option<mpsc::Receiver<AudioChunk>>,
    released: bool,
}

impl SensorHandle {
    pub fn new(kind: DeviceKind, stream: MediaStream) -> Self {
        Self {
            id: NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed),
            kind,
            tracks: stream.tracks,
            video: stream.video,
            audio: stream.audio,
            released: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn track_ids(&self) -> Vec<String> {
        self.tracks.iter().map(|t| t.id().to_string()).collect()
    }

    /// `true` until released, and while at least one track is still live.
    pub fn is_live(&self) -> bool {
        !self.released && self.tracks.iter().any(|t| t.is_live())
    }

    /// Borrowed frame access for consumers such as the expression sampler.
    pub fn frames(&self) -> Option<Arc<dyn FrameSource>> {
        if self.released {
            return None;
        }
        self.video.clone()
    }

    /// Hand the audio feed to a single consumer.  Returns `None` on the
    /// second call or for camera handles.
    pub fn take_audio(&mut self) -> Option<mpsc::Receiver<AudioChunk>> {
        self.audio.take()
    }

    /// Stop every underlying track.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        for track in &self.tracks {
            track.stop();
        }
        self.video = None;
        self.audio = None;
        log::debug!("sensors: released {} handle #{}", self.kind, self.id);
    }
}

impl Drop for SensorHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for SensorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SensorHandle")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("tracks", &self.track_ids())
            .field("released", &self.released)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

#[cfg(test)]
pub mod mock {
    //! In-memory devices whose tracks count how often they were stopped.

    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::sync::Mutex;

    use super::*;

    pub struct FakeTrack {
        id: String,
        live: AtomicBool,
        stops: AtomicUsize,
    }

    impl FakeTrack {
        pub fn stop_count(&self) -> usize {
            self.stops.load(Ordering::SeqCst)
        }
    }

    impl MediaTrack for FakeTrack {
        fn id(&self) -> &str {
            &self.id
        }

        fn stop(&self) {
            if self.live.swap(false, Ordering::SeqCst) {
                self.stops.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn is_live(&self) -> bool {
            self.live.load(Ordering::SeqCst)
        }
    }

    /// Camera feed that is playable unless told otherwise.
    pub struct FakeFeed {
        pub playable: AtomicBool,
    }

    impl FrameSource for FakeFeed {
        fn current_frame(&self) -> Option<VideoFrame> {
            self.playable.load(Ordering::SeqCst).then(|| VideoFrame {
                width: 320,
                height: 240,
                pixels: Arc::from(vec![0u8; 4]),
            })
        }
    }

    /// Grants every stream unless a denial is queued.
    #[derive(Default)]
    pub struct FakeDevices {
        tracks: Mutex<Vec<Arc<FakeTrack>>>,
        denials: Mutex<VecDeque<SensorError>>,
        audio_senders: Mutex<Vec<mpsc::Sender<AudioChunk>>>,
        opened: AtomicUsize,
    }

    impl FakeDevices {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Fail the next `open` call with `err`.
        pub fn deny_next(&self, err: SensorError) {
            self.denials.lock().unwrap().push_back(err);
        }

        pub fn opened(&self) -> usize {
            self.opened.load(Ordering::SeqCst)
        }

        pub fn live_tracks(&self) -> usize {
            self.tracks.lock().unwrap().iter().filter(|t| t.is_live()).count()
        }

        pub fn total_stops(&self) -> usize {
            self.tracks.lock().unwrap().iter().map(|t| t.stop_count()).sum()
        }

        /// Push one chunk into every open microphone stream.
        pub async fn feed_audio(&self, samples: Vec<f32>) {
            let senders: Vec<_> = self.audio_senders.lock().unwrap().clone();
            for tx in senders {
                let _ = tx
                    .send(AudioChunk {
                        samples: samples.clone(),
                        sample_rate: 16_000,
                        channels: 1,
                    })
                    .await;
            }
        }
    }

    #[async_trait]
    impl MediaDevices for FakeDevices {
        async fn open(&self, request: StreamRequest) -> Result<MediaStream, SensorError> {
            if let Some(err) = self.denials.lock().unwrap().pop_front() {
                return Err(err);
            }
            let n = self.opened.fetch_add(1, Ordering::SeqCst);
            let track = Arc::new(FakeTrack {
                id: format!("{}-{n}", request.kind()),
                live: AtomicBool::new(true),
                stops: AtomicUsize::new(0),
            });
            self.tracks.lock().unwrap().push(Arc::clone(&track));

            let mut stream = MediaStream {
                tracks: vec![track as Arc<dyn MediaTrack>],
                video: None,
                audio: None,
            };
            match request {
                StreamRequest::Camera { .. } => {
                    stream.video = Some(Arc::new(FakeFeed {
                        playable: AtomicBool::new(true),
                    }));
                }
                StreamRequest::Microphone => {
                    let (tx, rx) = mpsc::channel(64);
                    self.audio_senders.lock().unwrap().push(tx);
                    stream.audio = Some(rx);
                }
            }
            Ok(stream)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::mock::FakeDevices;
    use super::*;

    #[tokio::test]
    async fn release_stops_every_track_once() {
        let devices = FakeDevices::new();
        let stream = devices
            .open(StreamRequest::Camera { width: 320, height: 240 })
            .await
            .unwrap();
        let mut handle = SensorHandle::new(DeviceKind::Camera, stream);

        assert!(handle.is_live());
        assert!(handle.frames().is_some());

        handle.release();
        handle.release();

        assert!(!handle.is_live());
        assert!(handle.frames().is_none());
        assert_eq!(devices.total_stops(), 1);
    }

    #[tokio::test]
    async fn dropping_a_handle_releases_it() {
        let devices = FakeDevices::new();
        let stream = devices.open(StreamRequest::Microphone).await.unwrap();
        let handle = SensorHandle::new(DeviceKind::Microphone, stream);
        assert_eq!(devices.live_tracks(), 1);

        drop(handle);
        assert_eq!(devices.live_tracks(), 0);
    }

    #[tokio::test]
    async fn audio_feed_can_only_be_taken_once() {
        let devices = FakeDevices::new();
        let stream = devices.open(StreamRequest::Microphone).await.unwrap();
        let mut handle = SensorHandle::new(DeviceKind::Microphone, stream);

        assert!(handle.take_audio().is_some());
        assert!(handle.take_audio().is_none());
    }

    #[tokio::test]
    async fn no_media_devices_reports_device_error() {
        let err = NoMediaDevices
            .open(StreamRequest::Microphone)
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), DeviceKind::Microphone);
        assert!(!err.is_permission_denied());
    }

    #[test]
    fn handle_ids_are_unique() {
        let empty = || MediaStream {
            tracks: Vec::new(),
            video: None,
            audio: None,
        };
        let a = SensorHandle::new(DeviceKind::Camera, empty());
        let b = SensorHandle::new(DeviceKind::Camera, empty());
        assert_ne!(a.id(), b.id());
    }
}
