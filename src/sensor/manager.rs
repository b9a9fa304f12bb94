//! Acquisition and release of device streams and their derived consumers.
//!
//! [`SensorManager`] is the only owner of camera and microphone streams in a
//! session.  It holds at most one camera handle (tagged with the stage that
//! owns it), the setup microphone test, and the expression sampler that
//! reads from the camera.  Microphone grants for recording are handed out
//! as fresh handles and owned by the caller.
//!
//! All release paths are idempotent and never fail.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::device::{DeviceKind, MediaDevices, SensorError, SensorHandle, StreamRequest};
use super::level::LevelMeter;
use crate::config::SamplerConfig;
use crate::expression::{ExpressionDetector, ExpressionSampler};

/// Camera resolution requested from the platform.
const CAMERA_WIDTH: u32 = 320;
const CAMERA_HEIGHT: u32 = 240;

/// Which stage currently owns the camera feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraOwner {
    Setup,
    Interview,
}

struct CameraSlot {
    handle: SensorHandle,
    owner: CameraOwner,
}

struct MicTest {
    handle: SensorHandle,
    cancel: CancellationToken,
    feed: Option<JoinHandle<()>>,
}

pub struct SensorManager {
    devices: Arc<dyn MediaDevices>,
    camera: Option<CameraSlot>,
    mic_test: Option<MicTest>,
    mic_meter: LevelMeter,
    sampler: ExpressionSampler,
}

impl SensorManager {
    pub fn new(devices: Arc<dyn MediaDevices>, level_bars: usize) -> Self {
        Self {
            devices,
            camera: None,
            mic_test: None,
            mic_meter: LevelMeter::new(level_bars),
            sampler: ExpressionSampler::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Camera
    // -----------------------------------------------------------------------

    /// Acquire the camera for `owner`.
    ///
    /// While a handle is already held this is a no-op that returns the
    /// existing handle (its owner is left unchanged; see
    /// [`transfer_camera`](Self::transfer_camera)).
    pub async fn acquire_camera(
        &mut self,
        owner: CameraOwner,
    ) -> Result<&SensorHandle, SensorError> {
        if self.camera.is_none() {
            let request = StreamRequest::Camera {
                width: CAMERA_WIDTH,
                height: CAMERA_HEIGHT,
            };
            let stream = self.devices.open(request).await.map_err(|e| {
                log::warn!("sensors: camera unavailable: {e}");
                e
            })?;
            let handle = SensorHandle::new(DeviceKind::Camera, stream);
            log::info!("sensors: camera handle #{} acquired for {owner:?}", handle.id());
            self.camera = Some(CameraSlot { handle, owner });
        } else {
            log::debug!("sensors: camera already acquired, reusing handle");
        }

        match &self.camera {
            Some(slot) => Ok(&slot.handle),
            None => Err(SensorError::NotAcquired(DeviceKind::Camera)),
        }
    }

    /// Stop the sampler reading from the camera, then every camera track.
    /// No-op without a camera handle.
    pub fn release_camera(&mut self) {
        self.sampler.stop();
        if let Some(mut slot) = self.camera.take() {
            slot.handle.release();
            log::info!("sensors: camera released ({:?})", slot.owner);
        }
    }

    /// Move the live camera handle to a new owner without touching its
    /// tracks.  Returns `false` when there is no camera handle.
    pub fn transfer_camera(&mut self, to: CameraOwner) -> bool {
        match &mut self.camera {
            Some(slot) => {
                if slot.owner != to {
                    log::info!(
                        "sensors: camera handle #{} transferred {:?} -> {to:?}",
                        slot.handle.id(),
                        slot.owner
                    );
                    slot.owner = to;
                }
                true
            }
            None => false,
        }
    }

    pub fn camera(&self) -> Option<&SensorHandle> {
        self.camera.as_ref().map(|slot| &slot.handle)
    }

    pub fn camera_owner(&self) -> Option<CameraOwner> {
        self.camera.as_ref().map(|slot| slot.owner)
    }

    pub fn has_camera(&self) -> bool {
        self.camera.is_some()
    }

    // -----------------------------------------------------------------------
    // Microphone
    // -----------------------------------------------------------------------

    /// A fresh microphone grant backing the live level meter while speech
    /// recognition runs.  Owned by the caller.
    pub async fn acquire_microphone_for_recognition(&self) -> Result<SensorHandle, SensorError> {
        self.open_microphone("recognition").await
    }

    /// A fresh microphone grant feeding the raw-audio recorder.  Owned by
    /// the caller.
    pub async fn acquire_microphone_for_recording(&self) -> Result<SensorHandle, SensorError> {
        self.open_microphone("recording").await
    }

    async fn open_microphone(&self, purpose: &str) -> Result<SensorHandle, SensorError> {
        let stream = self
            .devices
            .open(StreamRequest::Microphone)
            .await
            .map_err(|e| {
                log::warn!("sensors: microphone for {purpose} unavailable: {e}");
                e
            })?;
        let handle = SensorHandle::new(DeviceKind::Microphone, stream);
        log::debug!("sensors: microphone handle #{} acquired for {purpose}", handle.id());
        Ok(handle)
    }

    /// Start the setup-stage microphone test.  No-op when already running.
    pub async fn start_microphone_test(&mut self) -> Result<(), SensorError> {
        if self.mic_test.is_some() {
            return Ok(());
        }
        let mut handle = self.open_microphone("setup test").await?;
        let cancel = CancellationToken::new();
        let feed = handle
            .take_audio()
            .map(|audio| self.mic_meter.spawn_feed(audio, cancel.clone()));
        self.mic_test = Some(MicTest {
            handle,
            cancel,
            feed,
        });
        Ok(())
    }

    /// Stop the setup microphone test and release its handle.
    pub fn stop_microphone_test(&mut self) {
        if let Some(mut test) = self.mic_test.take() {
            test.cancel.cancel();
            if let Some(feed) = test.feed.take() {
                feed.abort();
            }
            test.handle.release();
            self.mic_meter.clear();
        }
    }

    pub fn microphone_test_running(&self) -> bool {
        self.mic_test.is_some()
    }

    /// Current bars of the setup microphone level meter.
    pub fn microphone_levels(&self) -> Vec<f32> {
        self.mic_meter.snapshot()
    }

    // -----------------------------------------------------------------------
    // Expression sampling
    // -----------------------------------------------------------------------

    /// Start sampling the live camera feed.  Returns `false` when there is no
    /// camera or the sampler is already running.
    pub fn start_sampling(
        &mut self,
        detector: Arc<dyn ExpressionDetector>,
        config: &SamplerConfig,
    ) -> bool {
        let Some(frames) = self.camera().and_then(|handle| handle.frames()) else {
            log::debug!("sensors: no camera feed to sample");
            return false;
        };
        self.sampler.start(frames, detector, config)
    }

    pub fn stop_sampling(&mut self) {
        self.sampler.stop();
    }

    pub fn sampler(&self) -> &ExpressionSampler {
        &self.sampler
    }

    // -----------------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------------

    /// Stop every consumer and release every handle the manager owns.
    pub fn release_all(&mut self) {
        self.stop_sampling();
        self.stop_microphone_test();
        self.release_camera();
    }

    /// Number of live handles currently owned by the manager.
    pub fn live_handles(&self) -> usize {
        let camera = self.camera().is_some_and(|h| h.is_live()) as usize;
        let mic = self.mic_test.as_ref().is_some_and(|t| t.handle.is_live()) as usize;
        camera + mic
    }
}

impl Drop for SensorManager {
    fn drop(&mut self) {
        self.release_all();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::expression::detector::mock::{Reply, ScriptedDetector};
    use crate::sensor::mock::FakeDevices;

    fn manager(devices: &Arc<FakeDevices>) -> SensorManager {
        SensorManager::new(Arc::clone(devices) as Arc<dyn MediaDevices>, 8)
    }

    #[tokio::test]
    async fn second_camera_acquisition_returns_existing_handle() {
        let devices = FakeDevices::new();
        let mut sensors = manager(&devices);

        let first = sensors.acquire_camera(CameraOwner::Setup).await.unwrap().id();
        let second = sensors
            .acquire_camera(CameraOwner::Interview)
            .await
            .unwrap()
            .id();

        assert_eq!(first, second);
        assert_eq!(devices.opened(), 1);
        assert_eq!(sensors.camera_owner(), Some(CameraOwner::Setup));
    }

    #[tokio::test]
    async fn denied_camera_leaves_session_camera_less() {
        let devices = FakeDevices::new();
        devices.deny_next(SensorError::PermissionDenied(DeviceKind::Camera));
        let mut sensors = manager(&devices);

        let err = sensors.acquire_camera(CameraOwner::Interview).await.unwrap_err();
        assert!(err.is_permission_denied());
        assert!(!sensors.has_camera());
        assert_eq!(sensors.live_handles(), 0);
    }

    #[tokio::test]
    async fn release_camera_is_idempotent() {
        let devices = FakeDevices::new();
        let mut sensors = manager(&devices);
        sensors.release_camera();

        sensors.acquire_camera(CameraOwner::Setup).await.unwrap();
        sensors.release_camera();
        sensors.release_camera();

        assert_eq!(devices.total_stops(), 1);
        assert!(!sensors.has_camera());
    }

    #[tokio::test]
    async fn transfer_keeps_tracks_running() {
        let devices = FakeDevices::new();
        let mut sensors = manager(&devices);

        let before = sensors
            .acquire_camera(CameraOwner::Setup)
            .await
            .unwrap()
            .track_ids();
        assert!(sensors.transfer_camera(CameraOwner::Interview));
        let after = sensors.camera().unwrap().track_ids();

        assert_eq!(before, after);
        assert_eq!(devices.total_stops(), 0);
        assert_eq!(sensors.camera_owner(), Some(CameraOwner::Interview));
    }

    #[test]
    fn transfer_without_camera_reports_false() {
        let devices = FakeDevices::new();
        let mut sensors = manager(&devices);
        assert!(!sensors.transfer_camera(CameraOwner::Interview));
    }

    #[tokio::test]
    async fn microphone_grants_are_independent() {
        let devices = FakeDevices::new();
        let sensors = manager(&devices);

        let a = sensors.acquire_microphone_for_recognition().await.unwrap();
        let b = sensors.acquire_microphone_for_recording().await.unwrap();

        assert_ne!(a.id(), b.id());
        assert_eq!(devices.live_tracks(), 2);
        drop(a);
        assert_eq!(devices.live_tracks(), 1);
    }

    #[tokio::test]
    async fn microphone_test_feeds_level_meter() {
        let devices = FakeDevices::new();
        let mut sensors = manager(&devices);

        sensors.start_microphone_test().await.unwrap();
        sensors.start_microphone_test().await.unwrap();
        assert_eq!(devices.opened(), 1);

        devices.feed_audio(vec![0.25; 800]).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(sensors.microphone_levels().iter().any(|&b| b > 0.2));

        sensors.stop_microphone_test();
        assert!(!sensors.microphone_test_running());
        assert_eq!(devices.live_tracks(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn release_all_stops_sampler_and_handles() {
        let devices = FakeDevices::new();
        let mut sensors = manager(&devices);
        sensors.acquire_camera(CameraOwner::Interview).await.unwrap();
        sensors.start_microphone_test().await.unwrap();
        let detector = Arc::new(ScriptedDetector::always(Reply::NoFace));
        assert!(sensors.start_sampling(detector, &SamplerConfig::default()));

        tokio::time::sleep(Duration::from_millis(2_600)).await;
        assert_eq!(sensors.sampler().snapshot().attempts(), 1);

        sensors.release_all();
        assert!(!sensors.sampler().is_running());
        assert_eq!(sensors.live_handles(), 0);
        assert_eq!(devices.live_tracks(), 0);

        tokio::time::sleep(Duration::from_millis(10_000)).await;
        assert_eq!(sensors.sampler().snapshot().attempts(), 1);
    }

    #[test]
    fn sampling_without_camera_is_refused() {
        let devices = FakeDevices::new();
        let mut sensors = manager(&devices);
        let detector = Arc::new(ScriptedDetector::always(Reply::NoFace));
        assert!(!sensors.start_sampling(detector, &SamplerConfig::default()));
    }
}
