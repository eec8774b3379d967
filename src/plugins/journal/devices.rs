//! DeviceManager - sole owner of the local camera + microphone stream.
//!
//! At most one [`LocalStreamHandle`] is live. Swapping devices stops the old
//! tracks before the new stream is requested, so a failed swap leaves the
//! manager in the camera-off state rather than holding a stale stream.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use super::errors::JournalError;
use super::media::{
    DeviceKind, MediaDeviceDescriptor, MediaHost, MediaStream, MediaTrack, UserMediaConstraints,
};

/// DeviceManager shared between the preview, the page and the recorder.
pub type SharedDevices<H> = Arc<Mutex<DeviceManager<H>>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceList {
    pub cameras: Vec<MediaDeviceDescriptor>,
    pub microphones: Vec<MediaDeviceDescriptor>,
}

/// Live camera + microphone stream and the device ids it is bound to.
#[derive(Debug)]
pub struct LocalStreamHandle {
    stream: MediaStream,
    camera_id: Option<String>,
    mic_id: Option<String>,
}

impl LocalStreamHandle {
    pub(crate) fn new(stream: MediaStream, camera_id: Option<String>, mic_id: Option<String>) -> Self {
        Self {
            stream,
            camera_id,
            mic_id,
        }
    }

    pub fn stream(&self) -> &MediaStream {
        &self.stream
    }

    pub fn camera_id(&self) -> Option<&str> {
        self.camera_id.as_deref()
    }

    pub fn mic_id(&self) -> Option<&str> {
        self.mic_id.as_deref()
    }

    pub fn video_track(&self) -> Option<&MediaTrack> {
        self.stream.first_video_track()
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.stream.audio_tracks()
    }

    pub fn is_live(&self) -> bool {
        !self.stream.all_stopped()
    }
}

pub struct DeviceManager<H: MediaHost> {
    host: Arc<H>,
    handle: Option<Arc<LocalStreamHandle>>,
    selected_camera_id: Option<String>,
    selected_mic_id: Option<String>,
    devices: DeviceList,
    mic_muted: bool,
}

impl<H: MediaHost> DeviceManager<H> {
    pub fn new(host: Arc<H>) -> Self {
        Self {
            host,
            handle: None,
            selected_camera_id: None,
            selected_mic_id: None,
            devices: DeviceList::default(),
            mic_muted: false,
        }
    }

    pub fn into_shared(self) -> SharedDevices<H> {
        Arc::new(Mutex::new(self))
    }

    /// Enumerates inputs and seeds the selection with the first camera and microphone.
    pub async fn list_devices(&mut self) -> Result<DeviceList, JournalError> {
        let devices = self
            .host
            .enumerate_devices()
            .await
            .map_err(JournalError::from_device)?;

        let mut list = DeviceList::default();
        for device in devices {
            match device.kind {
                DeviceKind::Camera => list.cameras.push(device),
                DeviceKind::Microphone => list.microphones.push(device),
            }
        }

        if self.selected_camera_id.is_none() {
            self.selected_camera_id = list.cameras.first().map(|d| d.id.clone());
        }
        if self.selected_mic_id.is_none() {
            self.selected_mic_id = list.microphones.first().map(|d| d.id.clone());
        }

        tracing::debug!(target: "recorder",
            "[DEVICES] Enumerated {} cameras, {} microphones",
            list.cameras.len(), list.microphones.len());

        self.devices = list.clone();
        Ok(list)
    }

    /// Returns the live stream, acquiring or hot-swapping it when needed.
    ///
    /// The existing handle is returned unchanged when no camera is targeted or
    /// the targeted camera is already bound, unless an explicitly requested
    /// microphone differs from the bound one.
    pub async fn ensure_stream(
        &mut self,
        camera_id: Option<&str>,
        mic_id: Option<&str>,
    ) -> Result<Arc<LocalStreamHandle>, JournalError> {
        let target_camera = camera_id
            .map(str::to_string)
            .or_else(|| self.selected_camera_id.clone());
        let target_mic = mic_id
            .map(str::to_string)
            .or_else(|| self.selected_mic_id.clone());

        if let Some(handle) = &self.handle {
            let camera_matches = target_camera.is_none()
                || target_camera.as_deref() == handle.camera_id();
            let mic_matches = mic_id.is_none() || mic_id == handle.mic_id();

            if camera_matches && mic_matches {
                return Ok(handle.clone());
            }
        }

        if let Some(previous) = self.handle.take() {
            tracing::info!(target: "recorder",
                "[DEVICES] Swapping stream: camera {:?} -> {:?}, mic {:?} -> {:?}",
                previous.camera_id(), target_camera, previous.mic_id(), target_mic);
            previous.stream.stop_all();
        }

        let constraints = UserMediaConstraints::new(target_camera.clone(), target_mic.clone());
        let stream = self.host.get_user_media(constraints).await.map_err(|e| {
            tracing::warn!(target: "recorder", "[DEVICES] Stream acquisition failed: {}", e);
            JournalError::from_device(e)
        })?;

        let bound_camera = stream
            .first_video_track()
            .and_then(|t| t.device_id())
            .map(str::to_string)
            .or(target_camera);
        let bound_mic = stream
            .audio_tracks()
            .next()
            .and_then(|t| t.device_id())
            .map(str::to_string)
            .or(target_mic);

        for track in stream.audio_tracks() {
            track.set_enabled(!self.mic_muted);
        }

        if bound_camera.is_some() {
            self.selected_camera_id = bound_camera.clone();
        }
        if bound_mic.is_some() {
            self.selected_mic_id = bound_mic.clone();
        }

        let handle = Arc::new(LocalStreamHandle::new(stream, bound_camera, bound_mic));
        self.handle = Some(handle.clone());

        tracing::info!(target: "recorder",
            "[DEVICES] Stream acquired: camera={:?}, mic={:?}, muted={}",
            handle.camera_id(), handle.mic_id(), self.mic_muted);

        // Labels only become readable once access is granted.
        if let Err(e) = self.list_devices().await {
            tracing::warn!(target: "recorder", "[DEVICES] Refreshing device list failed: {}", e);
        }

        Ok(handle)
    }

    /// Toggles the microphone tracks without reacquiring the stream.
    pub fn set_mic_muted(&mut self, muted: bool) {
        self.mic_muted = muted;
        if let Some(handle) = &self.handle {
            for track in handle.audio_tracks() {
                track.set_enabled(!muted);
            }
        }
        tracing::debug!(target: "recorder", "[DEVICES] Microphone muted={}", muted);
    }

    /// Stops every track of the live stream. Idempotent.
    pub fn release(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stream.stop_all();
            tracing::info!(target: "recorder", "[DEVICES] Local stream released");
        }
    }

    pub fn is_mic_muted(&self) -> bool {
        self.mic_muted
    }

    pub fn current(&self) -> Option<Arc<LocalStreamHandle>> {
        self.handle.clone()
    }

    pub fn devices(&self) -> &DeviceList {
        &self.devices
    }

    pub fn selected_camera_id(&self) -> Option<&str> {
        self.selected_camera_id.as_deref()
    }

    pub fn selected_mic_id(&self) -> Option<&str> {
        self.selected_mic_id.as_deref()
    }

    pub fn select_camera(&mut self, camera_id: impl Into<String>) {
        self.selected_camera_id = Some(camera_id.into());
    }

    pub fn select_microphone(&mut self, mic_id: impl Into<String>) {
        self.selected_mic_id = Some(mic_id.into());
    }
}

impl<H: MediaHost> Drop for DeviceManager<H> {
    fn drop(&mut self) {
        self.release();
    }
}
