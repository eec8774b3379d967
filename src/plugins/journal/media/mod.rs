//! Host media seam.
//!
//! Everything that talks to real devices, the surface picker or a codec lives
//! behind [`MediaHost`] and [`EncoderBackend`]. The rest of the pipeline only
//! sees tracks and streams.

pub mod track;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::{QualityPreset, CAMERA_IDEAL_HEIGHT, CAMERA_IDEAL_WIDTH, DISPLAY_FRAME_RATE};

pub use track::{MediaStream, MediaTrack, TrackKind, TrackState};

/// Failures reported by the host while negotiating media.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HostError {
    #[error("access not allowed: {0}")]
    NotAllowed(String),
    #[error("device not found: {0}")]
    NotFound(String),
    #[error("constraints cannot be satisfied: {0}")]
    Overconstrained(String),
    #[error("unsupported request: {0}")]
    Unsupported(String),
    #[error("request aborted: {0}")]
    Aborted(String),
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Camera,
    Microphone,
}

/// Enumerated input device. Ids are volatile across hardware changes and labels
/// may be empty until access has been granted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDeviceDescriptor {
    pub id: String,
    pub kind: DeviceKind,
    pub label: String,
}

impl MediaDeviceDescriptor {
    pub fn new(id: impl Into<String>, kind: DeviceKind, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserMediaConstraints {
    /// Exact camera to open; `None` lets the host pick a user-facing camera.
    pub camera_id: Option<String>,
    /// Exact microphone to open; `None` uses the default input.
    pub mic_id: Option<String>,
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl UserMediaConstraints {
    pub fn new(camera_id: Option<String>, mic_id: Option<String>) -> Self {
        Self {
            camera_id,
            mic_id,
            ideal_width: CAMERA_IDEAL_WIDTH,
            ideal_height: CAMERA_IDEAL_HEIGHT,
        }
    }

    pub fn facing_user(&self) -> bool {
        self.camera_id.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplaySurface {
    Browser,
    Window,
    Monitor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayMediaConstraints {
    pub frame_rate: u32,
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub audio: bool,
    pub preferred_surface: Option<DisplaySurface>,
    pub prefer_current_tab: bool,
    pub include_self_surface: bool,
    pub allow_surface_switching: bool,
}

impl DisplayMediaConstraints {
    /// Full request: browser surface hints plus the preset resolution.
    pub fn preferred(quality: QualityPreset) -> Self {
        Self {
            preferred_surface: Some(DisplaySurface::Browser),
            prefer_current_tab: true,
            include_self_surface: true,
            allow_surface_switching: true,
            ..Self::basic(quality)
        }
    }

    /// Fallback request for hosts that reject the surface hints.
    pub fn basic(quality: QualityPreset) -> Self {
        let (width, height) = quality.dimensions();
        Self {
            frame_rate: DISPLAY_FRAME_RATE,
            ideal_width: width,
            ideal_height: height,
            audio: true,
            preferred_surface: None,
            prefer_current_tab: false,
            include_self_surface: false,
            allow_surface_switching: false,
        }
    }
}

/// Device and surface access provided by the host environment.
pub trait MediaHost: Send + Sync + 'static {
    /// Lists input devices. Permission gated on most hosts.
    fn enumerate_devices(
        &self,
    ) -> impl Future<Output = Result<Vec<MediaDeviceDescriptor>, HostError>> + Send;

    /// Opens a combined camera + microphone stream.
    fn get_user_media(
        &self,
        constraints: UserMediaConstraints,
    ) -> impl Future<Output = Result<MediaStream, HostError>> + Send;

    /// Prompts the user for a screen, window or tab to capture.
    fn get_display_media(
        &self,
        constraints: DisplayMediaConstraints,
    ) -> impl Future<Output = Result<MediaStream, HostError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncoderEvent {
    /// A flushed block of container data.
    Data(Vec<u8>),
    /// The encoder has delivered its final chunk.
    Stopped,
}

/// Where an encoder delivers its output. Cheap to clone; callable from any thread.
#[derive(Clone)]
pub struct EncoderSink {
    deliver: Arc<dyn Fn(EncoderEvent) + Send + Sync>,
}

impl EncoderSink {
    pub fn new(deliver: impl Fn(EncoderEvent) + Send + Sync + 'static) -> Self {
        Self {
            deliver: Arc::new(deliver),
        }
    }

    pub fn push_chunk(&self, data: Vec<u8>) {
        (self.deliver)(EncoderEvent::Data(data));
    }

    pub fn finish(&self) {
        (self.deliver)(EncoderEvent::Stopped);
    }
}

impl std::fmt::Debug for EncoderSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncoderSink").finish_non_exhaustive()
    }
}

/// A running encoder. `stop` must eventually cause [`EncoderSink::finish`].
pub trait EncoderSession: Send {
    fn stop(&mut self);
    fn is_active(&self) -> bool;
}

/// Streaming container encoder provided by the host.
pub trait EncoderBackend: Send + Sync + 'static {
    fn is_type_supported(&self, mime_type: &str) -> bool;

    fn start(
        &self,
        stream: &MediaStream,
        mime_type: &str,
        flush_interval: Duration,
        sink: EncoderSink,
    ) -> impl Future<Output = Result<Box<dyn EncoderSession>, HostError>> + Send;
}
