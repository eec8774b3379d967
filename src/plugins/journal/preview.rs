//! Self-monitoring preview. Reads the DeviceManager's stream, never writes it.

use std::sync::Arc;

use super::devices::LocalStreamHandle;
use super::media::MediaTrack;

#[derive(Debug, Default)]
pub struct PreviewSurface {
    attached: Option<Arc<LocalStreamHandle>>,
    visible: bool,
}

impl PreviewSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Points the preview at `handle`. Re-attaching the same handle is a no-op.
    pub fn attach(&mut self, handle: Arc<LocalStreamHandle>) {
        if let Some(current) = &self.attached {
            if Arc::ptr_eq(current, &handle) {
                return;
            }
        }
        tracing::debug!(target: "recorder", "[PREVIEW] Attached camera {:?}", handle.camera_id());
        self.attached = Some(handle);
    }

    pub fn detach(&mut self) {
        self.attached = None;
    }

    pub fn show(&mut self, handle: Arc<LocalStreamHandle>) {
        self.attach(handle);
        self.visible = true;
    }

    pub fn hide(&mut self) {
        self.visible = false;
        self.detach();
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// The video track currently rendered, if the attached stream is still live.
    pub fn video_track(&self) -> Option<&MediaTrack> {
        self.attached
            .as_ref()
            .and_then(|h| h.video_track())
            .filter(|t| !t.is_stopped())
    }

    pub fn attached(&self) -> Option<&Arc<LocalStreamHandle>> {
        self.attached.as_ref()
    }
}
