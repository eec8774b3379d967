//! JournalStudio - page-level composition of devices, preview, recorder,
//! editor and caption sync.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

use crate::core::settings::AppSettings;
use crate::shared::paths::get_recordings_dir;

use super::devices::{DeviceList, DeviceManager, SharedDevices};
use super::editor::EditorSession;
use super::errors::JournalError;
use super::media::{EncoderBackend, MediaHost};
use super::persistence::JournalStore;
use super::preview::PreviewSurface;
use super::recorder::{
    CoordinatorConfig, CoordinatorHandle, RecordingArtifact, RecordingCoordinator, RecordingPhase,
    RecordingStatus, SessionNotice,
};
use super::transcript::{ActiveCaptionTracker, CaptionViewport};
use super::types::QualityPreset;

/// How long teardown waits for a finalizing recording to hand over its artifact.
const FINALIZE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct JournalStudio<H: MediaHost, S: JournalStore> {
    devices: SharedDevices<H>,
    preview: PreviewSurface,
    recorder: CoordinatorHandle,
    notices: broadcast::Receiver<SessionNotice>,
    store: Arc<S>,
    editor: Option<EditorSession>,
    tracker: ActiveCaptionTracker,
    settings: AppSettings,
    quality: QualityPreset,
    last_artifact: Option<Arc<RecordingArtifact>>,
    torn_down: bool,
}

impl<H: MediaHost, S: JournalStore> JournalStudio<H, S> {
    /// Builds the studio and spawns its recording coordinator on the current runtime.
    pub fn new<E: EncoderBackend>(host: Arc<H>, backend: Arc<E>, store: Arc<S>, settings: AppSettings) -> Self {
        let mut manager = DeviceManager::new(host.clone());
        manager.set_mic_muted(settings.start_muted);
        let devices = manager.into_shared();

        let config = CoordinatorConfig {
            flush_interval: settings.flush_interval(),
        };
        let recorder = RecordingCoordinator::spawn(host, backend, devices.clone(), config);
        let notices = recorder.subscribe();

        tracing::info!(target: "recorder",
            "[STUDIO] Ready: api={}, quality={}", settings.api_base_url, settings.recording_quality.name());

        Self {
            devices,
            preview: PreviewSurface::new(),
            recorder,
            notices,
            store,
            editor: None,
            tracker: ActiveCaptionTracker::default(),
            quality: settings.recording_quality,
            settings,
            last_artifact: None,
            torn_down: false,
        }
    }

    pub async fn load_journal(&mut self, id: &str) -> Result<(), JournalError> {
        let record = self.store.get_journal(id).await?;
        let mut editor = EditorSession::new(record, self.settings.autosave_delay());
        self.tracker.set_segments(editor.captions());
        self.editor = Some(editor);
        Ok(())
    }

    pub async fn list_devices(&self) -> Result<DeviceList, JournalError> {
        self.devices.lock().await.list_devices().await
    }

    /// Shows or hides the self preview. Returns whether the feed is now visible.
    ///
    /// Showing fails without changing visibility when the stream cannot be
    /// acquired. Hiding releases the devices unless a recording still needs them.
    pub async fn toggle_camera_feed(&mut self) -> Result<bool, JournalError> {
        if self.preview.is_visible() {
            self.preview.hide();
            if !self.recording_active().await {
                self.devices.lock().await.release();
            }
            return Ok(false);
        }

        let handle = self
            .devices
            .lock()
            .await
            .ensure_stream(None, None)
            .await
            .map_err(|e| {
                tracing::warn!(target: "recorder", "[STUDIO] Camera feed unavailable: {}", e);
                e
            })?;
        self.preview.show(handle);
        Ok(true)
    }

    /// Flips microphone mute, acquiring the stream first if needed. Returns the new mute state.
    pub async fn toggle_mute(&mut self) -> Result<bool, JournalError> {
        let mut devices = self.devices.lock().await;
        devices.ensure_stream(None, None).await?;
        let muted = !devices.is_mic_muted();
        devices.set_mic_muted(muted);
        Ok(muted)
    }

    pub async fn select_camera(&mut self, camera_id: &str) -> Result<(), JournalError> {
        let handle = {
            let mut devices = self.devices.lock().await;
            devices.select_camera(camera_id);
            devices.ensure_stream(Some(camera_id), None).await?
        };
        if self.preview.is_visible() {
            self.preview.attach(handle);
        }
        Ok(())
    }

    pub async fn select_microphone(&mut self, mic_id: &str) -> Result<(), JournalError> {
        let handle = {
            let mut devices = self.devices.lock().await;
            devices.select_microphone(mic_id);
            devices.ensure_stream(None, Some(mic_id)).await?
        };
        if self.preview.is_visible() {
            self.preview.attach(handle);
        }
        Ok(())
    }

    pub fn set_quality(&mut self, quality: QualityPreset) {
        self.quality = quality;
    }

    pub fn quality(&self) -> QualityPreset {
        self.quality
    }

    pub async fn start_recording(&mut self) -> Result<(), JournalError> {
        self.recorder.start(self.quality).await?;

        // Recording may have acquired the local stream; keep a visible preview on it.
        if self.preview.is_visible() {
            if let Some(handle) = self.devices.lock().await.current() {
                self.preview.attach(handle);
            }
        }
        Ok(())
    }

    /// Stops recording and keeps the artifact, if any, as the latest one.
    pub async fn stop_recording(&mut self) -> Result<Option<Arc<RecordingArtifact>>, JournalError> {
        let artifact = self.recorder.stop().await?;
        self.drain_notices();
        if let Some(artifact) = &artifact {
            self.last_artifact = Some(artifact.clone());
        }
        Ok(artifact)
    }

    pub async fn recording_status(&mut self) -> RecordingStatus {
        let status = self.recorder.status().await;
        // Anything finalized before the reply is already queued.
        self.drain_notices();
        status
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionNotice> {
        self.recorder.subscribe()
    }

    /// Writes the latest artifact to `dir`, defaulting to the recordings directory.
    /// Returns `None` when nothing has been recorded yet.
    pub fn save_last_artifact(&mut self, dir: Option<&Path>) -> Result<Option<PathBuf>, JournalError> {
        self.drain_notices();
        let Some(artifact) = &self.last_artifact else {
            return Ok(None);
        };
        let dir = dir.map_or_else(get_recordings_dir, Path::to_path_buf);
        Ok(Some(artifact.save_to(&dir)?))
    }

    /// Feeds the player's clock into the editor and the caption tracker.
    pub fn on_playback_time<V: CaptionViewport + ?Sized>(&mut self, seconds: f64, viewport: &mut V) -> bool {
        if let Some(editor) = self.editor.as_mut() {
            editor.set_playback_time(seconds);
        }
        self.tracker.on_time_update(seconds, viewport)
    }

    pub fn edit(&mut self, content: impl Into<String>) {
        if let Some(editor) = self.editor.as_mut() {
            editor.edit(content);
        }
    }

    /// Saves now. No-op before a journal is loaded.
    pub async fn save(&mut self) -> Result<(), JournalError> {
        let Some(editor) = self.editor.as_mut() else {
            return Ok(());
        };
        let playback_time = editor.playback_time();
        editor.save(self.store.as_ref(), playback_time).await
    }

    pub async fn autosave(&mut self, now: Instant) -> Result<bool, JournalError> {
        match self.editor.as_mut() {
            Some(editor) => editor.autosave(self.store.as_ref(), now).await,
            None => Ok(false),
        }
    }

    pub async fn refresh_transcript(&mut self) -> Result<(), JournalError> {
        let Some(editor) = self.editor.as_mut() else {
            return Ok(());
        };
        editor.refresh_transcript(self.store.as_ref()).await?;
        self.tracker.set_segments(editor.captions());
        Ok(())
    }

    /// Stops any recording, detaches the preview and releases the devices. Idempotent.
    pub async fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        // Drop stale notices so an Idle seen while finalizing belongs to this session.
        self.drain_notices();
        if self.recording_active().await {
            match self.recorder.stop().await {
                Ok(Some(artifact)) => self.last_artifact = Some(artifact),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(target: "recorder", "[STUDIO] Stopping recording on teardown failed: {}", e);
                }
            }
        }
        // A stop issued while the surface was ending finds the session already finalizing.
        if self.recorder.status().await.phase == RecordingPhase::Finalizing {
            self.await_finalized().await;
        }
        self.drain_notices();

        self.preview.hide();
        self.devices.lock().await.release();
        tracing::info!(target: "recorder", "[STUDIO] Torn down");
    }

    async fn recording_active(&self) -> bool {
        self.recorder.status().await.phase != RecordingPhase::Idle
    }

    /// Keeps artifacts the coordinator finalized on its own, e.g. after the shared surface ended.
    fn drain_notices(&mut self) {
        loop {
            match self.notices.try_recv() {
                Ok(notice) => {
                    self.observe(notice);
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(target: "recorder", "[STUDIO] Skipped {} recorder notices", skipped);
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
    }

    async fn await_finalized(&mut self) {
        let wait = async {
            loop {
                match self.notices.recv().await {
                    Ok(notice) => {
                        if self.observe(notice) == Some(RecordingPhase::Idle) {
                            return;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(target: "recorder", "[STUDIO] Skipped {} recorder notices", skipped);
                    }
                    Err(RecvError::Closed) => return,
                }
            }
        };

        if tokio::time::timeout(FINALIZE_TIMEOUT, wait).await.is_err() {
            tracing::warn!(target: "recorder",
                "[STUDIO] Recording still finalizing after {:?}, tearing down anyway", FINALIZE_TIMEOUT);
        }
    }

    /// Returns the phase carried by a state change.
    fn observe(&mut self, notice: SessionNotice) -> Option<RecordingPhase> {
        match notice {
            SessionNotice::ArtifactReady(artifact) => {
                tracing::debug!(target: "recorder", "[STUDIO] Kept artifact {}", artifact.file_name());
                self.last_artifact = Some(artifact);
                None
            }
            SessionNotice::StateChanged(status) => Some(status.phase),
            SessionNotice::Error(_) => None,
        }
    }

    pub fn preview(&self) -> &PreviewSurface {
        &self.preview
    }

    pub fn editor(&self) -> Option<&EditorSession> {
        self.editor.as_ref()
    }

    pub fn tracker(&self) -> &ActiveCaptionTracker {
        &self.tracker
    }

    pub fn devices(&self) -> &SharedDevices<H> {
        &self.devices
    }

    pub fn last_artifact(&mut self) -> Option<&Arc<RecordingArtifact>> {
        self.drain_notices();
        self.last_artifact.as_ref()
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }
}
