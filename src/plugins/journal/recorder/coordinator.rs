//! RecordingCoordinator - single owner actor for the recording lifecycle.
//!
//! The coordinator owns the display stream, the audio graph, the encoder and
//! the chunk buffer, and feeds everything through the state machine.
//!
//! Architecture:
//! - Callers send Commands via [`CoordinatorHandle`]
//! - Stream acquisition runs on its own task and reports back as a WorkerEvent,
//!   so a second `start` during `preparing` is answered immediately instead of queued
//! - The encoder sink and the surface watcher also report as WorkerEvents
//! - Observers receive [`SessionNotice`]s over a broadcast channel

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};

use super::super::devices::SharedDevices;
use super::super::errors::JournalError;
use super::super::media::{
    DisplayMediaConstraints, EncoderBackend, EncoderEvent, EncoderSink, HostError, MediaHost,
    MediaStream,
};
use super::super::mixer::{AudioMixGraph, MixSource};
use super::super::types::{choose_mime_type, QualityPreset, MIME_CANDIDATES};
use super::artifact::RecordingArtifact;
use super::session::{ActiveSession, DisplayStreamHandle};
use super::state::{transition, RecordingEvent, RecordingPhase, RecordingState, SideEffect};

const COMMAND_CAPACITY: usize = 16;
const NOTICE_CAPACITY: usize = 64;

/// Commands sent from callers to the coordinator.
#[derive(Debug)]
pub enum Command {
    Start {
        quality: QualityPreset,
        response_tx: oneshot::Sender<Result<(), JournalError>>,
    },
    Stop {
        response_tx: oneshot::Sender<Result<Option<Arc<RecordingArtifact>>, JournalError>>,
    },
    Status {
        response_tx: oneshot::Sender<RecordingStatus>,
    },
}

/// Events sent from spawned tasks and the encoder back to the coordinator.
enum WorkerEvent {
    Prepared {
        session_id: String,
        result: Result<ActiveSession, JournalError>,
    },
    Encoder {
        session_id: String,
        event: EncoderEvent,
    },
    SurfaceEnded {
        session_id: String,
    },
}

/// Broadcast to observers (UI layer, studio).
#[derive(Debug, Clone)]
pub enum SessionNotice {
    StateChanged(RecordingStatus),
    ArtifactReady(Arc<RecordingArtifact>),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingStatus {
    pub phase: RecordingPhase,
    pub quality: Option<QualityPreset>,
    pub mime_type: Option<String>,
    pub elapsed_seconds: f64,
    pub chunk_count: usize,
    pub bytes_captured: usize,
    /// Labels of the audio sources feeding the mix.
    pub active_sources: Vec<String>,
    pub error: Option<String>,
}

impl RecordingStatus {
    pub fn idle() -> Self {
        Self {
            phase: RecordingPhase::Idle,
            quality: None,
            mime_type: None,
            elapsed_seconds: 0.0,
            chunk_count: 0,
            bytes_captured: 0,
            active_sources: Vec::new(),
            error: None,
        }
    }

    fn unavailable(reason: &str) -> Self {
        Self {
            error: Some(reason.to_string()),
            ..Self::idle()
        }
    }

    pub fn is_recording(&self) -> bool {
        self.phase == RecordingPhase::Recording
    }
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// How often the encoder flushes a chunk.
    pub flush_interval: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            flush_interval: super::super::types::DEFAULT_FLUSH_INTERVAL,
        }
    }
}

pub struct RecordingCoordinator<H: MediaHost, E: EncoderBackend> {
    host: Arc<H>,
    backend: Arc<E>,
    devices: SharedDevices<H>,
    config: CoordinatorConfig,
    state: RecordingState,
    /// Id of the session being prepared or recorded; chunks for other ids are dropped.
    session_id: Option<String>,
    session: Option<ActiveSession>,
    /// Append-only for the lifetime of one session.
    chunks: Vec<Vec<u8>>,
    pending_start_response: Option<oneshot::Sender<Result<(), JournalError>>>,
    pending_stop_response:
        Option<oneshot::Sender<Result<Option<Arc<RecordingArtifact>>, JournalError>>>,
    command_rx: mpsc::Receiver<Command>,
    event_rx: mpsc::UnboundedReceiver<WorkerEvent>,
    event_tx: mpsc::UnboundedSender<WorkerEvent>,
    notice_tx: broadcast::Sender<SessionNotice>,
}

impl<H: MediaHost, E: EncoderBackend> RecordingCoordinator<H, E> {
    pub fn new(
        host: Arc<H>,
        backend: Arc<E>,
        devices: SharedDevices<H>,
        config: CoordinatorConfig,
    ) -> (Self, CoordinatorHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        // Unbounded: the encoder sink is called synchronously from host callbacks.
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (notice_tx, _) = broadcast::channel(NOTICE_CAPACITY);

        let handle = CoordinatorHandle {
            command_tx,
            notice_tx: notice_tx.clone(),
        };

        let coordinator = Self {
            host,
            backend,
            devices,
            config,
            state: RecordingState::Idle,
            session_id: None,
            session: None,
            chunks: Vec::new(),
            pending_start_response: None,
            pending_stop_response: None,
            command_rx,
            event_rx,
            event_tx,
            notice_tx,
        };

        (coordinator, handle)
    }

    /// Spawns the coordinator on the current runtime and returns its handle.
    pub fn spawn(
        host: Arc<H>,
        backend: Arc<E>,
        devices: SharedDevices<H>,
        config: CoordinatorConfig,
    ) -> CoordinatorHandle {
        let (coordinator, handle) = Self::new(host, backend, devices, config);
        tokio::spawn(coordinator.run());
        handle
    }

    /// Main event loop. Exits once every [`CoordinatorHandle`] is dropped.
    pub async fn run(mut self) {
        tracing::info!(target: "recorder", "[COORDINATOR] Starting event loop");

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => {
                        tracing::info!(target: "recorder", "[COORDINATOR] All handles dropped, shutting down");
                        break;
                    }
                },
                Some(event) = self.event_rx.recv() => {
                    self.handle_worker_event(event);
                }
            }
        }

        self.cleanup();
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Start {
                quality,
                response_tx,
            } => self.handle_start(quality, response_tx),
            Command::Stop { response_tx } => self.handle_stop(response_tx),
            Command::Status { response_tx } => {
                let _ = response_tx.send(self.build_status(&self.state));
            }
        }
    }

    fn handle_start(
        &mut self,
        quality: QualityPreset,
        response_tx: oneshot::Sender<Result<(), JournalError>>,
    ) {
        if self.state.is_active() {
            tracing::info!(target: "recorder",
                "[COORDINATOR] Start ignored, session already {:?}", self.state.phase());
            let _ = response_tx.send(Ok(()));
            return;
        }

        self.session_id = Some(uuid::Uuid::new_v4().to_string());
        self.chunks.clear();
        self.pending_start_response = Some(response_tx);

        self.apply(RecordingEvent::StartRequested { quality });
    }

    fn handle_stop(
        &mut self,
        response_tx: oneshot::Sender<Result<Option<Arc<RecordingArtifact>>, JournalError>>,
    ) {
        if !self.state.is_recording() {
            tracing::debug!(target: "recorder",
                "[COORDINATOR] Stop ignored in {:?}", self.state.phase());
            let _ = response_tx.send(Ok(None));
            return;
        }

        self.pending_stop_response = Some(response_tx);
        self.apply(RecordingEvent::StopRequested);
    }

    fn handle_worker_event(&mut self, event: WorkerEvent) {
        let recording_event = match event {
            WorkerEvent::Prepared { session_id, result } => {
                if !self.is_current(&session_id) {
                    // Dropping the result releases whatever it acquired.
                    tracing::warn!(target: "recorder",
                        "[COORDINATOR] Discarding stale session {}", session_id);
                    return;
                }
                match result {
                    Ok(session) => {
                        let mime_type = session.mime_type.clone();
                        self.install(session);
                        RecordingEvent::EncoderStarted { mime_type }
                    }
                    Err(error) => RecordingEvent::AcquisitionFailed { error },
                }
            }
            WorkerEvent::Encoder { session_id, event } => {
                if !self.is_current(&session_id) {
                    return;
                }
                match event {
                    EncoderEvent::Data(chunk) => {
                        if !chunk.is_empty() {
                            self.chunks.push(chunk);
                        }
                        return;
                    }
                    EncoderEvent::Stopped => RecordingEvent::EncoderStopped,
                }
            }
            WorkerEvent::SurfaceEnded { session_id } => {
                if !self.is_current(&session_id) {
                    return;
                }
                tracing::info!(target: "recorder", "[COORDINATOR] Captured surface ended the stream");
                RecordingEvent::SurfaceEnded
            }
        };

        self.apply(recording_event);
    }

    fn is_current(&self, session_id: &str) -> bool {
        self.session_id.as_deref() == Some(session_id)
    }

    fn apply(&mut self, event: RecordingEvent) {
        let (new_state, effects) = transition(self.state.clone(), event);
        self.state = new_state;

        for effect in effects {
            self.execute_effect(effect);
        }
    }

    fn execute_effect(&mut self, effect: SideEffect) {
        match effect {
            SideEffect::AcquireStreams { quality } => self.spawn_prepare(quality),
            SideEffect::ConfirmStart => {
                if let Some(response_tx) = self.pending_start_response.take() {
                    let _ = response_tx.send(Ok(()));
                }
            }
            SideEffect::RejectStart { error } => {
                if let Some(response_tx) = self.pending_start_response.take() {
                    let _ = response_tx.send(Err(error));
                }
            }
            SideEffect::StopEncoder => self.stop_encoder(),
            SideEffect::ReleaseResources => self.release_session(),
            SideEffect::Finalize => self.finalize(),
            SideEffect::EmitStateChange { state } => {
                let status = self.build_status(&state);
                tracing::debug!(target: "recorder", "[COORDINATOR] State change: {:?}", status.phase);
                let _ = self.notice_tx.send(SessionNotice::StateChanged(status));
            }
            SideEffect::EmitError { message } => {
                tracing::error!(target: "recorder", "[COORDINATOR] {}", message);
                let _ = self.notice_tx.send(SessionNotice::Error(message));
            }
        }
    }

    fn spawn_prepare(&mut self, quality: QualityPreset) {
        let Some(session_id) = self.session_id.clone() else {
            tracing::error!(target: "recorder", "[COORDINATOR] No session id for prepare");
            return;
        };

        let sink_tx = self.event_tx.clone();
        let sink_session = session_id.clone();
        let sink = EncoderSink::new(move |event| {
            let _ = sink_tx.send(WorkerEvent::Encoder {
                session_id: sink_session.clone(),
                event,
            });
        });

        let host = self.host.clone();
        let backend = self.backend.clone();
        let devices = self.devices.clone();
        let flush_interval = self.config.flush_interval;
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            let result = prepare(
                host,
                backend,
                devices,
                session_id.clone(),
                quality,
                flush_interval,
                sink,
            )
            .await;
            let _ = event_tx.send(WorkerEvent::Prepared { session_id, result });
        });
    }

    fn install(&mut self, mut session: ActiveSession) {
        if let Some(video) = session.display.video_track().cloned() {
            let event_tx = self.event_tx.clone();
            let session_id = session.id.clone();
            session.surface_watch = Some(tokio::spawn(async move {
                video.ended().await;
                let _ = event_tx.send(WorkerEvent::SurfaceEnded { session_id });
            }));
        }

        tracing::info!(target: "recorder",
            "[COORDINATOR] Recording started: mime={}, quality={}, sources={:?}",
            session.mime_type, session.quality.name(), session.mix.active_sources());

        self.session = Some(session);
    }

    fn stop_encoder(&mut self) {
        tracing::info!(target: "recorder", "[COORDINATOR] Stopping encoder...");

        let stopped = self
            .session
            .as_mut()
            .map(ActiveSession::stop_encoder)
            .unwrap_or(false);

        if !stopped {
            // Nothing will report Stopped on its own; finalize through the normal path.
            if let Some(session_id) = self.session_id.clone() {
                let _ = self.event_tx.send(WorkerEvent::Encoder {
                    session_id,
                    event: EncoderEvent::Stopped,
                });
            }
        }
    }

    fn release_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.release();
        }
        self.session_id = None;
        self.chunks.clear();
    }

    fn finalize(&mut self) {
        let chunks = std::mem::take(&mut self.chunks);
        let mime_type = self
            .session
            .as_ref()
            .map(|s| s.mime_type.clone())
            .unwrap_or_else(|| MIME_CANDIDATES[2].to_string());

        self.release_session();

        let chunk_count = chunks.len();
        let artifact = RecordingArtifact::assemble(chunks, mime_type, Utc::now()).map(Arc::new);

        match &artifact {
            Some(artifact) => {
                tracing::info!(target: "recorder",
                    "[COORDINATOR] Artifact ready: {} ({} chunks, {} bytes)",
                    artifact.file_name(), chunk_count, artifact.size());
                let _ = self
                    .notice_tx
                    .send(SessionNotice::ArtifactReady(artifact.clone()));
            }
            None => {
                tracing::info!(target: "recorder", "[COORDINATOR] No chunks captured, no artifact");
            }
        }

        if let Some(response_tx) = self.pending_stop_response.take() {
            let _ = response_tx.send(Ok(artifact));
        }
    }

    fn build_status(&self, state: &RecordingState) -> RecordingStatus {
        let elapsed_seconds = state.elapsed().map_or(0.0, |d| d.as_secs_f64());
        let chunk_count = self.chunks.len();
        let bytes_captured = self.chunks.iter().map(Vec::len).sum();
        let session_quality = self.session.as_ref().map(|s| s.quality);
        let active_sources: Vec<String> = self
            .session
            .as_ref()
            .map(|s| s.mix.active_sources().into_iter().map(str::to_string).collect())
            .unwrap_or_default();

        match state {
            RecordingState::Idle => RecordingStatus::idle(),
            RecordingState::Preparing { quality, .. } => RecordingStatus {
                phase: RecordingPhase::Preparing,
                quality: Some(*quality),
                elapsed_seconds,
                ..RecordingStatus::idle()
            },
            RecordingState::Recording { mime_type, .. } => RecordingStatus {
                phase: RecordingPhase::Recording,
                quality: session_quality,
                mime_type: Some(mime_type.clone()),
                elapsed_seconds,
                chunk_count,
                bytes_captured,
                active_sources,
                error: None,
            },
            RecordingState::Finalizing { .. } => RecordingStatus {
                phase: RecordingPhase::Finalizing,
                quality: session_quality,
                mime_type: self.session.as_ref().map(|s| s.mime_type.clone()),
                elapsed_seconds,
                chunk_count,
                bytes_captured,
                active_sources,
                error: None,
            },
        }
    }

    fn cleanup(&mut self) {
        tracing::info!(target: "recorder", "[COORDINATOR] Cleaning up resources...");

        self.release_session();
        self.state = RecordingState::Idle;

        if let Some(response_tx) = self.pending_start_response.take() {
            let _ = response_tx.send(Err(JournalError::CoordinatorUnavailable));
        }
        if let Some(response_tx) = self.pending_stop_response.take() {
            let _ = response_tx.send(Err(JournalError::CoordinatorUnavailable));
        }

        tracing::info!(target: "recorder", "[COORDINATOR] Cleanup complete");
    }
}

/// Local stream first, then the display prompt, then graph and encoder.
///
/// Every error is reported as `CaptureUnavailable` except a missing mime
/// type. Resources acquired before a failure are released by their drop
/// impls; the local stream stays with the DeviceManager for the next attempt.
async fn prepare<H: MediaHost, E: EncoderBackend>(
    host: Arc<H>,
    backend: Arc<E>,
    devices: SharedDevices<H>,
    session_id: String,
    quality: QualityPreset,
    flush_interval: Duration,
    sink: EncoderSink,
) -> Result<ActiveSession, JournalError> {
    let (local, mic_muted) = {
        let mut devices = devices.lock().await;
        let local = devices
            .ensure_stream(None, None)
            .await
            .map_err(|e| JournalError::CaptureUnavailable(format!("local stream: {}", e)))?;
        (local, devices.is_mic_muted())
    };

    let display = acquire_display(host.as_ref(), quality).await?;

    let Some(video) = display.video_track().cloned() else {
        return Err(JournalError::CaptureUnavailable(
            "display stream has no video track".to_string(),
        ));
    };

    let mic = MediaStream::new(local.audio_tracks().cloned().collect());
    let mix = AudioMixGraph::build(vec![
        MixSource::new("display", display.stream().clone()),
        MixSource::new("microphone", mic).omit_when_muted(mic_muted),
    ]);

    let output = MediaStream::new(vec![video, mix.output_track().clone()]);

    let mime_type = choose_mime_type(|candidate| backend.is_type_supported(candidate)).ok_or_else(|| {
        JournalError::EncodingUnsupported(format!("none of {:?} accepted", MIME_CANDIDATES))
    })?;

    tracing::debug!(target: "recorder", "[COORDINATOR] Starting encoder with {}", mime_type);

    let encoder = backend
        .start(&output, mime_type, flush_interval, sink)
        .await
        .map_err(|e| JournalError::CaptureUnavailable(format!("encoder: {}", e)))?;

    Ok(ActiveSession {
        id: session_id,
        quality,
        mime_type: mime_type.to_string(),
        display,
        mix,
        output,
        encoder: Some(encoder),
        surface_watch: None,
    })
}

/// Requests the display stream, retrying once with plain constraints when the
/// host rejects the surface hints.
async fn acquire_display<H: MediaHost>(
    host: &H,
    quality: QualityPreset,
) -> Result<DisplayStreamHandle, JournalError> {
    let stream = match host
        .get_display_media(DisplayMediaConstraints::preferred(quality))
        .await
    {
        Ok(stream) => stream,
        Err(HostError::Unsupported(reason)) => {
            tracing::warn!(target: "recorder",
                "[COORDINATOR] Surface hints rejected ({}), retrying with basic constraints", reason);
            host.get_display_media(DisplayMediaConstraints::basic(quality))
                .await
                .map_err(display_error)?
        }
        Err(e) => return Err(display_error(e)),
    };

    Ok(DisplayStreamHandle::new(stream))
}

fn display_error(error: HostError) -> JournalError {
    JournalError::CaptureUnavailable(format!("display: {}", error))
}

/// Handle to send commands to the coordinator.
#[derive(Clone)]
pub struct CoordinatorHandle {
    command_tx: mpsc::Sender<Command>,
    notice_tx: broadcast::Sender<SessionNotice>,
}

impl CoordinatorHandle {
    /// Starts a session. Resolves once the encoder runs; a no-op outside `idle`.
    pub async fn start(&self, quality: QualityPreset) -> Result<(), JournalError> {
        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(Command::Start {
                quality,
                response_tx,
            })
            .await
            .map_err(|_| JournalError::CoordinatorUnavailable)?;

        response_rx
            .await
            .map_err(|_| JournalError::CoordinatorUnavailable)?
    }

    /// Stops the session and waits for the artifact. `None` when nothing was captured
    /// or no recording was running.
    pub async fn stop(&self) -> Result<Option<Arc<RecordingArtifact>>, JournalError> {
        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(Command::Stop { response_tx })
            .await
            .map_err(|_| JournalError::CoordinatorUnavailable)?;

        response_rx
            .await
            .map_err(|_| JournalError::CoordinatorUnavailable)?
    }

    pub async fn status(&self) -> RecordingStatus {
        let (response_tx, response_rx) = oneshot::channel();

        if self
            .command_tx
            .send(Command::Status { response_tx })
            .await
            .is_err()
        {
            return RecordingStatus::unavailable("Coordinator not running");
        }

        response_rx
            .await
            .unwrap_or_else(|_| RecordingStatus::unavailable("Coordinator not responding"))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionNotice> {
        self.notice_tx.subscribe()
    }
}
