//! Resources owned by one recording session.
//!
//! Everything here releases itself on drop so a start that fails half way
//! leaves nothing allocated.

use tokio::task::JoinHandle;

use super::super::media::{EncoderSession, MediaStream, MediaTrack};
use super::super::mixer::AudioMixGraph;
use super::super::types::QualityPreset;

/// Screen, window or tab capture for the current recording only.
#[derive(Debug)]
pub struct DisplayStreamHandle {
    stream: MediaStream,
}

impl DisplayStreamHandle {
    pub fn new(stream: MediaStream) -> Self {
        Self { stream }
    }

    pub fn stream(&self) -> &MediaStream {
        &self.stream
    }

    pub fn video_track(&self) -> Option<&MediaTrack> {
        self.stream.first_video_track()
    }

    pub fn release(&self) {
        self.stream.stop_all();
    }
}

impl Drop for DisplayStreamHandle {
    fn drop(&mut self) {
        self.release();
    }
}

/// A session whose encoder has been started.
pub struct ActiveSession {
    pub id: String,
    pub quality: QualityPreset,
    pub mime_type: String,
    pub display: DisplayStreamHandle,
    pub mix: AudioMixGraph,
    /// Display video plus the mixed audio track, as handed to the encoder.
    pub output: MediaStream,
    pub encoder: Option<Box<dyn EncoderSession>>,
    pub surface_watch: Option<JoinHandle<()>>,
}

impl ActiveSession {
    /// Asks the encoder to flush. Returns false when there is no running encoder.
    pub fn stop_encoder(&mut self) -> bool {
        match self.encoder.as_mut() {
            Some(encoder) if encoder.is_active() => {
                encoder.stop();
                true
            }
            _ => false,
        }
    }

    /// Stops display tracks and closes the graph. Safe to call more than once.
    pub fn release(&mut self) {
        // Abort first: stopping the display track would otherwise wake the watcher.
        if let Some(watch) = self.surface_watch.take() {
            watch.abort();
        }
        if let Some(mut encoder) = self.encoder.take() {
            if encoder.is_active() {
                encoder.stop();
            }
        }
        self.display.release();
        self.mix.dispose();
        self.output.stop_all();
    }
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for ActiveSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveSession")
            .field("id", &self.id)
            .field("quality", &self.quality)
            .field("mime_type", &self.mime_type)
            .field("encoder_active", &self.encoder.as_ref().map(|e| e.is_active()))
            .finish_non_exhaustive()
    }
}
