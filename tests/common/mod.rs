#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use journal_capture_lib::plugins::journal::media::{
    DeviceKind, DisplayMediaConstraints, EncoderBackend, EncoderSession, EncoderSink, HostError,
    MediaDeviceDescriptor, MediaHost, MediaStream, MediaTrack, UserMediaConstraints,
};
use journal_capture_lib::plugins::journal::persistence::{JournalRecord, JournalStore, UpdateJournal};
use journal_capture_lib::plugins::journal::types::MIME_CANDIDATES;
use journal_capture_lib::plugins::journal::JournalError;

/// Media host with two cameras and two microphones. Counts every prompt.
pub struct FakeHost {
    devices: Vec<MediaDeviceDescriptor>,
    user_media_calls: AtomicUsize,
    display_calls: AtomicUsize,
    user_media_failures: Mutex<VecDeque<HostError>>,
    display_failures: Mutex<VecDeque<HostError>>,
    display_constraints: Mutex<Vec<DisplayMediaConstraints>>,
    displays: Mutex<Vec<MediaStream>>,
    user_streams: Mutex<Vec<MediaStream>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            devices: vec![
                MediaDeviceDescriptor::new("cam-1", DeviceKind::Camera, "Front camera"),
                MediaDeviceDescriptor::new("cam-2", DeviceKind::Camera, "USB camera"),
                MediaDeviceDescriptor::new("mic-1", DeviceKind::Microphone, "Built-in mic"),
                MediaDeviceDescriptor::new("mic-2", DeviceKind::Microphone, "Headset"),
            ],
            user_media_calls: AtomicUsize::new(0),
            display_calls: AtomicUsize::new(0),
            user_media_failures: Mutex::new(VecDeque::new()),
            display_failures: Mutex::new(VecDeque::new()),
            display_constraints: Mutex::new(Vec::new()),
            displays: Mutex::new(Vec::new()),
            user_streams: Mutex::new(Vec::new()),
        }
    }

    /// The next `get_user_media` call fails with `error`.
    pub fn fail_next_user_media(&self, error: HostError) {
        self.user_media_failures.lock().unwrap().push_back(error);
    }

    /// The next `get_display_media` call fails with `error`.
    pub fn fail_next_display(&self, error: HostError) {
        self.display_failures.lock().unwrap().push_back(error);
    }

    pub fn user_media_calls(&self) -> usize {
        self.user_media_calls.load(Ordering::SeqCst)
    }

    pub fn display_calls(&self) -> usize {
        self.display_calls.load(Ordering::SeqCst)
    }

    pub fn display_constraints(&self) -> Vec<DisplayMediaConstraints> {
        self.display_constraints.lock().unwrap().clone()
    }

    pub fn last_display(&self) -> Option<MediaStream> {
        self.displays.lock().unwrap().last().cloned()
    }

    pub fn user_streams(&self) -> Vec<MediaStream> {
        self.user_streams.lock().unwrap().clone()
    }
}

impl MediaHost for FakeHost {
    async fn enumerate_devices(&self) -> Result<Vec<MediaDeviceDescriptor>, HostError> {
        Ok(self.devices.clone())
    }

    async fn get_user_media(&self, constraints: UserMediaConstraints) -> Result<MediaStream, HostError> {
        self.user_media_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.user_media_failures.lock().unwrap().pop_front() {
            return Err(error);
        }

        let camera = constraints.camera_id.unwrap_or_else(|| "cam-1".to_string());
        let mic = constraints.mic_id.unwrap_or_else(|| "mic-1".to_string());
        let stream = MediaStream::new(vec![
            MediaTrack::video(format!("camera {}", camera), Some(camera)),
            MediaTrack::audio(format!("mic {}", mic), Some(mic)),
        ]);
        self.user_streams.lock().unwrap().push(stream.clone());
        Ok(stream)
    }

    async fn get_display_media(&self, constraints: DisplayMediaConstraints) -> Result<MediaStream, HostError> {
        self.display_calls.fetch_add(1, Ordering::SeqCst);
        self.display_constraints.lock().unwrap().push(constraints);
        if let Some(error) = self.display_failures.lock().unwrap().pop_front() {
            return Err(error);
        }

        let stream = MediaStream::new(vec![
            MediaTrack::video("screen", None),
            MediaTrack::audio("tab audio", None),
        ]);
        self.displays.lock().unwrap().push(stream.clone());
        Ok(stream)
    }
}

/// Encoder that emits `on_start` chunks immediately and `on_stop` chunks when stopped.
///
/// With a deferred stop, `on_stop` chunks wait for `complete_stop`.
pub struct FakeBackend {
    supported: Vec<&'static str>,
    on_start: Vec<Vec<u8>>,
    on_stop: Vec<Vec<u8>>,
    defer_stop: bool,
    stop_requests: Arc<AtomicUsize>,
    starts: AtomicUsize,
    last_stream: Mutex<Option<MediaStream>>,
    last_sink: Mutex<Option<EncoderSink>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::supporting(MIME_CANDIDATES.to_vec())
    }

    pub fn supporting(supported: Vec<&'static str>) -> Self {
        Self {
            supported,
            on_start: Vec::new(),
            on_stop: Vec::new(),
            defer_stop: false,
            stop_requests: Arc::new(AtomicUsize::new(0)),
            starts: AtomicUsize::new(0),
            last_stream: Mutex::new(None),
            last_sink: Mutex::new(None),
        }
    }

    pub fn with_chunks(mut self, on_start: Vec<Vec<u8>>, on_stop: Vec<Vec<u8>>) -> Self {
        self.on_start = on_start;
        self.on_stop = on_stop;
        self
    }

    pub fn with_deferred_stop(mut self) -> Self {
        self.defer_stop = true;
        self
    }

    pub fn stop_requests(&self) -> usize {
        self.stop_requests.load(Ordering::SeqCst)
    }

    /// Flushes the `on_stop` chunks and reports the encoder stopped.
    pub fn complete_stop(&self) {
        if let Some(sink) = self.last_sink.lock().unwrap().as_ref() {
            for chunk in &self.on_stop {
                sink.push_chunk(chunk.clone());
            }
            sink.finish();
        }
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn last_stream(&self) -> Option<MediaStream> {
        self.last_stream.lock().unwrap().clone()
    }

    /// Delivers a chunk as if the encoder had flushed mid-recording.
    pub fn push_chunk(&self, data: Vec<u8>) {
        if let Some(sink) = self.last_sink.lock().unwrap().as_ref() {
            sink.push_chunk(data);
        }
    }
}

struct FakeEncoderSession {
    sink: EncoderSink,
    on_stop: Vec<Vec<u8>>,
    defer_stop: bool,
    stop_requests: Arc<AtomicUsize>,
    active: bool,
}

impl EncoderSession for FakeEncoderSession {
    fn stop(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        self.stop_requests.fetch_add(1, Ordering::SeqCst);
        if self.defer_stop {
            return;
        }
        for chunk in self.on_stop.drain(..) {
            self.sink.push_chunk(chunk);
        }
        self.sink.finish();
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

impl EncoderBackend for FakeBackend {
    fn is_type_supported(&self, mime_type: &str) -> bool {
        self.supported.contains(&mime_type)
    }

    async fn start(
        &self,
        stream: &MediaStream,
        _mime_type: &str,
        _flush_interval: Duration,
        sink: EncoderSink,
    ) -> Result<Box<dyn EncoderSession>, HostError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        *self.last_stream.lock().unwrap() = Some(stream.clone());
        *self.last_sink.lock().unwrap() = Some(sink.clone());

        for chunk in &self.on_start {
            sink.push_chunk(chunk.clone());
        }

        Ok(Box::new(FakeEncoderSession {
            sink,
            on_stop: self.on_stop.clone(),
            defer_stop: self.defer_stop,
            stop_requests: self.stop_requests.clone(),
            active: true,
        }))
    }
}

/// In-memory journal service.
pub struct FakeStore {
    record: Mutex<JournalRecord>,
    refreshed_caption: Option<serde_json::Value>,
    pub updates: Mutex<Vec<UpdateJournal>>,
}

impl FakeStore {
    pub fn new(record: serde_json::Value) -> Self {
        Self {
            record: Mutex::new(serde_json::from_value(record).unwrap()),
            refreshed_caption: None,
            updates: Mutex::new(Vec::new()),
        }
    }

    /// Caption payload the record carries after a transcript refresh.
    pub fn with_refreshed_caption(mut self, caption: serde_json::Value) -> Self {
        self.refreshed_caption = Some(caption);
        self
    }
}

impl JournalStore for FakeStore {
    async fn get_journal(&self, id: &str) -> Result<JournalRecord, JournalError> {
        let record = self.record.lock().unwrap().clone();
        if record.id != id {
            return Err(JournalError::persistence(404, "Journal not found"));
        }
        Ok(record)
    }

    async fn update_journal(&self, id: &str, update: &UpdateJournal) -> Result<JournalRecord, JournalError> {
        let mut record = self.record.lock().unwrap();
        if record.id != id {
            return Err(JournalError::persistence(404, "Journal not found"));
        }
        record.content = Some(update.content.clone());
        record.video_timestamp = Some(update.video_timestamp as f64);
        self.updates.lock().unwrap().push(update.clone());
        Ok(record.clone())
    }

    async fn refresh_transcript(&self, _id: &str) -> Result<(), JournalError> {
        if let Some(caption) = &self.refreshed_caption {
            self.record.lock().unwrap().caption = Some(caption.clone());
        }
        Ok(())
    }
}

pub fn all_stopped(stream: &MediaStream) -> bool {
    stream.tracks().iter().all(MediaTrack::is_stopped)
}
