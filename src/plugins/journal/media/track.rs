//! Shared media track and stream handles.
//!
//! A track is reference counted: cloning a `MediaTrack` yields another handle to
//! the same underlying source, so stopping any clone stops them all.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    Live,
    Ended,
}

#[derive(Debug)]
struct TrackInner {
    id: String,
    kind: TrackKind,
    label: String,
    device_id: Option<String>,
    enabled: AtomicBool,
    state: watch::Sender<TrackState>,
}

#[derive(Debug, Clone)]
pub struct MediaTrack {
    inner: Arc<TrackInner>,
}

impl MediaTrack {
    pub fn new(kind: TrackKind, label: impl Into<String>, device_id: Option<String>) -> Self {
        let (state, _) = watch::channel(TrackState::Live);
        Self {
            inner: Arc::new(TrackInner {
                id: uuid::Uuid::new_v4().to_string(),
                kind,
                label: label.into(),
                device_id,
                enabled: AtomicBool::new(true),
                state,
            }),
        }
    }

    pub fn audio(label: impl Into<String>, device_id: Option<String>) -> Self {
        Self::new(TrackKind::Audio, label, device_id)
    }

    pub fn video(label: impl Into<String>, device_id: Option<String>) -> Self {
        Self::new(TrackKind::Video, label, device_id)
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn kind(&self) -> TrackKind {
        self.inner.kind
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Device the host actually bound, if it reports one.
    pub fn device_id(&self) -> Option<&str> {
        self.inner.device_id.as_deref()
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Relaxed)
    }

    /// Enables or disables the track without releasing the source.
    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn state(&self) -> TrackState {
        *self.inner.state.borrow()
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == TrackState::Ended
    }

    /// Ends the track. Idempotent.
    pub fn stop(&self) {
        self.inner.state.send_if_modified(|state| {
            if *state == TrackState::Ended {
                false
            } else {
                *state = TrackState::Ended;
                true
            }
        });
    }

    /// Resolves once the track has ended, whoever ended it.
    pub async fn ended(&self) {
        let mut rx = self.inner.state.subscribe();
        let _ = rx.wait_for(|state| *state == TrackState::Ended).await;
    }

    pub fn same_track(&self, other: &MediaTrack) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// An ordered set of tracks delivered together by the host.
#[derive(Debug, Clone, Default)]
pub struct MediaStream {
    tracks: Vec<MediaTrack>,
}

impl MediaStream {
    pub fn new(tracks: Vec<MediaTrack>) -> Self {
        Self { tracks }
    }

    pub fn add_track(&mut self, track: MediaTrack) {
        self.tracks.push(track);
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Audio)
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Video)
    }

    pub fn first_video_track(&self) -> Option<&MediaTrack> {
        self.video_tracks().next()
    }

    pub fn has_audio(&self) -> bool {
        self.audio_tracks().next().is_some()
    }

    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }

    pub fn all_stopped(&self) -> bool {
        self.tracks.iter().all(MediaTrack::is_stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_is_shared_between_clones() {
        let track = MediaTrack::audio("mic", Some("mic-1".into()));
        let clone = track.clone();

        clone.stop();
        assert!(track.is_stopped());

        // idempotent
        track.stop();
        assert_eq!(track.state(), TrackState::Ended);
    }

    #[test]
    fn test_disable_does_not_stop() {
        let track = MediaTrack::audio("mic", None);
        track.set_enabled(false);

        assert!(!track.is_enabled());
        assert!(!track.is_stopped());
    }

    #[test]
    fn test_stream_filters_by_kind() {
        let stream = MediaStream::new(vec![
            MediaTrack::video("cam", Some("cam-1".into())),
            MediaTrack::audio("mic", Some("mic-1".into())),
        ]);

        assert_eq!(stream.audio_tracks().count(), 1);
        assert_eq!(stream.first_video_track().and_then(|t| t.device_id()), Some("cam-1"));
        assert!(stream.has_audio());

        stream.stop_all();
        assert!(stream.all_stopped());
    }

    #[tokio::test]
    async fn test_ended_resolves_after_stop() {
        let track = MediaTrack::video("screen", None);
        let waiter = track.clone();

        let handle = tokio::spawn(async move { waiter.ended().await });
        track.stop();

        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_ended_resolves_immediately_when_already_stopped() {
        let track = MediaTrack::video("screen", None);
        track.stop();
        track.ended().await;
    }
}
