//! Audio mix graph for recording.
//!
//! Topology is N source nodes feeding one destination node whose output track
//! goes to the encoder. Runtime mute works by disabling a source track: the
//! node stays wired but renders silence. A source that is muted before the
//! graph is built, and does not opt into `include_when_muted`, is never wired.

use super::media::{MediaStream, MediaTrack};

/// One candidate input for [`AudioMixGraph::build`].
#[derive(Debug, Clone)]
pub struct MixSource {
    pub label: String,
    pub stream: MediaStream,
    /// Keep the source wired even if it is muted at build time.
    pub include_when_muted: bool,
    pub muted: bool,
}

impl MixSource {
    pub fn new(label: impl Into<String>, stream: MediaStream) -> Self {
        Self {
            label: label.into(),
            stream,
            include_when_muted: true,
            muted: false,
        }
    }

    /// A source that is dropped from the mix entirely when muted at build time.
    pub fn omit_when_muted(mut self, muted: bool) -> Self {
        self.include_when_muted = false;
        self.muted = muted;
        self
    }
}

#[derive(Debug)]
struct SourceNode {
    label: String,
    tracks: Vec<MediaTrack>,
}

#[derive(Debug)]
pub struct AudioMixGraph {
    context_id: String,
    nodes: Vec<SourceNode>,
    excluded: Vec<String>,
    output: MediaTrack,
    closed: bool,
}

impl AudioMixGraph {
    /// Creates the processing context and wires every eligible source into the destination.
    pub fn build(sources: Vec<MixSource>) -> Self {
        let context_id = uuid::Uuid::new_v4().to_string();
        let mut nodes = Vec::new();
        let mut excluded = Vec::new();

        for source in sources {
            let tracks: Vec<MediaTrack> = source.stream.audio_tracks().cloned().collect();
            if tracks.is_empty() {
                tracing::debug!(target: "recorder", "[MIXER] Skipping '{}': no audio tracks", source.label);
                continue;
            }

            if source.muted && !source.include_when_muted {
                tracing::info!(target: "recorder", "[MIXER] Excluding muted source '{}'", source.label);
                excluded.push(source.label);
                continue;
            }

            nodes.push(SourceNode {
                label: source.label,
                tracks,
            });
        }

        let output = MediaTrack::audio(format!("mix-{}", &context_id[..8]), None);

        tracing::info!(target: "recorder",
            "[MIXER] Graph {} built: active={:?}, excluded={:?}",
            context_id, nodes.iter().map(|n| n.label.as_str()).collect::<Vec<_>>(), excluded);

        Self {
            context_id,
            nodes,
            excluded,
            output,
            closed: false,
        }
    }

    /// The destination node's output track.
    pub fn output_track(&self) -> &MediaTrack {
        &self.output
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    /// Labels of sources wired into the destination. Empty after dispose.
    pub fn active_sources(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.label.as_str()).collect()
    }

    pub fn excluded_sources(&self) -> &[String] {
        &self.excluded
    }

    pub fn is_connected(&self, track: &MediaTrack) -> bool {
        self.nodes
            .iter()
            .flat_map(|n| n.tracks.iter())
            .any(|t| t.same_track(track))
    }

    /// Mixes one block of PCM into `out`.
    ///
    /// `inputs` pairs a source track id with its samples for this block. Tracks
    /// that are disabled, ended or not wired contribute nothing. Output is
    /// clamped to [-1.0, 1.0].
    pub fn render(&self, inputs: &[(&str, &[f32])], out: &mut [f32]) {
        out.fill(0.0);
        if self.closed {
            return;
        }

        for track in self.nodes.iter().flat_map(|n| n.tracks.iter()) {
            if !track.is_enabled() || track.is_stopped() {
                continue;
            }
            let Some((_, samples)) = inputs.iter().find(|(id, _)| *id == track.id()) else {
                continue;
            };
            for (acc, sample) in out.iter_mut().zip(samples.iter()) {
                *acc += *sample;
            }
        }

        for sample in out.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }
    }

    /// Closes the context and disconnects every node. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.nodes.clear();
        self.output.stop();
        tracing::debug!(target: "recorder", "[MIXER] Graph {} closed", self.context_id);
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for AudioMixGraph {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream_with_audio(label: &str) -> (MediaStream, MediaTrack) {
        let track = MediaTrack::audio(label, None);
        (MediaStream::new(vec![track.clone()]), track)
    }

    #[test]
    fn test_muted_source_is_excluded_at_build() {
        let (display, _) = stream_with_audio("display");
        let (mic, mic_track) = stream_with_audio("mic");

        let graph = AudioMixGraph::build(vec![
            MixSource::new("display", display),
            MixSource::new("microphone", mic).omit_when_muted(true),
        ]);

        assert_eq!(graph.active_sources(), vec!["display"]);
        assert_eq!(graph.excluded_sources(), ["microphone".to_string()]);
        assert!(!graph.is_connected(&mic_track));
    }

    #[test]
    fn test_muted_source_with_include_flag_stays_wired() {
        let (mic, mic_track) = stream_with_audio("mic");
        let mut source = MixSource::new("microphone", mic);
        source.muted = true;

        let graph = AudioMixGraph::build(vec![source]);
        assert!(graph.is_connected(&mic_track));
    }

    #[test]
    fn test_sources_without_audio_are_skipped() {
        let video_only = MediaStream::new(vec![MediaTrack::video("screen", None)]);
        let graph = AudioMixGraph::build(vec![MixSource::new("display", video_only)]);

        assert!(graph.active_sources().is_empty());
        assert!(graph.excluded_sources().is_empty());
    }

    #[test]
    fn test_render_sums_and_clamps() {
        let (a, a_track) = stream_with_audio("a");
        let (b, b_track) = stream_with_audio("b");
        let graph = AudioMixGraph::build(vec![MixSource::new("a", a), MixSource::new("b", b)]);

        let a_samples = [0.25, 0.75, -0.5];
        let b_samples = [0.25, 0.75, -0.75];
        let mut out = [0.0; 3];
        graph.render(&[(a_track.id(), &a_samples[..]), (b_track.id(), &b_samples[..])], &mut out);

        assert_eq!(out, [0.5, 1.0, -1.0]);
    }

    #[test]
    fn test_runtime_mute_silences_without_teardown() {
        let (mic, mic_track) = stream_with_audio("mic");
        let graph = AudioMixGraph::build(vec![MixSource::new("microphone", mic).omit_when_muted(false)]);

        mic_track.set_enabled(false);
        let samples = [0.5, 0.5];
        let mut out = [1.0; 2];
        graph.render(&[(mic_track.id(), &samples[..])], &mut out);

        assert_eq!(out, [0.0, 0.0]);
        assert!(graph.is_connected(&mic_track));

        mic_track.set_enabled(true);
        graph.render(&[(mic_track.id(), &samples[..])], &mut out);
        assert_eq!(out, [0.5, 0.5]);
    }

    #[test]
    fn test_dispose_twice_is_noop() {
        let (mic, _) = stream_with_audio("mic");
        let mut graph = AudioMixGraph::build(vec![MixSource::new("microphone", mic)]);

        graph.dispose();
        graph.dispose();

        assert!(graph.is_closed());
        assert!(graph.output_track().is_stopped());
        assert!(graph.active_sources().is_empty());
    }

    #[test]
    fn test_dispose_leaves_source_tracks_running() {
        let (mic, mic_track) = stream_with_audio("mic");
        let graph = AudioMixGraph::build(vec![MixSource::new("microphone", mic)]);

        drop(graph);
        assert!(!mic_track.is_stopped());
    }
}
