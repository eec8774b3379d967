use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Encoder mime types in preference order; the first supported one wins.
pub const MIME_CANDIDATES: [&str; 5] = [
    "video/webm;codecs=vp9,opus",
    "video/webm;codecs=vp8,opus",
    "video/webm",
    "video/mp4;codecs=h264,aac",
    "video/mp4",
];

/// Encoder flushes a chunk at least this often so an interrupted session keeps its data.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(1000);

pub const CAMERA_IDEAL_WIDTH: u32 = 1280;
pub const CAMERA_IDEAL_HEIGHT: u32 = 720;

pub const DISPLAY_FRAME_RATE: u32 = 30;

/// Requested capture resolution for the shared surface.
///
/// Only the request is affected; the host may negotiate lower fidelity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum QualityPreset {
    P1080,
    P1440,
    #[default]
    P2160,
}

impl QualityPreset {
    /// Parses a preset name, falling back to 1080p for unknown names.
    pub fn from_name(name: &str) -> Self {
        match name.trim().trim_end_matches('p') {
            "1440" => QualityPreset::P1440,
            "2160" => QualityPreset::P2160,
            _ => QualityPreset::P1080,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            QualityPreset::P1080 => "1080",
            QualityPreset::P1440 => "1440",
            QualityPreset::P2160 => "2160",
        }
    }

    /// Ideal (width, height) for display capture.
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            QualityPreset::P1080 => (1920, 1080),
            QualityPreset::P1440 => (2560, 1440),
            QualityPreset::P2160 => (3840, 2160),
        }
    }
}

impl From<String> for QualityPreset {
    fn from(value: String) -> Self {
        QualityPreset::from_name(&value)
    }
}

impl From<QualityPreset> for String {
    fn from(value: QualityPreset) -> Self {
        value.name().to_string()
    }
}

/// Picks the first candidate accepted by `is_supported`.
pub fn choose_mime_type(is_supported: impl Fn(&str) -> bool) -> Option<&'static str> {
    MIME_CANDIDATES
        .iter()
        .copied()
        .find(|candidate| is_supported(candidate))
}

/// Container file extension for a negotiated mime type.
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    if mime_type.contains("mp4") {
        "mp4"
    } else {
        "webm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_preset_table() {
        assert_eq!(QualityPreset::P1080.dimensions(), (1920, 1080));
        assert_eq!(QualityPreset::P1440.dimensions(), (2560, 1440));
        assert_eq!(QualityPreset::P2160.dimensions(), (3840, 2160));
    }

    #[test]
    fn test_unknown_preset_falls_back_to_1080() {
        assert_eq!(QualityPreset::from_name("720"), QualityPreset::P1080);
        assert_eq!(QualityPreset::from_name("1440p"), QualityPreset::P1440);

        let parsed: QualityPreset = serde_json::from_str("\"4320\"").unwrap();
        assert_eq!(parsed, QualityPreset::P1080);
        assert_eq!(serde_json::to_string(&QualityPreset::P2160).unwrap(), "\"2160\"");
    }

    #[test]
    fn test_choose_mime_prefers_higher_fidelity() {
        let picked = choose_mime_type(|m| m.starts_with("video/webm"));
        assert_eq!(picked, Some("video/webm;codecs=vp9,opus"));

        let picked = choose_mime_type(|m| m == "video/mp4");
        assert_eq!(picked, Some("video/mp4"));

        assert_eq!(choose_mime_type(|_| false), None);
    }

    #[test]
    fn test_extension_follows_container_family() {
        assert_eq!(extension_for_mime("video/mp4;codecs=h264,aac"), "mp4");
        assert_eq!(extension_for_mime("video/webm;codecs=vp8,opus"), "webm");
    }
}
