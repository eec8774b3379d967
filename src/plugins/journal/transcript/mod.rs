//! TranscriptSync - caption normalization and playback alignment.

pub mod payload;
pub mod sync;

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

pub use payload::CaptionPayload;
pub use sync::{
    active_segment, format_timestamp, ActiveCaptionTracker, CaptionViewport, ScrollBehavior,
    ScrollRequest,
};

/// One timed caption line: `[start, end)` in seconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptionSegment {
    pub id: String,
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl CaptionSegment {
    pub fn contains(&self, time: f64) -> bool {
        self.start <= time && time < self.end
    }

    fn is_usable(&self) -> bool {
        !self.text.is_empty()
            && self.start.is_finite()
            && self.end.is_finite()
            && self.start < self.end
    }
}

/// Flattens any known payload shape into segments sorted by start.
///
/// Entries with empty text, non-finite bounds or `end <= start` are dropped.
/// Ties keep payload order.
pub fn normalize(raw: &Value) -> Vec<CaptionSegment> {
    let payload = CaptionPayload::detect(raw);
    let candidates = payload.candidates();
    let total = candidates.len();

    let mut segments: Vec<CaptionSegment> = candidates
        .into_iter()
        .filter(CaptionSegment::is_usable)
        .collect();
    segments.sort_by(|a, b| a.start.total_cmp(&b.start));

    tracing::debug!(target: "transcript",
        "[NORMALIZE] shape={}, kept {}/{} segments", payload.kind(), segments.len(), total);

    segments
}

/// Derives segments once per distinct payload.
///
/// Returns the same `Arc` for equal input, so consumers can compare by pointer
/// to know whether the caption list changed.
#[derive(Debug, Default)]
pub struct CaptionCache {
    source: Option<Value>,
    segments: Option<Arc<[CaptionSegment]>>,
}

impl CaptionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn segments(&mut self, raw: Option<&Value>) -> Arc<[CaptionSegment]> {
        static NULL: Value = Value::Null;
        let raw = raw.unwrap_or(&NULL);

        if let (Some(source), Some(segments)) = (&self.source, &self.segments) {
            if source == raw {
                return segments.clone();
            }
        }

        let segments: Arc<[CaptionSegment]> = normalize(raw).into();
        self.source = Some(raw.clone());
        self.segments = Some(segments.clone());
        segments
    }

    pub fn clear(&mut self) {
        self.source = None;
        self.segments = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_sorts_and_filters() {
        let raw = json!({"segments": [
            {"start": 5, "end": 6, "text": "late"},
            {"start": "oops", "text": "bad start"},
            {"start": 1, "end": 1, "text": "empty span"},
            {"start": 0, "end": 2, "text": "early"},
            {"start": 3, "end": 4, "text": ""}
        ]});

        let segments = normalize(&raw);
        let texts: Vec<&str> = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["early", "late"]);
    }

    #[test]
    fn test_equal_starts_keep_payload_order() {
        let raw = json!({"cues": [
            {"start": 1, "text": "first"},
            {"start": 1, "text": "second"},
            {"start": 0, "text": "zero"}
        ]});

        let texts: Vec<String> = normalize(&raw).into_iter().map(|s| s.text).collect();
        assert_eq!(texts, vec!["zero", "first", "second"]);
    }

    #[test]
    fn test_missing_payload_is_empty() {
        assert!(normalize(&Value::Null).is_empty());
    }

    #[test]
    fn test_cache_reuses_segments_for_equal_payload() {
        let mut cache = CaptionCache::new();
        let raw = json!({"lines": [{"start": 0, "text": "a"}]});

        let first = cache.segments(Some(&raw));
        let second = cache.segments(Some(&raw.clone()));
        assert!(Arc::ptr_eq(&first, &second));

        let changed = json!({"lines": [{"start": 0, "text": "b"}]});
        let third = cache.segments(Some(&changed));
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(third[0].text, "b");
    }
}
