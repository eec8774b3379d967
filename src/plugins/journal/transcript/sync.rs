//! Playback-time to caption alignment and scroll sync.

use std::sync::Arc;

use super::CaptionSegment;

/// Gap kept between the container's top edge and the active row.
pub const TOP_OFFSET: f64 = 10.0;

/// First segment with `start <= time < end`. Overlaps resolve to the earliest.
pub fn active_segment(segments: &[CaptionSegment], time: f64) -> Option<&CaptionSegment> {
    segments.iter().find(|segment| segment.contains(time))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollBehavior {
    /// Jump without animation.
    Immediate,
    Smooth,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollRequest {
    pub top: f64,
    pub behavior: ScrollBehavior,
}

/// The scrollable caption list as seen by the renderer.
pub trait CaptionViewport {
    fn scroll_top(&self) -> f64;
    fn container_top(&self) -> f64;
    /// Top edge of the row for `segment_id`, in the same coordinates as `container_top`.
    fn row_top(&self, segment_id: &str) -> Option<f64>;
    fn scroll_to(&mut self, request: ScrollRequest);
}

/// Scroll offset that brings a row to [`TOP_OFFSET`] below the container top.
pub fn scroll_target(scroll_top: f64, row_top: f64, container_top: f64) -> f64 {
    (scroll_top + (row_top - container_top) - TOP_OFFSET).max(0.0)
}

/// Tracks the active caption as playback time moves.
#[derive(Debug)]
pub struct ActiveCaptionTracker {
    segments: Arc<[CaptionSegment]>,
    current_time: f64,
    active_id: Option<String>,
}

impl Default for ActiveCaptionTracker {
    fn default() -> Self {
        Self::new(Arc::from(Vec::new()))
    }
}

impl ActiveCaptionTracker {
    pub fn new(segments: Arc<[CaptionSegment]>) -> Self {
        let mut tracker = Self {
            segments,
            current_time: 0.0,
            active_id: None,
        };
        tracker.recompute();
        tracker
    }

    /// Swaps the segment list. Returns true when the active id changed.
    pub fn set_segments(&mut self, segments: Arc<[CaptionSegment]>) -> bool {
        if Arc::ptr_eq(&self.segments, &segments) {
            return false;
        }
        self.segments = segments;
        self.recompute()
    }

    /// Records a new playback time. Returns true when the active id changed.
    pub fn update(&mut self, time: f64) -> bool {
        self.current_time = time;
        self.recompute()
    }

    /// Records a new playback time and scrolls `viewport` when the active caption changed.
    pub fn on_time_update<V: CaptionViewport + ?Sized>(&mut self, time: f64, viewport: &mut V) -> bool {
        let changed = self.update(time);
        if changed {
            self.sync_viewport(viewport);
        }
        changed
    }

    /// Brings the active row into view. No-op when nothing is active or the row is not rendered.
    pub fn sync_viewport<V: CaptionViewport + ?Sized>(&self, viewport: &mut V) {
        let Some(active_id) = self.active_id.as_deref() else {
            return;
        };
        let Some(row_top) = viewport.row_top(active_id) else {
            return;
        };

        let top = scroll_target(viewport.scroll_top(), row_top, viewport.container_top());
        tracing::trace!(target: "transcript", "[SYNC] Scrolling to {} for {}", top, active_id);
        viewport.scroll_to(ScrollRequest {
            top,
            behavior: ScrollBehavior::Immediate,
        });
    }

    pub fn active(&self) -> Option<&CaptionSegment> {
        let id = self.active_id.as_deref()?;
        self.segments.iter().find(|s| s.id == id)
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn segments(&self) -> &Arc<[CaptionSegment]> {
        &self.segments
    }

    fn recompute(&mut self) -> bool {
        let next = active_segment(&self.segments, self.current_time).map(|s| s.id.clone());
        if next == self.active_id {
            return false;
        }
        tracing::debug!(target: "transcript",
            "[SYNC] Active caption {:?} -> {:?} at {:.2}s", self.active_id, next, self.current_time);
        self.active_id = next;
        true
    }
}

/// `m:ss` label for caption rows. Negative and non-finite input renders as `0:00`.
pub fn format_timestamp(seconds: f64) -> String {
    let total = if seconds.is_finite() {
        seconds.floor().max(0.0) as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}
