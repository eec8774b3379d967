//! EditorSession - note editing next to the recording, with debounced autosave.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use super::errors::JournalError;
use super::persistence::{JournalRecord, JournalStore, UpdateJournal};
use super::transcript::{CaptionCache, CaptionSegment};

pub const DEFAULT_AUTOSAVE_DELAY: Duration = Duration::from_millis(4000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveState {
    /// Unsaved edits, or the last save failed.
    Save,
    Saving,
    Saved,
}

#[derive(Debug)]
pub struct EditorSession {
    record: JournalRecord,
    content: String,
    last_saved: String,
    state: SaveState,
    playback_time: f64,
    autosave_delay: Duration,
    /// Start of the current debounce window; `None` when nothing is pending.
    last_edit: Option<Instant>,
    captions: CaptionCache,
}

impl EditorSession {
    pub fn new(record: JournalRecord, autosave_delay: Duration) -> Self {
        let content = record.content().to_string();
        Self {
            last_saved: content.clone(),
            content,
            record,
            state: SaveState::Save,
            playback_time: 0.0,
            autosave_delay,
            last_edit: None,
            captions: CaptionCache::new(),
        }
    }

    pub fn record(&self) -> &JournalRecord {
        &self.record
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn save_state(&self) -> SaveState {
        self.state
    }

    pub fn is_dirty(&self) -> bool {
        self.content != self.last_saved
    }

    pub fn playback_time(&self) -> f64 {
        self.playback_time
    }

    pub fn set_playback_time(&mut self, seconds: f64) {
        self.playback_time = seconds;
    }

    /// Replaces the editor content and restarts the autosave debounce.
    pub fn edit(&mut self, content: impl Into<String>) {
        self.content = content.into();
        if self.is_dirty() {
            self.state = SaveState::Save;
            self.last_edit = Some(Instant::now());
        } else {
            self.last_edit = None;
        }
    }

    /// When the pending autosave should fire, if one is pending.
    pub fn autosave_deadline(&self) -> Option<Instant> {
        self.last_edit
            .filter(|_| self.is_dirty())
            .map(|edited| edited + self.autosave_delay)
    }

    pub fn autosave_due(&self, now: Instant) -> bool {
        self.autosave_deadline().is_some_and(|deadline| now >= deadline)
    }

    /// Persists the content with the playback position rounded down to whole seconds.
    ///
    /// Unchanged content is marked saved without a request. On failure the
    /// content is kept and the state returns to `Save`.
    pub async fn save<S: JournalStore>(&mut self, store: &S, playback_time: f64) -> Result<(), JournalError> {
        if self.state == SaveState::Saving {
            return Ok(());
        }
        self.last_edit = None;

        if !self.is_dirty() {
            self.state = SaveState::Saved;
            return Ok(());
        }

        self.state = SaveState::Saving;
        let update = UpdateJournal {
            content: self.content.clone(),
            video_timestamp: whole_seconds(playback_time),
        };

        match store.update_journal(&self.record.id, &update).await {
            Ok(record) => {
                tracing::info!(target: "recorder",
                    "[EDITOR] Saved journal {} at t={}s", record.id, update.video_timestamp);
                self.record = record;
                self.last_saved = update.content;
                self.state = SaveState::Saved;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(target: "recorder", "[EDITOR] Save failed: {}", e);
                self.state = SaveState::Save;
                Err(e)
            }
        }
    }

    /// Saves if the debounce has elapsed. Returns true when a save was attempted.
    pub async fn autosave<S: JournalStore>(&mut self, store: &S, now: Instant) -> Result<bool, JournalError> {
        if !self.autosave_due(now) {
            return Ok(false);
        }
        let playback_time = self.playback_time;
        self.save(store, playback_time).await?;
        Ok(true)
    }

    /// Re-derives captions server side, then reloads the record. Editor content is untouched.
    pub async fn refresh_transcript<S: JournalStore>(&mut self, store: &S) -> Result<(), JournalError> {
        let id = self.record.id.clone();
        store.refresh_transcript(&id).await?;

        let record = store.get_journal(&id).await.map_err(|e| {
            tracing::warn!(target: "transcript",
                "[EDITOR] Transcript refreshed, failed to reload journal {}: {}", id, e);
            e
        })?;

        tracing::info!(target: "transcript", "[EDITOR] Transcript refreshed for journal {}", id);
        self.record = record;
        Ok(())
    }

    /// Caption segments for the current record; stable while the caption payload is unchanged.
    pub fn captions(&mut self) -> Arc<[CaptionSegment]> {
        self.captions.segments(self.record.caption.as_ref())
    }
}

fn whole_seconds(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    }
}
