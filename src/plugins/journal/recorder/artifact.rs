use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::shared::errors::StorageError;
use crate::shared::paths::ensure_dir;

use super::super::types::extension_for_mime;

const FILE_PREFIX: &str = "journal-recording";

/// Finalized recording: the concatenated encoder output plus its container type.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingArtifact {
    data: Vec<u8>,
    mime_type: String,
    captured_at: DateTime<Utc>,
}

impl RecordingArtifact {
    /// Joins chunks in arrival order. Returns `None` when nothing was captured.
    pub fn assemble(
        chunks: Vec<Vec<u8>>,
        mime_type: impl Into<String>,
        captured_at: DateTime<Utc>,
    ) -> Option<Self> {
        if chunks.iter().all(Vec::is_empty) {
            return None;
        }

        Some(Self {
            data: chunks.concat(),
            mime_type: mime_type.into(),
            captured_at,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// `2024-03-05-14-07-09` style UTC stamp used in the download name.
    pub fn timestamp_label(&self) -> String {
        self.captured_at.format("%Y-%m-%d-%H-%M-%S").to_string()
    }

    pub fn extension(&self) -> &'static str {
        extension_for_mime(&self.mime_type)
    }

    pub fn file_name(&self) -> String {
        format!("{}-{}.{}", FILE_PREFIX, self.timestamp_label(), self.extension())
    }

    /// Writes the artifact into `dir` under [`Self::file_name`].
    pub fn save_to(&self, dir: &Path) -> Result<PathBuf, StorageError> {
        ensure_dir(dir).map_err(|e| StorageError::directory(format!("{}: {}", dir.display(), e)))?;

        let path = dir.join(self.file_name());
        std::fs::write(&path, &self.data)?;

        tracing::info!(target: "recorder",
            "[ARTIFACT] Saved {} bytes to {}", self.data.len(), path.display());

        Ok(path)
    }
}
