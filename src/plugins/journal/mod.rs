//! Journal recording: local devices, screen capture with a mixed audio track,
//! the note editor and caption sync against playback.

pub mod devices;
pub mod editor;
pub mod errors;
pub mod media;
pub mod mixer;
pub mod persistence;
pub mod preview;
pub mod recorder;
pub mod studio;
pub mod transcript;
pub mod types;

pub use devices::{DeviceList, DeviceManager, LocalStreamHandle, SharedDevices};
pub use editor::{EditorSession, SaveState};
pub use errors::JournalError;
pub use mixer::{AudioMixGraph, MixSource};
pub use persistence::{JournalApi, JournalRecord, JournalStore, UpdateJournal};
pub use preview::PreviewSurface;
pub use recorder::{CoordinatorHandle, RecordingArtifact, RecordingCoordinator, RecordingStatus};
pub use studio::JournalStudio;
pub use transcript::{normalize, CaptionSegment};
pub use types::QualityPreset;
