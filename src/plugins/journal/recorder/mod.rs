pub mod artifact;
pub mod coordinator;
pub mod session;
pub mod state;

pub use artifact::RecordingArtifact;
pub use coordinator::{
    CoordinatorConfig, CoordinatorHandle, RecordingCoordinator, RecordingStatus, SessionNotice,
};
pub use state::{RecordingPhase, RecordingState, StopReason};
