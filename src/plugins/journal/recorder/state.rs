//! Pure state machine for the recording lifecycle.
//!
//! This module implements the state machine as a pure function:
//! `(State, Event) -> (NewState, Vec<SideEffect>)`
//!
//! Invalid transitions return the current state with empty effects, which is
//! how a second `start` or a premature `stop` become no-ops.

use std::time::Instant;

use serde::Serialize;

use super::super::errors::JournalError;
use super::super::types::QualityPreset;

/// Recording state machine.
///
/// Each variant carries only the data relevant to that state.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RecordingState {
    /// No session, ready to start.
    #[default]
    Idle,

    /// Start requested; local and display streams are being negotiated.
    Preparing {
        started_at: Instant,
        quality: QualityPreset,
    },

    /// Encoder running and producing chunks.
    Recording {
        started_at: Instant,
        mime_type: String,
    },

    /// Encoder told to stop; waiting for its final chunk.
    Finalizing {
        started_at: Instant,
        stop_requested_at: Instant,
        reason: StopReason,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    /// Caller invoked `stop()`.
    Requested,
    /// The captured surface ended its own stream (shared window or tab closed).
    SurfaceEnded,
}

/// Serializable name of a [`RecordingState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingPhase {
    Idle,
    Preparing,
    Recording,
    Finalizing,
}

impl RecordingState {
    pub fn phase(&self) -> RecordingPhase {
        match self {
            RecordingState::Idle => RecordingPhase::Idle,
            RecordingState::Preparing { .. } => RecordingPhase::Preparing,
            RecordingState::Recording { .. } => RecordingPhase::Recording,
            RecordingState::Finalizing { .. } => RecordingPhase::Finalizing,
        }
    }

    /// Returns true while a session holds resources (anything but Idle).
    pub fn is_active(&self) -> bool {
        !matches!(self, RecordingState::Idle)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, RecordingState::Recording { .. })
    }

    /// Returns the elapsed time since the session started, if applicable.
    pub fn elapsed(&self) -> Option<std::time::Duration> {
        self.started_at().map(|started_at| started_at.elapsed())
    }

    pub fn started_at(&self) -> Option<Instant> {
        match self {
            RecordingState::Preparing { started_at, .. }
            | RecordingState::Recording { started_at, .. }
            | RecordingState::Finalizing { started_at, .. } => Some(*started_at),
            RecordingState::Idle => None,
        }
    }
}

/// Events that can trigger state transitions.
#[derive(Debug, Clone)]
pub enum RecordingEvent {
    StartRequested { quality: QualityPreset },

    /// Streams acquired, graph built and encoder running.
    EncoderStarted { mime_type: String },

    /// Any failure between start and a running encoder.
    AcquisitionFailed { error: JournalError },

    StopRequested,

    /// The display video track ended on its own.
    SurfaceEnded,

    /// The encoder delivered its last chunk.
    EncoderStopped,
}

/// Side effects triggered by state transitions.
///
/// These are returned by `transition()` and executed by the coordinator.
/// The state machine itself never performs I/O.
#[derive(Debug, Clone, PartialEq)]
pub enum SideEffect {
    /// Acquire local stream, then display stream, build the mix and start the encoder.
    AcquireStreams { quality: QualityPreset },

    /// Resolve the pending `start` call with success.
    ConfirmStart,

    /// Resolve the pending `start` call with an error.
    RejectStart { error: JournalError },

    /// Ask the encoder to flush and stop.
    StopEncoder,

    /// Release anything a failed start left behind.
    ReleaseResources,

    /// Release display tracks, close the graph and assemble the artifact.
    Finalize,

    EmitStateChange { state: RecordingState },

    /// User-visible notification.
    EmitError { message: String },
}

/// Pure state transition function.
///
/// Returns the new state and any side effects to execute.
/// Invalid transitions return the current state with an empty effect list.
pub fn transition(state: RecordingState, event: RecordingEvent) -> (RecordingState, Vec<SideEffect>) {
    match (&state, event) {
        // Idle + StartRequested -> Preparing
        (RecordingState::Idle, RecordingEvent::StartRequested { quality }) => {
            let new_state = RecordingState::Preparing {
                started_at: Instant::now(),
                quality,
            };
            let effects = vec![
                SideEffect::EmitStateChange {
                    state: new_state.clone(),
                },
                SideEffect::AcquireStreams { quality },
            ];
            (new_state, effects)
        }

        // Preparing + EncoderStarted -> Recording
        (RecordingState::Preparing { .. }, RecordingEvent::EncoderStarted { mime_type }) => {
            let new_state = RecordingState::Recording {
                started_at: Instant::now(),
                mime_type,
            };
            let effects = vec![
                SideEffect::ConfirmStart,
                SideEffect::EmitStateChange {
                    state: new_state.clone(),
                },
            ];
            (new_state, effects)
        }

        // Preparing + AcquisitionFailed -> Idle (terminal abort, not a pause)
        (RecordingState::Preparing { .. }, RecordingEvent::AcquisitionFailed { error }) => {
            let new_state = RecordingState::Idle;
            let effects = vec![
                SideEffect::ReleaseResources,
                SideEffect::EmitError {
                    message: error.to_string(),
                },
                SideEffect::RejectStart { error },
                SideEffect::EmitStateChange {
                    state: new_state.clone(),
                },
            ];
            (new_state, effects)
        }

        // Recording + StopRequested / SurfaceEnded -> Finalizing
        (RecordingState::Recording { started_at, .. }, RecordingEvent::StopRequested) => {
            finalizing(*started_at, StopReason::Requested)
        }
        (RecordingState::Recording { started_at, .. }, RecordingEvent::SurfaceEnded) => {
            finalizing(*started_at, StopReason::SurfaceEnded)
        }

        // Encoder stopped on its own, or after we asked -> Idle
        (RecordingState::Recording { .. }, RecordingEvent::EncoderStopped)
        | (RecordingState::Finalizing { .. }, RecordingEvent::EncoderStopped) => {
            let new_state = RecordingState::Idle;
            let effects = vec![
                SideEffect::Finalize,
                SideEffect::EmitStateChange {
                    state: new_state.clone(),
                },
            ];
            (new_state, effects)
        }

        // Invalid transition: return current state with no effects
        _ => (state, vec![]),
    }
}

fn finalizing(started_at: Instant, reason: StopReason) -> (RecordingState, Vec<SideEffect>) {
    let new_state = RecordingState::Finalizing {
        started_at,
        stop_requested_at: Instant::now(),
        reason,
    };
    let effects = vec![
        SideEffect::StopEncoder,
        SideEffect::EmitStateChange {
            state: new_state.clone(),
        },
    ];
    (new_state, effects)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording() -> RecordingState {
        RecordingState::Recording {
            started_at: Instant::now(),
            mime_type: "video/webm".to_string(),
        }
    }

    fn preparing() -> RecordingState {
        RecordingState::Preparing {
            started_at: Instant::now(),
            quality: QualityPreset::P1080,
        }
    }

    #[test]
    fn test_idle_to_preparing() {
        let (new_state, effects) = transition(
            RecordingState::Idle,
            RecordingEvent::StartRequested {
                quality: QualityPreset::P1440,
            },
        );

        assert!(matches!(
            new_state,
            RecordingState::Preparing {
                quality: QualityPreset::P1440,
                ..
            }
        ));
        assert_eq!(effects.len(), 2);
        assert!(matches!(effects[0], SideEffect::EmitStateChange { .. }));
        assert_eq!(
            effects[1],
            SideEffect::AcquireStreams {
                quality: QualityPreset::P1440
            }
        );
    }

    #[test]
    fn test_preparing_to_recording() {
        let (new_state, effects) = transition(
            preparing(),
            RecordingEvent::EncoderStarted {
                mime_type: "video/webm;codecs=vp9,opus".to_string(),
            },
        );

        match &new_state {
            RecordingState::Recording { mime_type, .. } => {
                assert_eq!(mime_type, "video/webm;codecs=vp9,opus")
            }
            other => panic!("Expected Recording state, got {:?}", other),
        }
        assert_eq!(effects[0], SideEffect::ConfirmStart);
    }

    #[test]
    fn test_acquisition_failure_aborts_to_idle() {
        let error = JournalError::CaptureUnavailable("denied".to_string());
        let (new_state, effects) = transition(
            preparing(),
            RecordingEvent::AcquisitionFailed {
                error: error.clone(),
            },
        );

        assert_eq!(new_state, RecordingState::Idle);
        assert_eq!(effects[0], SideEffect::ReleaseResources);
        assert!(effects.contains(&SideEffect::RejectStart { error }));
        assert!(effects
            .iter()
            .any(|e| matches!(e, SideEffect::EmitError { .. })));
    }

    #[test]
    fn test_stop_and_surface_end_converge_on_finalizing() {
        let (stopped, effects) = transition(recording(), RecordingEvent::StopRequested);
        assert!(matches!(
            stopped,
            RecordingState::Finalizing {
                reason: StopReason::Requested,
                ..
            }
        ));
        assert_eq!(effects[0], SideEffect::StopEncoder);

        let (ended, effects) = transition(recording(), RecordingEvent::SurfaceEnded);
        assert!(matches!(
            ended,
            RecordingState::Finalizing {
                reason: StopReason::SurfaceEnded,
                ..
            }
        ));
        assert_eq!(effects[0], SideEffect::StopEncoder);
    }

    #[test]
    fn test_finalizing_to_idle_on_encoder_stop() {
        let (finalizing, _) = transition(recording(), RecordingEvent::StopRequested);
        let (new_state, effects) = transition(finalizing, RecordingEvent::EncoderStopped);

        assert_eq!(new_state, RecordingState::Idle);
        assert_eq!(effects[0], SideEffect::Finalize);
    }

    #[test]
    fn test_encoder_stopping_unprompted_still_finalizes() {
        let (new_state, effects) = transition(recording(), RecordingEvent::EncoderStopped);

        assert_eq!(new_state, RecordingState::Idle);
        assert!(effects.contains(&SideEffect::Finalize));
    }

    #[test]
    fn test_start_while_not_idle_is_noop() {
        for state in [preparing(), recording()] {
            let (new_state, effects) = transition(
                state.clone(),
                RecordingEvent::StartRequested {
                    quality: QualityPreset::P1080,
                },
            );
            assert_eq!(new_state.phase(), state.phase());
            assert!(effects.is_empty());
        }
    }

    #[test]
    fn test_stop_while_not_recording_is_noop() {
        let (new_state, effects) = transition(RecordingState::Idle, RecordingEvent::StopRequested);
        assert_eq!(new_state, RecordingState::Idle);
        assert!(effects.is_empty());

        let (new_state, effects) = transition(preparing(), RecordingEvent::StopRequested);
        assert_eq!(new_state.phase(), RecordingPhase::Preparing);
        assert!(effects.is_empty());
    }

    #[test]
    fn test_surface_end_during_finalizing_is_ignored() {
        let (finalizing, _) = transition(recording(), RecordingEvent::StopRequested);
        let (new_state, effects) = transition(finalizing.clone(), RecordingEvent::SurfaceEnded);

        assert_eq!(new_state, finalizing);
        assert!(effects.is_empty());
    }

    #[test]
    fn test_elapsed_counts_from_session_start() {
        assert_eq!(RecordingState::Idle.elapsed(), None);

        let started_at = Instant::now() - std::time::Duration::from_secs(3);
        let state = RecordingState::Recording {
            started_at,
            mime_type: "video/webm".to_string(),
        };

        assert_eq!(state.started_at(), Some(started_at));
        assert!(state.elapsed().unwrap() >= std::time::Duration::from_secs(3));

        let (finalizing, _) = transition(state, RecordingEvent::StopRequested);
        assert_eq!(finalizing.started_at(), Some(started_at));
    }
}
