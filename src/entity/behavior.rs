//! Artifact state machine
//!
//! Pure functions only: no I/O, no clock, no randomness. Replaying the same
//! log always yields the same state.

use crate::types::{ArtifactCommand, ArtifactEvent, ArtifactReply, ArtifactState, EventRecord};

/// Decide what a command does against the current state.
///
/// Mutating commands return the event to persist together with the reply
/// to send once the event is durable. Queries return no event.
pub fn handle_command(
    state: &ArtifactState,
    command: ArtifactCommand,
) -> (Option<ArtifactEvent>, ArtifactReply) {
    match command {
        ArtifactCommand::SetRead => (Some(ArtifactEvent::Read), ArtifactReply::Okay),
        ArtifactCommand::SetAddedToFeed => (Some(ArtifactEvent::AddedToFeed), ArtifactReply::Okay),
        ArtifactCommand::SetRemovedFromFeed => {
            (Some(ArtifactEvent::RemovedFromFeed), ArtifactReply::Okay)
        }
        ArtifactCommand::IsRead => (None, ArtifactReply::ArtifactRead(state.read)),
        ArtifactCommand::IsInFeed => (None, ArtifactReply::ArtifactInUserFeed(state.in_feed)),
        ArtifactCommand::GetAll => (None, ArtifactReply::AllStates(*state)),
    }
}

/// Fold one event into the state
pub fn apply_event(state: ArtifactState, event: ArtifactEvent) -> ArtifactState {
    match event {
        ArtifactEvent::Read => ArtifactState {
            read: true,
            ..state
        },
        ArtifactEvent::AddedToFeed => ArtifactState {
            in_feed: true,
            ..state
        },
        ArtifactEvent::RemovedFromFeed => ArtifactState {
            in_feed: false,
            ..state
        },
    }
}

/// Outcome of replaying a log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Replayed {
    pub state: ArtifactState,
    /// Sequence number of the last replayed event, 0 for an empty log
    pub last_sequence: u64,
}

/// Errors that halt a replay
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplayError {
    #[error("sequence gap: expected {expected}, found {found}")]
    SequenceGap { expected: u64, found: u64 },
}

/// Rebuild state by folding records from the empty state.
///
/// Records must be contiguous from sequence 1.
pub fn replay(records: &[EventRecord]) -> Result<Replayed, ReplayError> {
    let mut state = ArtifactState::default();
    let mut last_sequence = 0u64;

    for record in records {
        let expected = last_sequence + 1;
        if record.sequence_number != expected {
            return Err(ReplayError::SequenceGap {
                expected,
                found: record.sequence_number,
            });
        }
        state = apply_event(state, record.event_type);
        last_sequence = record.sequence_number;
    }

    Ok(Replayed {
        state,
        last_sequence,
    })
}
