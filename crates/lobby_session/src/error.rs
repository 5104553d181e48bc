use std::time::Duration;

use thiserror::Error;

use crate::member::MemberId;
use crate::phase::{SessionPhase, SessionTrigger};

/// Why a locally requested transition was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GuardFailure {
    #[error("local member is not the leader")]
    NotLeader,
    #[error("not every member is ready")]
    NotAllReady,
    #[error("no member holds the leader role")]
    NoLeaderPresent,
    #[error("another transition is still in flight")]
    TransitionInProgress,
    #[error("no transition for this trigger")]
    NoSuchEdge,
}

/// Recoverable session faults.
///
/// None of these abort the session; they are logged and dispatched as
/// [`SessionEvent::Fault`](crate::SessionEvent::Fault).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("directory reports member id {0} more than once")]
    DuplicateMemberId(MemberId),

    #[error("member {member} has slot index {slot}, configured slots are 1..={slots}")]
    InvalidSlotIndex {
        member: MemberId,
        slot: u32,
        slots: usize,
    },

    #[error("{members} member(s) present but none is the leader")]
    NoLeaderPresent { members: usize },

    #[error("scene `{scene}` did not finish loading within {waited:?}")]
    SceneSignalTimeout { scene: String, waited: Duration },

    #[error("{trigger:?} rejected in {phase:?}: {reason}")]
    TransitionRejected {
        trigger: SessionTrigger,
        phase: SessionPhase,
        reason: GuardFailure,
    },

    #[error("local member is not part of the directory")]
    LocalMemberMissing,

    #[error("ready state can only be toggled in the lobby (current phase {0:?})")]
    ReadyToggleUnavailable(SessionPhase),
}
