//! Session phases and the transition table.
//!
//! ```text
//! PreLobby --JoinedSession--> Lobby --StartRequested--> InGame
//!                               ^                          |
//!                               +-------EndRequested-------+
//! ```
//!
//! Locally requested edges go through [`SessionStateMachine::request`], which
//! checks the guard and marks the machine as transitioning. The phase itself
//! only moves in [`SessionStateMachine::complete`], once the target scene has
//! finished loading.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GuardFailure, SessionError};
use crate::LOG_SESSION;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionPhase {
    #[default]
    PreLobby,
    Lobby,
    InGame,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionTrigger {
    JoinedSession,
    StartRequested,
    EndRequested,
    LeaveRequested,
}

/// Side effects attached to an edge, applied by the session in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Effect {
    SnapshotSeats,
    RevealLobbyControls,
    HideLobbyControls,
    LockSeats,
    UnlockSeats,
    ResetSeats,
    ResetReadiness,
    RemoveLocalMember,
}

/// One row of the transition table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    pub from: SessionPhase,
    pub trigger: SessionTrigger,
    /// Leave keeps the phase; the teardown follows once the menu scene loads.
    pub to: SessionPhase,
    pub effects: &'static [Effect],
}

const ENTER_LOBBY: &[Effect] = &[
    Effect::SnapshotSeats,
    Effect::RevealLobbyControls,
    Effect::LockSeats,
    Effect::ResetReadiness,
];
const START_GAME: &[Effect] = &[Effect::HideLobbyControls, Effect::UnlockSeats];
const END_GAME: &[Effect] = &[
    Effect::ResetSeats,
    Effect::RevealLobbyControls,
    Effect::LockSeats,
    Effect::ResetReadiness,
];
const LEAVE: &[Effect] = &[Effect::RemoveLocalMember];

/// Looks up the edge leaving `from` on `trigger`.
pub fn edge(from: SessionPhase, trigger: SessionTrigger) -> Option<Transition> {
    use SessionPhase::*;
    use SessionTrigger::*;

    let (to, effects) = match (from, trigger) {
        (PreLobby, JoinedSession) => (Lobby, ENTER_LOBBY),
        (Lobby, StartRequested) => (InGame, START_GAME),
        (InGame, EndRequested) => (Lobby, END_GAME),
        (phase, LeaveRequested) => (phase, LEAVE),
        _ => return None,
    };
    Some(Transition {
        from,
        trigger,
        to,
        effects,
    })
}

/// The trigger whose edge would move `from` to `to`.
fn trigger_toward(from: SessionPhase, to: SessionPhase) -> SessionTrigger {
    match (from, to) {
        (_, SessionPhase::InGame) => SessionTrigger::StartRequested,
        (SessionPhase::PreLobby, _) => SessionTrigger::JoinedSession,
        (_, SessionPhase::Lobby) => SessionTrigger::EndRequested,
        (_, SessionPhase::PreLobby) => SessionTrigger::LeaveRequested,
    }
}

/// Facts the start and end guards look at.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GuardContext {
    pub local_is_leader: bool,
    pub leader_present: bool,
    pub all_ready: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Pending {
    trigger: SessionTrigger,
    target: SessionPhase,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionStateMachine {
    phase: SessionPhase,
    pending: Option<Pending>,
}

impl SessionStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_transitioning(&self) -> bool {
        self.pending.is_some()
    }

    /// Phase an authorized request is heading to.
    pub fn pending_target(&self) -> Option<SessionPhase> {
        self.pending.map(|p| p.target)
    }

    /// Checks whether the local member may fire `trigger` right now.
    ///
    /// Leaving is always allowed. Start and end fail closed while another
    /// transition is in flight or while nobody holds the leader role.
    pub fn authorize(
        &self,
        trigger: SessionTrigger,
        guard: GuardContext,
    ) -> Result<Transition, GuardFailure> {
        if trigger != SessionTrigger::LeaveRequested && self.pending.is_some() {
            return Err(GuardFailure::TransitionInProgress);
        }
        let transition = edge(self.phase, trigger).ok_or(GuardFailure::NoSuchEdge)?;

        match trigger {
            SessionTrigger::StartRequested | SessionTrigger::EndRequested => {
                if !guard.leader_present {
                    return Err(GuardFailure::NoLeaderPresent);
                }
                if !guard.local_is_leader {
                    return Err(GuardFailure::NotLeader);
                }
                if trigger == SessionTrigger::StartRequested && !guard.all_ready {
                    return Err(GuardFailure::NotAllReady);
                }
            }
            SessionTrigger::JoinedSession | SessionTrigger::LeaveRequested => {}
        }
        Ok(transition)
    }

    /// Authorizes `trigger` and marks the machine as transitioning.
    ///
    /// The phase is left alone; call [`complete`](Self::complete) once the
    /// target scene is loaded.
    pub fn request(
        &mut self,
        trigger: SessionTrigger,
        guard: GuardContext,
    ) -> Result<Transition, SessionError> {
        let transition =
            self.authorize(trigger, guard)
                .map_err(|reason| SessionError::TransitionRejected {
                    trigger,
                    phase: self.phase,
                    reason,
                })?;
        if transition.to != transition.from {
            self.pending = Some(Pending {
                trigger,
                target: transition.to,
            });
            debug!(target: LOG_SESSION, "{trigger:?} authorized, heading to {:?}", transition.to);
        }
        Ok(transition)
    }

    /// Moves to `target` because its scene finished loading.
    ///
    /// Works for both the peer that requested the change and the peers that
    /// only observe it, so no guard is checked here. Returns `Ok(None)` when
    /// the machine already is in `target`.
    pub fn complete(&mut self, target: SessionPhase) -> Result<Option<Transition>, SessionError> {
        let pending = self.pending.take();
        if target == self.phase {
            return Ok(None);
        }

        let trigger = match pending {
            Some(p) if p.target == target => p.trigger,
            _ => trigger_toward(self.phase, target),
        };
        let transition = edge(self.phase, trigger)
            .filter(|t| t.to == target)
            .ok_or(SessionError::TransitionRejected {
                trigger,
                phase: self.phase,
                reason: GuardFailure::NoSuchEdge,
            })?;

        debug!(target: LOG_SESSION, "{:?} -> {:?} ({trigger:?})", transition.from, transition.to);
        self.phase = transition.to;
        Ok(Some(transition))
    }

    /// Back to `PreLobby`, dropping any in-flight transition.
    pub fn reset(&mut self) {
        self.phase = SessionPhase::PreLobby;
        self.pending = None;
    }
}
