//! UI-facing flags derived from the session state.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::gate::can_start;
use crate::member::{leader_of, Member, MemberId};
use crate::phase::SessionPhase;

/// Caption of the ready toggle: what pressing it will do.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReadyLabel {
    #[default]
    Ready,
    Unready,
}

impl ReadyLabel {
    pub fn for_ready(ready: bool) -> Self {
        if ready {
            Self::Unready
        } else {
            Self::Ready
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "Ready",
            Self::Unready => "Unready",
        }
    }
}

impl fmt::Display for ReadyLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyControls {
    pub scoreboard_visible: bool,
    pub start_visible: bool,
    pub ready_visible: bool,
    pub end_visible: bool,
    pub ready_indicators_visible: bool,
    pub cursor_locked: bool,
    pub start_enabled: bool,
    pub end_enabled: bool,
    pub ready_label: ReadyLabel,
}

impl LobbyControls {
    /// Computes the controls for `local` from scratch.
    pub fn derive(
        phase: SessionPhase,
        transitioning: bool,
        members: &[Member],
        local: MemberId,
    ) -> Self {
        let in_lobby = phase == SessionPhase::Lobby;
        let in_game = phase == SessionPhase::InGame;

        let local_member = members.iter().find(|m| m.id == local);
        let local_leads = leader_of(members).is_some_and(|leader| leader.id == local);
        let may_act = local_leads && !transitioning && phase != SessionPhase::PreLobby;

        Self {
            scoreboard_visible: in_lobby,
            start_visible: in_lobby,
            ready_visible: in_lobby,
            end_visible: in_game,
            ready_indicators_visible: in_lobby,
            cursor_locked: in_game,
            start_enabled: may_act && in_lobby && can_start(members),
            end_enabled: may_act,
            ready_label: ReadyLabel::for_ready(local_member.is_some_and(|m| m.ready)),
        }
    }
}
