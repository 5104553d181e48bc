//! Spawn slots and member placement.
//!
//! The lobby scene offers a fixed row of spawn slots. On entering the lobby
//! the slots beyond the member limit are switched off and every member is
//! moved to the slot matching its 1-based `slot_index`. Outside of a running
//! game the members are held in place (kinematic).

use tracing::debug;

use crate::error::SessionError;
use crate::member::{Member, MemberId};
use crate::settings::SessionSettings;
use crate::LOG_SCENE;

/// A member sitting on a spawn slot (0-based).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SeatPlacement {
    pub member: MemberId,
    pub slot: usize,
}

/// Current seat state, as the presentation layer should render it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeatPlan {
    /// One flag per spawn slot; `false` means the slot is deactivated.
    pub active_slots: Vec<bool>,
    pub placements: Vec<SeatPlacement>,
    /// Members are frozen while this is set.
    pub kinematic: bool,
}

impl SeatPlan {
    fn empty(spawn_slots: usize) -> Self {
        Self {
            active_slots: vec![true; spawn_slots],
            placements: Vec::new(),
            kinematic: true,
        }
    }

    pub fn slot_of(&self, member: MemberId) -> Option<usize> {
        self.placements
            .iter()
            .find(|p| p.member == member)
            .map(|p| p.slot)
    }

    /// 0-based indices of the switched-off slots.
    pub fn deactivated_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.active_slots
            .iter()
            .enumerate()
            .filter(|(_, active)| !**active)
            .map(|(i, _)| i)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeatLayout {
    spawn_slots: usize,
    member_limit: Option<usize>,
    plan: SeatPlan,
}

impl SeatLayout {
    pub fn new(spawn_slots: usize, member_limit: Option<usize>) -> Self {
        Self {
            spawn_slots,
            member_limit,
            plan: SeatPlan::empty(spawn_slots),
        }
    }

    pub fn from_settings(settings: &SessionSettings) -> Self {
        Self::new(settings.spawn_slots, settings.member_limit)
    }

    pub fn plan(&self) -> &SeatPlan {
        &self.plan
    }

    /// Switches off every slot at or beyond the member limit.
    ///
    /// Without a configured limit the current member count is used.
    pub fn snapshot(&mut self, member_count: usize) {
        let limit = self
            .member_limit
            .unwrap_or(member_count)
            .min(self.spawn_slots);
        for (index, active) in self.plan.active_slots.iter_mut().enumerate() {
            *active = index < limit;
        }
        debug!(target: LOG_SCENE, "{limit} of {} spawn slots active", self.spawn_slots);
    }

    /// Moves every member to `slot_index - 1`.
    ///
    /// A member landing on a switched-off slot (someone who joined after the
    /// snapshot) switches it back on. Members with a slot index outside
    /// `1..=spawn_slots` are skipped and reported; the rest are still placed.
    pub fn place(&mut self, members: &[Member]) -> Vec<SessionError> {
        let mut errors = Vec::new();
        self.plan.placements.clear();

        for member in members {
            let slot = member.slot_index as usize;
            if slot == 0 || slot > self.spawn_slots {
                let err = SessionError::InvalidSlotIndex {
                    member: member.id,
                    slot: member.slot_index,
                    slots: self.spawn_slots,
                };
                errors.push(err);
                continue;
            }
            let slot = slot - 1;
            if let Some(active) = self.plan.active_slots.get_mut(slot) {
                if !*active {
                    debug!(target: LOG_SCENE, "member {} reopens spawn slot {slot}", member.id);
                    *active = true;
                }
            }
            self.plan.placements.push(SeatPlacement {
                member: member.id,
                slot,
            });
        }
        errors
    }

    pub fn lock(&mut self) {
        self.plan.kinematic = true;
    }

    pub fn unlock(&mut self) {
        self.plan.kinematic = false;
    }

    /// Forgets all placements and re-enables every slot.
    pub fn clear(&mut self) {
        self.plan = SeatPlan::empty(self.spawn_slots);
    }
}
