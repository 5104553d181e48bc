//! Session participants as reported by the member directory.

use core::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

id_type!(
    /// Stable connection identifier of a member, unique for the session.
    MemberId
);

/// How the local player relates to a member. Only affects presentation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Relationship {
    /// The member is the local player.
    Myself,
    Friend,
    #[default]
    Stranger,
}

/// One participant of the session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub display_name: String,
    pub ready: bool,
    pub is_leader: bool,
    pub is_local: bool,
    pub relationship: Relationship,
    /// 1-based seat number handed out at join.
    pub slot_index: u32,
}

impl Member {
    /// A non-leader, remote, not-ready stranger sitting in `slot_index`.
    pub fn new(id: u64, display_name: impl Into<String>, slot_index: u32) -> Self {
        Self {
            id: MemberId::new(id),
            display_name: display_name.into(),
            ready: false,
            is_leader: false,
            is_local: false,
            relationship: Relationship::Stranger,
            slot_index,
        }
    }

    pub fn leader(mut self) -> Self {
        self.is_leader = true;
        self
    }

    /// Marks the member as the local player (implies [`Relationship::Myself`]).
    pub fn local(mut self) -> Self {
        self.is_local = true;
        self.relationship = Relationship::Myself;
        self
    }

    pub fn with_ready(mut self, ready: bool) -> Self {
        self.ready = ready;
        self
    }

    pub fn with_relationship(mut self, relationship: Relationship) -> Self {
        self.relationship = relationship;
        self
    }
}

/// Returns the leader of `members`, if any.
pub fn leader_of(members: &[Member]) -> Option<&Member> {
    members.iter().find(|m| m.is_leader)
}

/// Returns the local member of `members`, if any.
pub fn local_of(members: &[Member]) -> Option<&Member> {
    members.iter().find(|m| m.is_local)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_local_relationship() {
        let m = Member::new(7, "me", 1).local().leader();
        assert!(m.is_local);
        assert!(m.is_leader);
        assert_eq!(m.relationship, Relationship::Myself);
        assert!(!m.ready);
    }

    #[test]
    fn finds_leader_and_local() {
        let members = vec![
            Member::new(1, "a", 1),
            Member::new(2, "b", 2).leader(),
            Member::new(3, "c", 3).local(),
        ];
        assert_eq!(leader_of(&members).map(|m| m.id), Some(MemberId::new(2)));
        assert_eq!(local_of(&members).map(|m| m.id), Some(MemberId::new(3)));
        assert!(leader_of(&members[..1]).is_none());
    }
}
