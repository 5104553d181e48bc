//! The authoritative list of session participants.
//!
//! The directory is owned by whatever networking layer replicates players.
//! The session core reads it, and writes back exactly one thing: the local
//! member's ready flag.

use tracing::debug;

use crate::error::SessionError;
use crate::member::{Member, MemberId};
use crate::LOG_SESSION;

/// Source of the current member list.
pub trait MemberDirectorySource {
    /// Ordered snapshot of everyone currently in the session.
    fn current_members(&self) -> Vec<Member>;

    /// Sets the local member's ready flag and hands it to the replication
    /// layer. Delivery is the layer's concern; the core does not retry.
    fn set_local_ready(&mut self, ready: bool) -> Result<(), SessionError>;

    /// Asks the networking layer to drop the local member from the session.
    fn request_leave(&mut self);
}

/// Directory kept in memory.
///
/// Used by the Bevy plugin as a resource, by the headless host and by tests.
/// It does not validate what it is fed: a misbehaving transport can report
/// duplicate ids, which the reconciler then has to cope with.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    local: Option<MemberId>,
    members: Vec<Member>,
}

impl InMemoryDirectory {
    pub fn new(local: MemberId) -> Self {
        Self {
            local: Some(local),
            members: Vec::new(),
        }
    }

    pub fn with_members(local: MemberId, members: Vec<Member>) -> Self {
        Self {
            local: Some(local),
            members,
        }
    }

    pub fn local_id(&self) -> Option<MemberId> {
        self.local
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn get(&self, id: MemberId) -> Option<&Member> {
        self.members.iter().find(|m| m.id == id)
    }

    pub fn get_mut(&mut self, id: MemberId) -> Option<&mut Member> {
        self.members.iter_mut().find(|m| m.id == id)
    }

    /// Appends a member in join order.
    pub fn join(&mut self, member: Member) {
        debug!(target: LOG_SESSION, "member {} joined directory", member.id);
        self.members.push(member);
    }

    /// Removes a member, returning it if it was present.
    pub fn leave(&mut self, id: MemberId) -> Option<Member> {
        let index = self.members.iter().position(|m| m.id == id)?;
        debug!(target: LOG_SESSION, "member {id} left directory");
        Some(self.members.remove(index))
    }

    /// Sets any member's ready flag, as a remote peer's replication would.
    pub fn set_ready(&mut self, id: MemberId, ready: bool) -> bool {
        match self.get_mut(id) {
            Some(member) => {
                member.ready = ready;
                true
            }
            None => false,
        }
    }

    pub fn rename(&mut self, id: MemberId, display_name: impl Into<String>) -> bool {
        match self.get_mut(id) {
            Some(member) => {
                member.display_name = display_name.into();
                true
            }
            None => false,
        }
    }

    /// Moves the leader role to `id`. Everyone else loses it.
    pub fn promote(&mut self, id: MemberId) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        for member in &mut self.members {
            member.is_leader = member.id == id;
        }
        true
    }
}

impl MemberDirectorySource for InMemoryDirectory {
    fn current_members(&self) -> Vec<Member> {
        self.members.clone()
    }

    fn set_local_ready(&mut self, ready: bool) -> Result<(), SessionError> {
        let local = self.local.ok_or(SessionError::LocalMemberMissing)?;
        if self.set_ready(local, ready) {
            Ok(())
        } else {
            Err(SessionError::LocalMemberMissing)
        }
    }

    /// Outside the session nobody is visible any more, so the whole view
    /// is dropped along with the local member.
    fn request_leave(&mut self) {
        debug!(target: LOG_SESSION, "leaving, dropping {} member(s)", self.members.len());
        self.members.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> InMemoryDirectory {
        InMemoryDirectory::with_members(
            MemberId::new(1),
            vec![
                Member::new(1, "host", 1).leader().local(),
                Member::new(2, "guest", 2),
            ],
        )
    }

    #[test]
    fn set_local_ready_only_touches_local_member() {
        let mut dir = directory();
        dir.set_local_ready(true).unwrap();
        assert!(dir.get(MemberId::new(1)).unwrap().ready);
        assert!(!dir.get(MemberId::new(2)).unwrap().ready);
    }

    #[test]
    fn set_local_ready_without_local_member_fails() {
        let mut dir = InMemoryDirectory::new(MemberId::new(9));
        dir.join(Member::new(1, "host", 1).leader());
        assert_eq!(
            dir.set_local_ready(true),
            Err(SessionError::LocalMemberMissing)
        );
    }

    #[test]
    fn promote_moves_leader_role() {
        let mut dir = directory();
        assert!(dir.promote(MemberId::new(2)));
        assert!(!dir.get(MemberId::new(1)).unwrap().is_leader);
        assert!(dir.get(MemberId::new(2)).unwrap().is_leader);
        assert!(!dir.promote(MemberId::new(42)));
    }

    #[test]
    fn request_leave_drops_the_view() {
        let mut dir = directory();
        dir.request_leave();
        assert!(dir.is_empty());
        assert_eq!(dir.local_id(), Some(MemberId::new(1)));
    }
}
