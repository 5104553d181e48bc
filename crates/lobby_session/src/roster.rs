//! Roster reconciliation.
//!
//! The roster is the local, UI-facing mirror of the member directory. Every
//! membership change runs one reconciliation pass that reports which entries
//! have to be created, updated or removed. The UI layer instantiates and
//! destroys its widgets from that report; the roster itself never renders.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::SessionError;
use crate::member::{Member, MemberId, Relationship};
use crate::LOG_ROSTER;

/// How a reconciliation pass decides what to do.
///
/// Stored as the plain strings `"unified"` and `"staged"` so the value reads
/// the same in a section map and in a typed RON struct.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ReconcilePolicy {
    /// Create, update and remove are computed together on every pass.
    #[default]
    Unified,
    /// Count-driven stages: the first pass creates everything, later passes
    /// create missing entries while the roster is shorter than the directory,
    /// then remove stale ones while it is longer, then update once the counts
    /// match.
    ///
    /// A leave and a join within the same pass keep the counts equal, so only
    /// the update stage runs: the newcomer gets no entry and the leaver's
    /// entry stays until the counts diverge again.
    Staged,
}

impl ReconcilePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unified => "unified",
            Self::Staged => "staged",
        }
    }
}

impl TryFrom<String> for ReconcilePolicy {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "unified" => Ok(Self::Unified),
            "staged" => Ok(Self::Staged),
            other => Err(format!(
                "unknown reconcile policy `{other}`, expected `unified` or `staged`"
            )),
        }
    }
}

impl From<ReconcilePolicy> for String {
    fn from(policy: ReconcilePolicy) -> Self {
        policy.as_str().to_owned()
    }
}

/// Local mirror of one [`Member`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: MemberId,
    pub display_name: String,
    pub ready: bool,
    pub is_leader: bool,
    pub is_local: bool,
    pub relationship: Relationship,
    pub slot_index: u32,
}

impl RosterEntry {
    /// Strangers get an "add friend" affordance.
    pub fn offers_friend_request(&self) -> bool {
        self.relationship == Relationship::Stranger
    }

    /// Whether any watched field differs from `member`.
    fn is_stale_for(&self, member: &Member) -> bool {
        self.display_name != member.display_name
            || self.ready != member.ready
            || self.is_leader != member.is_leader
            || self.relationship != member.relationship
    }
}

impl From<&Member> for RosterEntry {
    fn from(m: &Member) -> Self {
        Self {
            id: m.id,
            display_name: m.display_name.clone(),
            ready: m.ready,
            is_leader: m.is_leader,
            is_local: m.is_local,
            relationship: m.relationship,
            slot_index: m.slot_index,
        }
    }
}

/// Outcome of one reconciliation pass.
///
/// `created` and `updated` follow directory order, `removed` follows roster
/// order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileResult {
    pub created: Vec<RosterEntry>,
    pub updated: Vec<RosterEntry>,
    pub removed: Vec<RosterEntry>,
}

impl ReconcileResult {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

/// Fails with [`SessionError::DuplicateMemberId`] on the first repeated id.
pub fn check_unique_ids(directory: &[Member]) -> Result<(), SessionError> {
    let mut seen = HashSet::with_capacity(directory.len());
    for member in directory {
        if !seen.insert(member.id) {
            return Err(SessionError::DuplicateMemberId(member.id));
        }
    }
    Ok(())
}

/// Ordered set of roster entries, keyed by member id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Roster {
    entries: Vec<RosterEntry>,
    populated: bool,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a roster from entries produced by an earlier pass.
    pub fn from_entries(entries: Vec<RosterEntry>) -> Self {
        Self {
            entries,
            populated: true,
        }
    }

    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    pub fn ids(&self) -> impl Iterator<Item = MemberId> + '_ {
        self.entries.iter().map(|e| e.id)
    }

    pub fn get(&self, id: MemberId) -> Option<&RosterEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the first (full) population has happened.
    pub fn is_populated(&self) -> bool {
        self.populated
    }

    /// Drops every entry and forgets the first population.
    pub fn clear(&mut self) -> Vec<RosterEntry> {
        self.populated = false;
        std::mem::take(&mut self.entries)
    }

    /// Computes the pass without touching the roster.
    pub fn diff(
        &self,
        directory: &[Member],
        policy: ReconcilePolicy,
    ) -> Result<ReconcileResult, SessionError> {
        check_unique_ids(directory)?;
        let result = match policy {
            ReconcilePolicy::Unified => self.diff_unified(directory),
            ReconcilePolicy::Staged => self.diff_staged(directory),
        };
        Ok(result)
    }

    /// Applies a result produced by [`Roster::diff`] against this roster.
    pub fn apply(&mut self, result: &ReconcileResult) {
        if !result.removed.is_empty() {
            let gone: HashSet<MemberId> = result.removed.iter().map(|e| e.id).collect();
            self.entries.retain(|e| !gone.contains(&e.id));
        }
        for updated in &result.updated {
            if let Some(entry) = self.entries.iter_mut().find(|e| e.id == updated.id) {
                *entry = updated.clone();
            }
        }
        self.entries.extend(result.created.iter().cloned());
        self.populated = true;
    }

    /// Diffs against `directory` and applies the outcome.
    ///
    /// On a duplicate id the roster is left exactly as it was.
    pub fn reconcile(
        &mut self,
        directory: &[Member],
        policy: ReconcilePolicy,
    ) -> Result<ReconcileResult, SessionError> {
        let result = match self.diff(directory, policy) {
            Ok(result) => result,
            Err(e) => {
                warn!(target: LOG_ROSTER, "reconciliation aborted, keeping previous roster: {e}");
                return Err(e);
            }
        };
        self.apply(&result);
        debug!(
            target: LOG_ROSTER,
            "reconciled ({policy:?}): {} created, {} updated, {} removed, {} entries",
            result.created.len(),
            result.updated.len(),
            result.removed.len(),
            self.entries.len()
        );
        Ok(result)
    }

    fn diff_unified(&self, directory: &[Member]) -> ReconcileResult {
        let known: HashMap<MemberId, &RosterEntry> =
            self.entries.iter().map(|e| (e.id, e)).collect();

        let mut result = ReconcileResult::default();
        for member in directory {
            match known.get(&member.id) {
                None => result.created.push(member.into()),
                Some(entry) if entry.is_stale_for(member) => result.updated.push(member.into()),
                Some(_) => {}
            }
        }
        result.removed = self.stale_entries(directory);
        result
    }

    fn diff_staged(&self, directory: &[Member]) -> ReconcileResult {
        let mut result = ReconcileResult::default();

        if !self.populated {
            result.created = directory.iter().map(RosterEntry::from).collect();
            result.removed = self.entries.clone();
            return result;
        }

        let target = directory.len();
        let mut count = self.entries.len();

        if count < target {
            let known: HashSet<MemberId> = self.ids().collect();
            result.created = directory
                .iter()
                .filter(|m| !known.contains(&m.id))
                .map(RosterEntry::from)
                .collect();
            count += result.created.len();
        }

        if count > target {
            result.removed = self.stale_entries(directory);
            count -= result.removed.len();
        }

        if count == target {
            result.updated = directory
                .iter()
                .filter(|m| self.get(m.id).is_some_and(|e| e.is_stale_for(m)))
                .map(RosterEntry::from)
                .collect();
        }

        result
    }

    fn stale_entries(&self, directory: &[Member]) -> Vec<RosterEntry> {
        let present: HashSet<MemberId> = directory.iter().map(|m| m.id).collect();
        self.entries
            .iter()
            .filter(|e| !present.contains(&e.id))
            .cloned()
            .collect()
    }
}
