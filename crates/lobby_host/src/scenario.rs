//! Scripted lobby sessions.
//!
//! A scenario stands in for the networking layer and the scene loader: it
//! edits the member directory and feeds commands and scene signals to the
//! session, one step per frame.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use lobby_session::bevy::SessionCommand;
use lobby_session::{Member, MemberId, Region, Relationship};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: String,
    /// Member id of the peer this host plays.
    pub local: MemberId,
    /// Advertised lobby name; nothing is published when unset.
    #[serde(default)]
    pub lobby_name: Option<String>,
    #[serde(default)]
    pub region: Region,
    pub steps: Vec<ScenarioStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScenarioStep {
    Join {
        id: u64,
        name: String,
        slot: u32,
        #[serde(default)]
        leader: bool,
        #[serde(default)]
        relationship: Relationship,
    },
    Leave(u64),
    SetReady {
        id: u64,
        ready: bool,
    },
    Rename {
        id: u64,
        name: String,
    },
    /// Hands the leader role to another member.
    Promote(u64),
    Command(SessionCommand),
    SceneChanged(String),
    SceneLoaded(String),
    /// Idle frames.
    Frames(u32),
}

impl ScenarioStep {
    /// Builds the member a `Join` step adds. `local` marks the host's own
    /// member.
    pub fn member(&self, local: MemberId) -> Option<Member> {
        let Self::Join {
            id,
            name,
            slot,
            leader,
            relationship,
        } = self
        else {
            return None;
        };

        let mut member = Member::new(*id, name.clone(), *slot).with_relationship(*relationship);
        member.is_leader = *leader;
        if member.id == local {
            member = member.local();
        }
        Some(member)
    }
}

impl Scenario {
    pub fn parse(content: &str) -> Result<Self> {
        Ok(ron::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("parsing scenario {}", path.display()))
    }
}
