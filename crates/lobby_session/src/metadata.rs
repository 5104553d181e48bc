//! Per-lobby key/value metadata and the lobby browser filter.

use std::collections::HashMap;
use std::str::FromStr;

use core::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Well-known metadata keys.
pub mod keys {
    pub const STATUS: &str = "status";
    pub const NAME: &str = "name";
    pub const ACTIVE: &str = "active";
    pub const REGION: &str = "region";
}

/// Most listings a lobby browser query returns.
pub const MAX_LISTING_RESULTS: usize = 100;

/// Key/value data attached to the joined lobby.
pub trait LobbyMetadataStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InMemoryMetadata {
    values: HashMap<String, String>,
}

impl InMemoryMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.set(key, value);
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl LobbyMetadataStore for InMemoryMetadata {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_owned(), value.to_owned());
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} `{value}`")]
pub struct ParseMetadataError {
    kind: &'static str,
    value: String,
}

/// Value of the `status` key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LobbyStatus {
    InLobby,
    InGame,
}

impl LobbyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InLobby => "In-Lobby",
            Self::InGame => "In-Game",
        }
    }
}

impl fmt::Display for LobbyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LobbyStatus {
    type Err = ParseMetadataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "In-Lobby" => Ok(Self::InLobby),
            "In-Game" => Ok(Self::InGame),
            other => Err(ParseMetadataError {
                kind: "lobby status",
                value: other.to_owned(),
            }),
        }
    }
}

/// Matchmaking region. Listings are filtered by exact region.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    #[default]
    World,
    UsEast,
    UsWest,
    SouthAmerica,
    Europe,
    Asia,
    Australia,
    MiddleEast,
    Africa,
}

impl Region {
    pub const ALL: [Region; 9] = [
        Region::World,
        Region::UsEast,
        Region::UsWest,
        Region::SouthAmerica,
        Region::Europe,
        Region::Asia,
        Region::Australia,
        Region::MiddleEast,
        Region::Africa,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::World => "World",
            Self::UsEast => "US-East",
            Self::UsWest => "US-West",
            Self::SouthAmerica => "SouthAmerica",
            Self::Europe => "Europe",
            Self::Asia => "Asia",
            Self::Australia => "Australia",
            Self::MiddleEast => "MiddleEast",
            Self::Africa => "Africa",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = ParseMetadataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| ParseMetadataError {
                kind: "region",
                value: s.to_owned(),
            })
    }
}

/// Publishes the keys a lobby browser filters on.
pub fn advertise(store: &mut impl LobbyMetadataStore, name: &str, region: Region) {
    store.set(keys::NAME, name);
    store.set(keys::REGION, region.as_str());
    store.set(keys::ACTIVE, "true");
    store.set(keys::STATUS, LobbyStatus::InLobby.as_str());
}

/// A lobby as seen by the browser.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LobbyListing {
    pub id: u64,
    pub members: usize,
    pub max_members: usize,
    pub metadata: InMemoryMetadata,
}

impl LobbyListing {
    pub fn name(&self) -> String {
        self.metadata.get(keys::NAME).unwrap_or_default()
    }

    pub fn status(&self) -> Option<LobbyStatus> {
        self.metadata.get(keys::STATUS)?.parse().ok()
    }

    pub fn region(&self) -> Option<Region> {
        self.metadata.get(keys::REGION)?.parse().ok()
    }

    pub fn is_active(&self) -> bool {
        self.metadata.get(keys::ACTIVE).as_deref() == Some("true")
    }

    pub fn open_slots(&self) -> usize {
        self.max_members.saturating_sub(self.members)
    }
}

/// Lobby browser query.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LobbyFilter {
    /// Case-insensitive substring of the lobby name.
    pub name_contains: Option<String>,
    /// Exact region; `World` is a region of its own.
    pub region: Region,
    pub min_open_slots: usize,
}

impl LobbyFilter {
    pub fn matches(&self, listing: &LobbyListing) -> bool {
        if !listing.is_active() || listing.open_slots() < self.min_open_slots {
            return false;
        }
        if listing.region() != Some(self.region) {
            return false;
        }
        match self.name_contains.as_deref() {
            None | Some("") => true,
            Some(needle) => listing
                .name()
                .to_lowercase()
                .contains(&needle.to_lowercase()),
        }
    }

    /// Matching listings in input order, at most [`MAX_LISTING_RESULTS`].
    pub fn apply<'a>(&self, listings: &'a [LobbyListing]) -> Vec<&'a LobbyListing> {
        listings
            .iter()
            .filter(|l| self.matches(l))
            .take(MAX_LISTING_RESULTS)
            .collect()
    }
}
