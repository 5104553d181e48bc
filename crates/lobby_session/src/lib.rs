//! Lobby session core.
//!
//! Keeps a locally held roster of player entries in sync with an
//! authoritative member directory, tracks which phase the session is in
//! (pre-lobby, lobby, in-game) and decides which actions are permitted for
//! the local player.
//!
//! The crate owns no transport and no rendering. Those are reached through
//! three seams:
//! - [`MemberDirectorySource`]: who is connected, plus the local ready flag
//! - [`LobbyMetadataStore`]: per-lobby key/value data (`status`, `name`, ...)
//! - [`SceneSignal`]: which scene is active and whether it finished loading
//!
//! [`SessionContext`] wires the pieces together and reports everything that
//! happens as [`SessionEvent`]s through an [`ObserverRegistry`].
//!
//! # Example
//!
//! ```
//! use lobby_session::{
//!     InMemoryDirectory, Member, MemberId, SceneSnapshot, SessionContext, SessionPhase,
//!     SessionSettings,
//! };
//! use std::time::Duration;
//!
//! let host = MemberId::new(1);
//! let mut directory = InMemoryDirectory::new(host);
//! directory.join(Member::new(1, "host", 1).leader().local());
//!
//! let mut session = SessionContext::new(SessionSettings::default(), host);
//! session.scene_changed("Lobby", Duration::ZERO);
//! session.scene_loaded(&SceneSnapshot::loaded("Lobby"), &mut directory);
//!
//! assert_eq!(session.phase(), SessionPhase::Lobby);
//! assert!(!session.can_start(&directory));
//! ```

pub mod controls;
pub mod directory;
pub mod error;
pub mod events;
pub mod gate;
pub mod member;
pub mod metadata;
pub mod phase;
pub mod roster;
pub mod scene;
pub mod seats;
pub mod session;
pub mod settings;

/// Bevy integration (plugin, states, messages)
#[cfg(feature = "bevy")]
pub mod bevy;

pub use controls::{LobbyControls, ReadyLabel};
pub use directory::{InMemoryDirectory, MemberDirectorySource};
pub use error::{GuardFailure, SessionError};
pub use events::{ObserverHandle, ObserverRegistry, SessionEvent};
pub use gate::{can_start, ready_count};
pub use member::{Member, MemberId, Relationship};
pub use metadata::{
    InMemoryMetadata, LobbyFilter, LobbyListing, LobbyMetadataStore, LobbyStatus, Region,
};
pub use phase::{Effect, SessionPhase, SessionStateMachine, SessionTrigger, Transition};
pub use roster::{ReconcilePolicy, ReconcileResult, Roster, RosterEntry};
pub use scene::{SceneRoute, SceneSignal, SceneSnapshot, SceneWait};
pub use seats::{SeatLayout, SeatPlacement, SeatPlan};
pub use session::{SceneChangeRequest, SessionContext};
pub use settings::{SessionSettings, Settings, SettingsError};

/// Log target for session lifecycle messages.
pub const LOG_SESSION: &str = "lobby/session";
/// Log target for roster reconciliation.
pub const LOG_ROSTER: &str = "lobby/roster";
/// Log target for scene transitions and seat placement.
pub const LOG_SCENE: &str = "lobby/scene";
