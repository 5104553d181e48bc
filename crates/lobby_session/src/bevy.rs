#![cfg(feature = "bevy")]

use bevy::prelude::*;
use crossbeam::channel::{unbounded, Receiver};
use serde::{Deserialize, Serialize};

use crate::directory::InMemoryDirectory;
use crate::events::SessionEvent;
use crate::member::MemberId;
use crate::metadata::InMemoryMetadata;
use crate::phase::SessionPhase;
use crate::scene::SceneSnapshot;
use crate::session::SessionContext;
use crate::settings::SessionSettings;
use crate::LOG_SESSION;

/// Runs a [`SessionContext`] inside a Bevy app.
///
/// Requires `StatesPlugin` (or the default plugins) and a `Time` resource.
pub struct LobbySessionPlugin {
    pub settings: SessionSettings,
    pub local_member: MemberId,
}

impl LobbySessionPlugin {
    pub fn new(settings: SessionSettings, local_member: MemberId) -> Self {
        Self {
            settings,
            local_member,
        }
    }
}

impl Plugin for LobbySessionPlugin {
    fn build(&self, app: &mut App) {
        let session = SessionContext::new(self.settings.clone(), self.local_member);

        let (tx, rx) = unbounded();
        session.observers().subscribe(move |event: &SessionEvent| {
            // the receiver lives in a resource for as long as the app does
            let _ = tx.send(event.clone());
        });

        app.insert_resource(LobbySession(session))
            .insert_resource(MemberDirectory(InMemoryDirectory::new(self.local_member)))
            .init_resource::<LobbyMetadata>()
            .insert_resource(SessionInbox(rx))
            .init_state::<SessionState>()
            .add_message::<SessionCommand>()
            .add_message::<SceneChanged>()
            .add_message::<SceneLoaded>()
            .add_message::<SessionNotice>()
            .configure_sets(
                Update,
                (
                    SessionSystems::Reconcile,
                    SessionSystems::Commands,
                    SessionSystems::Scene,
                    SessionSystems::Publish,
                )
                    .chain(),
            )
            .add_systems(
                Update,
                (
                    reconcile_members
                        .in_set(SessionSystems::Reconcile)
                        .run_if(resource_changed::<MemberDirectory>),
                    handle_commands.in_set(SessionSystems::Commands),
                    (track_scene_changes, complete_scene_loads, check_scene_timeout)
                        .chain()
                        .in_set(SessionSystems::Scene),
                    (publish_notices, sync_session_state).in_set(SessionSystems::Publish),
                ),
            );
    }
}

#[derive(Resource, Deref, DerefMut)]
pub struct LobbySession(pub SessionContext);

/// Member directory fed by the networking layer.
#[derive(Resource, Default, Deref, DerefMut)]
pub struct MemberDirectory(pub InMemoryDirectory);

#[derive(Resource, Default, Deref, DerefMut)]
pub struct LobbyMetadata(pub InMemoryMetadata);

#[derive(Resource)]
struct SessionInbox(Receiver<SessionEvent>);

/// Bevy-side mirror of [`SessionPhase`].
#[derive(States, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    PreLobby,
    Lobby,
    InGame,
}

impl From<SessionPhase> for SessionState {
    fn from(phase: SessionPhase) -> Self {
        match phase {
            SessionPhase::PreLobby => Self::PreLobby,
            SessionPhase::Lobby => Self::Lobby,
            SessionPhase::InGame => Self::InGame,
        }
    }
}

#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionSystems {
    Reconcile,
    Commands,
    Scene,
    Publish,
}

/// Local player input.
#[derive(Message, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionCommand {
    ToggleReady,
    /// Start the game in the named scene.
    StartGame(String),
    EndGame,
    Leave,
}

/// The scene loader started switching to `name`.
#[derive(Message, Debug, Clone, PartialEq, Eq)]
pub struct SceneChanged {
    pub name: String,
}

/// `name` finished loading.
#[derive(Message, Debug, Clone, PartialEq, Eq)]
pub struct SceneLoaded {
    pub name: String,
}

/// A [`SessionEvent`] forwarded into the ECS.
#[derive(Message, Debug, Clone, PartialEq, Eq)]
pub struct SessionNotice(pub SessionEvent);

fn reconcile_members(mut session: ResMut<LobbySession>, directory: Res<MemberDirectory>) {
    // faults are dispatched as notices
    let _ = session.membership_changed(&directory.0);
}

fn handle_commands(
    mut commands: MessageReader<SessionCommand>,
    mut session: ResMut<LobbySession>,
    mut directory: ResMut<MemberDirectory>,
    mut metadata: ResMut<LobbyMetadata>,
) {
    for command in commands.read() {
        debug!(target: LOG_SESSION, "command {command:?}");
        match command {
            SessionCommand::ToggleReady => {
                let _ = session.toggle_ready(&mut directory.0);
            }
            SessionCommand::StartGame(scene) => {
                let _ = session.request_start(&directory.0, &mut metadata.0, scene);
            }
            SessionCommand::EndGame => {
                let _ = session.request_end(&directory.0, &mut metadata.0);
            }
            SessionCommand::Leave => {
                session.leave(&mut directory.0);
            }
        }
    }
}

fn track_scene_changes(
    mut changes: MessageReader<SceneChanged>,
    mut session: ResMut<LobbySession>,
    time: Res<Time>,
) {
    for change in changes.read() {
        session.scene_changed(&change.name, time.elapsed());
    }
}

fn complete_scene_loads(
    mut loads: MessageReader<SceneLoaded>,
    mut session: ResMut<LobbySession>,
    mut directory: ResMut<MemberDirectory>,
) {
    for load in loads.read() {
        session.scene_loaded(&SceneSnapshot::loaded(load.name.clone()), &mut directory.0);
    }
}

fn check_scene_timeout(mut session: ResMut<LobbySession>, time: Res<Time>) {
    if session.pending_scene().is_some() {
        session.check_scene_timeout(time.elapsed());
    }
}

fn publish_notices(inbox: Res<SessionInbox>, mut notices: MessageWriter<SessionNotice>) {
    for event in inbox.0.try_iter() {
        notices.write(SessionNotice(event));
    }
}

fn sync_session_state(
    session: Res<LobbySession>,
    state: Res<State<SessionState>>,
    mut next: ResMut<NextState<SessionState>>,
) {
    let phase = SessionState::from(session.phase());
    if *state.get() != phase {
        info!(target: LOG_SESSION, "session state {:?} -> {phase:?}", state.get());
        next.set(phase);
    }
}
