#![cfg(feature = "bevy")]

use bevy::{prelude::*, state::app::StatesPlugin};
use lobby_session::bevy::{
    LobbyMetadata, LobbySession, LobbySessionPlugin, MemberDirectory, SceneChanged, SceneLoaded,
    SessionCommand, SessionState,
};
use lobby_session::metadata::keys;
use lobby_session::{LobbyMetadataStore, Member, MemberId, SessionPhase, SessionSettings};
use test_log::test;

const HOST: MemberId = MemberId::new(1);

fn app() -> App {
    let mut app = App::new();
    app.add_plugins((
        MinimalPlugins,
        StatesPlugin,
        LobbySessionPlugin::new(SessionSettings::default(), HOST),
    ));
    app
}

fn load_scene(app: &mut App, name: &str) {
    app.world_mut().write_message(SceneChanged { name: name.into() });
    app.world_mut().write_message(SceneLoaded { name: name.into() });
    app.update();
    // state changes apply on the following frame
    app.update();
}

fn session_state(app: &App) -> SessionState {
    *app.world().resource::<State<SessionState>>().get()
}

#[test]
fn directory_changes_reach_the_roster() {
    let mut app = app();
    app.world_mut()
        .resource_mut::<MemberDirectory>()
        .join(Member::new(1, "host", 1).leader().local());
    app.update();

    let session = app.world().resource::<LobbySession>();
    assert_eq!(session.roster().len(), 1);
    assert_eq!(session_state(&app), SessionState::PreLobby);

    app.world_mut()
        .resource_mut::<MemberDirectory>()
        .join(Member::new(2, "guest", 2));
    app.update();
    assert_eq!(app.world().resource::<LobbySession>().roster().len(), 2);
}

#[test]
fn lobby_start_and_end_follow_scene_loads() {
    let mut app = app();
    {
        let mut directory = app.world_mut().resource_mut::<MemberDirectory>();
        directory.join(Member::new(1, "host", 1).leader().local());
        directory.join(Member::new(2, "guest", 2));
    }
    app.update();

    load_scene(&mut app, "Lobby");
    assert_eq!(session_state(&app), SessionState::Lobby);
    assert!(app.world().resource::<LobbySession>().controls().scoreboard_visible);

    app.world_mut().write_message(SessionCommand::ToggleReady);
    app.world_mut()
        .resource_mut::<MemberDirectory>()
        .set_ready(MemberId::new(2), true);
    app.update();
    assert!(app.world().resource::<LobbySession>().controls().start_enabled);

    app.world_mut()
        .write_message(SessionCommand::StartGame("Game".into()));
    app.update();
    let status = app.world().resource::<LobbyMetadata>().get(keys::STATUS);
    assert_eq!(status.as_deref(), Some("In-Game"));
    assert_eq!(session_state(&app), SessionState::Lobby);

    load_scene(&mut app, "Game");
    assert_eq!(session_state(&app), SessionState::InGame);
    assert_eq!(
        app.world().resource::<LobbySession>().phase(),
        SessionPhase::InGame
    );

    app.world_mut().write_message(SessionCommand::EndGame);
    app.update();
    load_scene(&mut app, "Lobby");
    assert_eq!(session_state(&app), SessionState::Lobby);
}

#[test]
fn non_leader_cannot_start() {
    let mut app = App::new();
    app.add_plugins((
        MinimalPlugins,
        StatesPlugin,
        LobbySessionPlugin::new(SessionSettings::default(), MemberId::new(2)),
    ));
    {
        let mut directory = app.world_mut().resource_mut::<MemberDirectory>();
        directory.join(Member::new(1, "host", 1).leader().with_ready(true));
        directory.join(Member::new(2, "guest", 2).local());
    }
    app.update();
    load_scene(&mut app, "Lobby");

    app.world_mut().write_message(SessionCommand::ToggleReady);
    app.world_mut()
        .resource_mut::<MemberDirectory>()
        .set_ready(MemberId::new(1), true);
    app.update();
    app.world_mut()
        .write_message(SessionCommand::StartGame("Game".into()));
    app.update();
    app.update();

    let session = app.world().resource::<LobbySession>();
    assert!(!session.is_transitioning());
    assert_eq!(session_state(&app), SessionState::Lobby);
    assert_eq!(app.world().resource::<LobbyMetadata>().get(keys::STATUS), None);
}

#[test]
fn leave_returns_to_pre_lobby_on_menu_load() {
    let mut app = app();
    app.world_mut()
        .resource_mut::<MemberDirectory>()
        .join(Member::new(1, "host", 1).leader().local());
    app.update();
    load_scene(&mut app, "Lobby");

    app.world_mut().write_message(SessionCommand::Leave);
    app.update();
    assert!(app.world().resource::<MemberDirectory>().is_empty());

    load_scene(&mut app, "Main");
    assert_eq!(session_state(&app), SessionState::PreLobby);
    assert!(app.world().resource::<LobbySession>().roster().is_empty());
}
