use core::fmt;

use bevy::{prelude::*, state::app::StatesPlugin};
use lobby_session::bevy::{
    LobbyMetadata, LobbySession, LobbySessionPlugin, MemberDirectory, SceneChanged, SceneLoaded,
    SessionNotice, SessionSystems,
};
use lobby_session::metadata::advertise;
use lobby_session::{
    LobbyControls, MemberId, RosterEntry, SessionError, SessionEvent, SessionPhase,
    SessionSettings,
};

use crate::scenario::{Scenario, ScenarioStep};
use crate::LOG_HOST;

/// Outcome of a scenario run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioReport {
    pub name: String,
    pub phase: SessionPhase,
    pub lobby_name: Option<String>,
    pub roster: Vec<RosterEntry>,
    pub controls: LobbyControls,
    pub notices: Vec<SessionEvent>,
    pub frames: u32,
}

impl ScenarioReport {
    pub fn faults(&self) -> impl Iterator<Item = &SessionError> {
        self.notices.iter().filter_map(|n| match n {
            SessionEvent::Fault(err) => Some(err),
            _ => None,
        })
    }
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title: &str = if self.name.is_empty() { "scenario" } else { &self.name };
        writeln!(f, "{title}: {:?} after {} frames", self.phase, self.frames)?;
        if let Some(lobby) = &self.lobby_name {
            writeln!(f, "  lobby: {lobby}")?;
        }
        for entry in &self.roster {
            writeln!(
                f,
                "  [{}] {}{}{}",
                if entry.ready { 'x' } else { ' ' },
                entry.display_name,
                if entry.is_leader { " (leader)" } else { "" },
                if entry.is_local { " (you)" } else { "" },
            )?;
        }
        writeln!(
            f,
            "  start: {}, end: {}, ready button: {}",
            self.controls.start_enabled, self.controls.end_enabled, self.controls.ready_label
        )?;
        for fault in self.faults() {
            writeln!(f, "  fault: {fault}")?;
        }
        Ok(())
    }
}

#[derive(Resource, Default)]
struct NoticeLog(Vec<SessionEvent>);

fn record_notices(mut notices: MessageReader<SessionNotice>, mut log: ResMut<NoticeLog>) {
    log.0.extend(notices.read().map(|n| n.0.clone()));
}

/// Builds the headless app a scenario runs in.
pub fn build_app(settings: SessionSettings, local: MemberId) -> App {
    let mut app = App::new();
    app.add_plugins((
        MinimalPlugins,
        StatesPlugin,
        LobbySessionPlugin::new(settings, local),
    ))
    .init_resource::<NoticeLog>()
    .add_systems(Update, record_notices.after(SessionSystems::Publish));
    app
}

/// Plays `scenario` frame by frame and reports the final session state.
pub fn run(scenario: &Scenario, settings: SessionSettings) -> ScenarioReport {
    let mut app = build_app(settings, scenario.local);

    if let Some(name) = &scenario.lobby_name {
        let mut metadata = app.world_mut().resource_mut::<LobbyMetadata>();
        advertise(&mut metadata.0, name, scenario.region);
    }

    let mut frames = 0;
    for (index, step) in scenario.steps.iter().enumerate() {
        debug!(target: LOG_HOST, "step {index}: {step:?}");
        let idle = apply_step(&mut app, scenario.local, step);
        for _ in 0..idle {
            app.update();
            frames += 1;
        }
    }
    // let the state mirror catch up
    app.update();
    frames += 1;

    let world = app.world();
    let session = world.resource::<LobbySession>();
    let report = ScenarioReport {
        name: scenario.name.clone(),
        phase: session.phase(),
        lobby_name: session.lobby_name(&world.resource::<LobbyMetadata>().0),
        roster: session.roster().entries().to_vec(),
        controls: session.controls().clone(),
        notices: world.resource::<NoticeLog>().0.clone(),
        frames,
    };
    info!(
        target: LOG_HOST,
        "scenario `{}` finished in {:?} with {} fault(s)",
        report.name,
        report.phase,
        report.faults().count()
    );
    report
}

/// Applies one step and returns how many frames to run afterwards.
fn apply_step(app: &mut App, local: MemberId, step: &ScenarioStep) -> u32 {
    let world = app.world_mut();
    match step {
        ScenarioStep::Join { .. } => {
            if let Some(member) = step.member(local) {
                world.resource_mut::<MemberDirectory>().join(member);
            }
        }
        ScenarioStep::Leave(id) => {
            if world
                .resource_mut::<MemberDirectory>()
                .leave(MemberId::new(*id))
                .is_none()
            {
                warn!(target: LOG_HOST, "leave: no member {id}");
            }
        }
        ScenarioStep::SetReady { id, ready } => {
            if !world
                .resource_mut::<MemberDirectory>()
                .set_ready(MemberId::new(*id), *ready)
            {
                warn!(target: LOG_HOST, "set ready: no member {id}");
            }
        }
        ScenarioStep::Rename { id, name } => {
            if !world
                .resource_mut::<MemberDirectory>()
                .rename(MemberId::new(*id), name.clone())
            {
                warn!(target: LOG_HOST, "rename: no member {id}");
            }
        }
        ScenarioStep::Promote(id) => {
            if !world
                .resource_mut::<MemberDirectory>()
                .promote(MemberId::new(*id))
            {
                warn!(target: LOG_HOST, "promote: no member {id}");
            }
        }
        ScenarioStep::Command(command) => {
            world.write_message(command.clone());
        }
        ScenarioStep::SceneChanged(name) => {
            world.write_message(SceneChanged { name: name.clone() });
        }
        ScenarioStep::SceneLoaded(name) => {
            world.write_message(SceneLoaded { name: name.clone() });
        }
        ScenarioStep::Frames(count) => return *count,
    }
    1
}
