//! The session context: roster, phase, seats and controls in one place.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::controls::LobbyControls;
use crate::directory::MemberDirectorySource;
use crate::error::{GuardFailure, SessionError};
use crate::events::{ObserverRegistry, SessionEvent};
use crate::gate;
use crate::member::{leader_of, Member, MemberId};
use crate::metadata::{keys, LobbyMetadataStore, LobbyStatus};
use crate::phase::{Effect, GuardContext, SessionPhase, SessionStateMachine, SessionTrigger};
use crate::roster::{ReconcileResult, Roster};
use crate::scene::{SceneRoute, SceneSignal, SceneWait};
use crate::seats::{SeatLayout, SeatPlan};
use crate::settings::SessionSettings;
use crate::{LOG_SCENE, LOG_SESSION};

/// Scene the host has to load after an authorized request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneChangeRequest {
    pub scene: String,
    pub trigger: SessionTrigger,
}

/// Session state of one peer.
///
/// The directory and the metadata store are borrowed per call, so the
/// context works the same whether they live in Bevy resources, in a test or
/// behind some other engine.
pub struct SessionContext {
    settings: SessionSettings,
    local: MemberId,
    machine: SessionStateMachine,
    roster: Roster,
    seats: SeatLayout,
    wait: SceneWait,
    controls: LobbyControls,
    /// Last directory snapshot that reconciled cleanly.
    members: Vec<Member>,
    leaderless_reported: bool,
    /// `(member, slot_index)` pairs already reported as unplaceable.
    misplaced_reported: HashSet<(MemberId, u32)>,
    observers: ObserverRegistry<SessionEvent>,
}

impl SessionContext {
    pub fn new(settings: SessionSettings, local: MemberId) -> Self {
        Self {
            seats: SeatLayout::from_settings(&settings),
            wait: SceneWait::new(settings.scene_load_timeout()),
            settings,
            local,
            machine: SessionStateMachine::new(),
            roster: Roster::new(),
            controls: LobbyControls::default(),
            members: Vec::new(),
            leaderless_reported: false,
            misplaced_reported: HashSet::new(),
            observers: ObserverRegistry::new(),
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn local_id(&self) -> MemberId {
        self.local
    }

    pub fn phase(&self) -> SessionPhase {
        self.machine.phase()
    }

    pub fn is_transitioning(&self) -> bool {
        self.machine.is_transitioning()
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn controls(&self) -> &LobbyControls {
        &self.controls
    }

    pub fn seats(&self) -> &SeatPlan {
        self.seats.plan()
    }

    /// Scene the session is currently waiting on.
    pub fn pending_scene(&self) -> Option<&str> {
        self.wait.scene()
    }

    pub fn observers(&self) -> &ObserverRegistry<SessionEvent> {
        &self.observers
    }

    pub fn can_start(&self, directory: &impl MemberDirectorySource) -> bool {
        gate::can_start(&directory.current_members())
    }

    pub fn local_is_leader(&self, directory: &impl MemberDirectorySource) -> bool {
        leader_of(&directory.current_members()).is_some_and(|m| m.id == self.local)
    }

    pub fn lobby_name(&self, metadata: &impl LobbyMetadataStore) -> Option<String> {
        metadata.get(keys::NAME)
    }

    /// Reconciles the roster against `directory` and refreshes everything
    /// derived from it.
    pub fn membership_changed(
        &mut self,
        directory: &impl MemberDirectorySource,
    ) -> Result<ReconcileResult, SessionError> {
        let members = directory.current_members();
        let result = self
            .roster
            .reconcile(&members, self.settings.reconcile_policy)
            .inspect_err(|e| {
                self.fault(e.clone());
            })?;
        self.members = members;

        if !result.is_empty() {
            self.emit(SessionEvent::RosterReconciled(result.clone()));
        }
        if self.phase() == SessionPhase::Lobby {
            self.place_seats();
        }
        self.check_leader();
        self.refresh_controls();
        Ok(result)
    }

    /// Flips the local ready flag and hands it to the directory.
    pub fn toggle_ready<D: MemberDirectorySource>(
        &mut self,
        directory: &mut D,
    ) -> Result<bool, SessionError> {
        let phase = self.phase();
        if phase != SessionPhase::Lobby {
            return Err(self.fault(SessionError::ReadyToggleUnavailable(phase)));
        }
        let current = directory
            .current_members()
            .into_iter()
            .find(|m| m.id == self.local)
            .map(|m| m.ready);
        let Some(current) = current else {
            return Err(self.fault(SessionError::LocalMemberMissing));
        };

        let ready = !current;
        self.set_local_ready(directory, ready)?;
        self.membership_changed(&*directory)?;
        Ok(ready)
    }

    /// Asks to move the session into the game scene `scene`.
    ///
    /// Only the leader may do so, and only once everybody is ready. On
    /// success the lobby is flagged `In-Game` and the returned scene has to
    /// be loaded; the phase changes once it is.
    pub fn request_start(
        &mut self,
        directory: &impl MemberDirectorySource,
        metadata: &mut impl LobbyMetadataStore,
        scene: &str,
    ) -> Result<SceneChangeRequest, SessionError> {
        let trigger = SessionTrigger::StartRequested;
        if SceneRoute::from_name(scene, &self.settings) != SceneRoute::Game {
            return Err(self.fault(SessionError::TransitionRejected {
                trigger,
                phase: self.phase(),
                reason: GuardFailure::NoSuchEdge,
            }));
        }
        self.request_scene_change(directory, metadata, trigger, scene.to_owned())
    }

    /// Asks to bring everybody back to the lobby. Leader only.
    pub fn request_end(
        &mut self,
        directory: &impl MemberDirectorySource,
        metadata: &mut impl LobbyMetadataStore,
    ) -> Result<SceneChangeRequest, SessionError> {
        let scene = self.settings.lobby_scene.clone();
        self.request_scene_change(directory, metadata, SessionTrigger::EndRequested, scene)
    }

    /// Leaves the session. The returned request points at the menu scene,
    /// whose load tears the session down.
    pub fn leave<D: MemberDirectorySource>(&mut self, directory: &mut D) -> SceneChangeRequest {
        let trigger = SessionTrigger::LeaveRequested;
        if let Ok(transition) = self.machine.request(trigger, GuardContext::default()) {
            self.apply_effects(transition.effects, directory);
        }
        info!(target: LOG_SESSION, "local member {} leaving", self.local);
        self.emit(SessionEvent::LeaveRequested);

        let request = SceneChangeRequest {
            scene: self.settings.menu_scene.clone(),
            trigger,
        };
        self.emit(SessionEvent::SceneChangeRequested(request.clone()));
        request
    }

    /// A scene change started. Arms the loaded wait for `name`.
    pub fn scene_changed(&mut self, name: &str, now: Duration) {
        if let Some(previous) = self.wait.arm(name, now) {
            debug!(target: LOG_SCENE, "`{name}` replaces pending scene `{previous}`");
        }
    }

    /// Resumes the scene wait if `signal` reports the awaited scene as
    /// loaded, and runs whatever that scene means for the session.
    ///
    /// Returns the phase the session is in afterwards, or `None` when the
    /// signal did not resume anything.
    pub fn scene_loaded<D: MemberDirectorySource>(
        &mut self,
        signal: &impl SceneSignal,
        directory: &mut D,
    ) -> Option<SessionPhase> {
        let Some(scene) = self.wait.resume(signal) else {
            debug!(
                target: LOG_SCENE,
                "ignoring load of `{}` (loaded: {})",
                signal.active_scene(),
                signal.is_fully_loaded()
            );
            return None;
        };

        let Some(target) = SceneRoute::from_name(&scene, &self.settings).phase() else {
            self.teardown();
            return Some(self.phase());
        };

        match self.machine.complete(target) {
            Ok(Some(transition)) => {
                info!(
                    target: LOG_SCENE,
                    "scene `{scene}` loaded: {:?} -> {:?}", transition.from, transition.to
                );
                self.emit(SessionEvent::PhaseChanged {
                    from: transition.from,
                    to: transition.to,
                });
                self.apply_effects(transition.effects, directory);
                // duplicates are already reported as a fault
                let _ = self.membership_changed(&*directory);
            }
            Ok(None) => {
                debug!(target: LOG_SCENE, "scene `{scene}` loaded, phase unchanged");
                self.refresh_controls();
            }
            Err(e) => {
                self.fault(e);
                self.refresh_controls();
            }
        }
        Some(self.phase())
    }

    /// Reports a stalled scene load once per wait.
    pub fn check_scene_timeout(&mut self, now: Duration) -> Option<SessionError> {
        let err = self.wait.check_timeout(now)?;
        self.observers.dispatch(&SessionEvent::Fault(err.clone()));
        Some(err)
    }

    fn request_scene_change(
        &mut self,
        directory: &impl MemberDirectorySource,
        metadata: &mut impl LobbyMetadataStore,
        trigger: SessionTrigger,
        scene: String,
    ) -> Result<SceneChangeRequest, SessionError> {
        let members = directory.current_members();
        let leader = leader_of(&members);
        let guard = GuardContext {
            local_is_leader: leader.is_some_and(|m| m.id == self.local),
            leader_present: leader.is_some(),
            all_ready: gate::can_start(&members),
        };

        let transition = self
            .machine
            .request(trigger, guard)
            .inspect_err(|e| {
                self.fault(e.clone());
            })?;

        let status = match transition.to {
            SessionPhase::InGame => LobbyStatus::InGame,
            _ => LobbyStatus::InLobby,
        };
        metadata.set(keys::STATUS, status.as_str());

        info!(target: LOG_SESSION, "{trigger:?} authorized, loading `{scene}` ({status})");
        let request = SceneChangeRequest { scene, trigger };
        self.emit(SessionEvent::SceneChangeRequested(request.clone()));
        self.refresh_controls();
        Ok(request)
    }

    fn apply_effects<D: MemberDirectorySource>(&mut self, effects: &[Effect], directory: &mut D) {
        for effect in effects {
            match effect {
                Effect::SnapshotSeats => {
                    self.seats.snapshot(directory.current_members().len());
                }
                Effect::ResetSeats => {
                    self.seats.clear();
                    self.seats.snapshot(directory.current_members().len());
                }
                Effect::LockSeats => self.seats.lock(),
                Effect::UnlockSeats => {
                    self.seats.unlock();
                    self.emit(SessionEvent::SeatsAssigned(self.seats.plan().clone()));
                }
                Effect::RevealLobbyControls | Effect::HideLobbyControls => self.refresh_controls(),
                Effect::ResetReadiness => {
                    // errors are already reported as faults
                    let _ = self.set_local_ready(directory, false);
                }
                Effect::RemoveLocalMember => directory.request_leave(),
            }
        }
    }

    fn set_local_ready<D: MemberDirectorySource>(
        &mut self,
        directory: &mut D,
        ready: bool,
    ) -> Result<(), SessionError> {
        directory
            .set_local_ready(ready)
            .inspect_err(|e| {
                self.fault(e.clone());
            })?;
        debug!(target: LOG_SESSION, "local ready -> {ready}");
        self.emit(SessionEvent::ReadyChanged {
            member: self.local,
            ready,
        });
        Ok(())
    }

    fn place_seats(&mut self) {
        let mut misplaced = HashSet::new();
        for err in self.seats.place(&self.members) {
            if let SessionError::InvalidSlotIndex { member, slot, .. } = err {
                misplaced.insert((member, slot));
                if self.misplaced_reported.contains(&(member, slot)) {
                    continue;
                }
            }
            self.fault(err);
        }
        self.misplaced_reported = misplaced;
        self.emit(SessionEvent::SeatsAssigned(self.seats.plan().clone()));
    }

    fn check_leader(&mut self) {
        let leaderless = !self.members.is_empty() && leader_of(&self.members).is_none();
        if leaderless && !self.leaderless_reported {
            self.fault(SessionError::NoLeaderPresent {
                members: self.members.len(),
            });
        }
        self.leaderless_reported = leaderless;
    }

    fn refresh_controls(&mut self) {
        let controls = LobbyControls::derive(
            self.phase(),
            self.is_transitioning(),
            &self.members,
            self.local,
        );
        if controls != self.controls {
            self.controls = controls.clone();
            self.emit(SessionEvent::ControlsChanged(controls));
        }
    }

    fn teardown(&mut self) {
        let from = self.phase();
        self.roster.clear();
        self.machine.reset();
        self.seats.clear();
        self.wait.disarm();
        self.members.clear();
        self.leaderless_reported = false;
        self.misplaced_reported.clear();

        info!(target: LOG_SESSION, "menu scene loaded, session torn down");
        if from != SessionPhase::PreLobby {
            self.emit(SessionEvent::PhaseChanged {
                from,
                to: SessionPhase::PreLobby,
            });
        }
        self.emit(SessionEvent::SessionEnded);
        self.refresh_controls();
    }

    fn emit(&self, event: SessionEvent) {
        self.observers.dispatch(&event);
    }

    /// Logs `err`, dispatches it and hands it back.
    fn fault(&self, err: SessionError) -> SessionError {
        warn!(target: LOG_SESSION, "{err}");
        self.observers.dispatch(&SessionEvent::Fault(err.clone()));
        err
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::directory::InMemoryDirectory;
    use crate::metadata::InMemoryMetadata;
    use crate::scene::SceneSnapshot;

    fn recorder(session: &SessionContext) -> Arc<Mutex<Vec<SessionEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        session
            .observers()
            .subscribe(move |e: &SessionEvent| sink.lock().unwrap().push(e.clone()));
        events
    }

    fn enter_lobby(session: &mut SessionContext, directory: &mut InMemoryDirectory) {
        session.scene_changed("Lobby", Duration::ZERO);
        session.scene_loaded(&SceneSnapshot::loaded("Lobby"), directory);
    }

    #[test]
    fn entering_lobby_resets_ready_and_seats_members() {
        let mut directory = InMemoryDirectory::with_members(
            MemberId::new(1),
            vec![
                Member::new(1, "host", 1).leader().local().with_ready(true),
                Member::new(2, "guest", 2),
            ],
        );
        let mut session = SessionContext::new(SessionSettings::default(), MemberId::new(1));
        let events = recorder(&session);

        enter_lobby(&mut session, &mut directory);

        assert_eq!(session.phase(), SessionPhase::Lobby);
        assert!(!directory.get(MemberId::new(1)).unwrap().ready);
        assert_eq!(session.roster().len(), 2);
        assert_eq!(session.seats().slot_of(MemberId::new(2)), Some(1));
        assert!(session.controls().scoreboard_visible);

        let events = events.lock().unwrap();
        assert!(events.contains(&SessionEvent::PhaseChanged {
            from: SessionPhase::PreLobby,
            to: SessionPhase::Lobby,
        }));
        assert!(events.contains(&SessionEvent::ReadyChanged {
            member: MemberId::new(1),
            ready: false,
        }));
    }

    #[test]
    fn toggle_ready_outside_lobby_is_rejected() {
        let mut directory = InMemoryDirectory::with_members(
            MemberId::new(1),
            vec![Member::new(1, "host", 1).leader().local()],
        );
        let mut session = SessionContext::new(SessionSettings::default(), MemberId::new(1));
        assert_eq!(
            session.toggle_ready(&mut directory),
            Err(SessionError::ReadyToggleUnavailable(SessionPhase::PreLobby))
        );

        enter_lobby(&mut session, &mut directory);
        assert_eq!(session.toggle_ready(&mut directory), Ok(true));
        assert_eq!(session.controls().ready_label.as_str(), "Unready");
    }

    #[test]
    fn leaderless_lobby_is_reported_once() {
        let mut directory = InMemoryDirectory::with_members(
            MemberId::new(1),
            vec![Member::new(1, "me", 1).local()],
        );
        let mut session = SessionContext::new(SessionSettings::default(), MemberId::new(1));
        let events = recorder(&session);

        session.membership_changed(&directory).unwrap();
        directory.rename(MemberId::new(1), "still me");
        session.membership_changed(&directory).unwrap();

        let faults = events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, SessionEvent::Fault(SessionError::NoLeaderPresent { .. })))
            .count();
        assert_eq!(faults, 1);

        let mut metadata = InMemoryMetadata::new();
        let err = session.request_end(&directory, &mut metadata).unwrap_err();
        assert!(matches!(err, SessionError::TransitionRejected { .. }));
    }

    #[test]
    fn late_joiner_is_seated_on_an_active_slot() {
        let mut directory = InMemoryDirectory::with_members(
            MemberId::new(1),
            vec![
                Member::new(1, "host", 1).leader().local(),
                Member::new(2, "guest", 2),
            ],
        );
        let mut session = SessionContext::new(SessionSettings::default(), MemberId::new(1));
        enter_lobby(&mut session, &mut directory);
        assert_eq!(session.seats().deactivated_slots().count(), 8);

        directory.join(Member::new(3, "late", 3));
        session.membership_changed(&directory).unwrap();

        let seats = session.seats();
        assert_eq!(seats.slot_of(MemberId::new(3)), Some(2));
        assert!(seats.active_slots[2]);
        assert_eq!(seats.deactivated_slots().count(), 7);
    }

    #[test]
    fn invalid_slot_is_reported_once_per_member_and_slot() {
        let mut directory = InMemoryDirectory::with_members(
            MemberId::new(1),
            vec![
                Member::new(1, "host", 1).leader().local(),
                Member::new(2, "lost", 42),
            ],
        );
        let mut session = SessionContext::new(SessionSettings::default(), MemberId::new(1));
        let events = recorder(&session);
        let invalid_slots = |events: &Arc<Mutex<Vec<SessionEvent>>>| {
            events
                .lock()
                .unwrap()
                .iter()
                .filter(|e| matches!(e, SessionEvent::Fault(SessionError::InvalidSlotIndex { .. })))
                .count()
        };

        enter_lobby(&mut session, &mut directory);
        assert_eq!(invalid_slots(&events), 1);

        session.toggle_ready(&mut directory).unwrap();
        directory.rename(MemberId::new(2), "still lost");
        session.membership_changed(&directory).unwrap();
        assert_eq!(invalid_slots(&events), 1);

        // a different bad slot is a new problem
        directory.get_mut(MemberId::new(2)).unwrap().slot_index = 0;
        session.membership_changed(&directory).unwrap();
        assert_eq!(invalid_slots(&events), 2);

        // fixed, then broken again
        directory.get_mut(MemberId::new(2)).unwrap().slot_index = 2;
        session.membership_changed(&directory).unwrap();
        directory.get_mut(MemberId::new(2)).unwrap().slot_index = 42;
        session.membership_changed(&directory).unwrap();
        assert_eq!(invalid_slots(&events), 3);
    }

    struct LeaveCounter {
        members: Vec<Member>,
        leaves: usize,
    }

    impl MemberDirectorySource for LeaveCounter {
        fn current_members(&self) -> Vec<Member> {
            self.members.clone()
        }

        fn set_local_ready(&mut self, _ready: bool) -> Result<(), SessionError> {
            Ok(())
        }

        fn request_leave(&mut self) {
            self.leaves += 1;
            self.members.retain(|m| !m.is_local);
        }
    }

    #[test]
    fn leave_goes_through_the_directory() {
        let mut directory = LeaveCounter {
            members: vec![
                Member::new(1, "host", 1).leader(),
                Member::new(2, "me", 2).local(),
            ],
            leaves: 0,
        };
        let mut session = SessionContext::new(SessionSettings::default(), MemberId::new(2));

        let request = session.leave(&mut directory);
        assert_eq!(request.scene, "Main");
        assert_eq!(directory.leaves, 1);
        assert_eq!(directory.members.len(), 1);
    }
}
