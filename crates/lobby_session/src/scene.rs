//! Scene routing and the "scene fully loaded" wait.

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::SessionError;
use crate::phase::SessionPhase;
use crate::settings::SessionSettings;
use crate::LOG_SCENE;

/// What loading a scene means for the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SceneRoute {
    /// Back in the main menu; the session is over.
    Menu,
    Lobby,
    Game,
}

impl SceneRoute {
    /// Menu and lobby are matched by name, everything else is a game scene.
    pub fn from_name(name: &str, settings: &SessionSettings) -> Self {
        if name == settings.menu_scene {
            Self::Menu
        } else if name == settings.lobby_scene {
            Self::Lobby
        } else {
            Self::Game
        }
    }

    /// Phase the session ends up in, `None` for a teardown.
    pub fn phase(self) -> Option<SessionPhase> {
        match self {
            Self::Menu => None,
            Self::Lobby => Some(SessionPhase::Lobby),
            Self::Game => Some(SessionPhase::InGame),
        }
    }
}

/// Observed state of the scene loader.
pub trait SceneSignal {
    fn active_scene(&self) -> &str;
    fn is_fully_loaded(&self) -> bool;
}

/// Plain value implementation of [`SceneSignal`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SceneSnapshot {
    pub name: String,
    pub loaded: bool,
}

impl SceneSnapshot {
    pub fn loaded(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            loaded: true,
        }
    }

    pub fn loading(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            loaded: false,
        }
    }
}

impl SceneSignal for SceneSnapshot {
    fn active_scene(&self) -> &str {
        &self.name
    }

    fn is_fully_loaded(&self) -> bool {
        self.loaded
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct PendingScene {
    scene: String,
    started_at: Duration,
    timeout_reported: bool,
}

/// Single-shot continuation for "scene `X` finished loading".
///
/// Armed by a scene change, resumed by the first matching loaded signal,
/// then disarmed. Never polled: the caller feeds signals and the clock in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SceneWait {
    timeout: Duration,
    pending: Option<PendingScene>,
}

impl SceneWait {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            pending: None,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    pub fn scene(&self) -> Option<&str> {
        self.pending.as_ref().map(|p| p.scene.as_str())
    }

    /// Starts waiting for `scene`. A wait that was still pending is replaced
    /// and its scene name returned.
    pub fn arm(&mut self, scene: impl Into<String>, now: Duration) -> Option<String> {
        let scene = scene.into();
        debug!(target: LOG_SCENE, "waiting for scene `{scene}`");
        let replaced = self.pending.replace(PendingScene {
            scene,
            started_at: now,
            timeout_reported: false,
        });
        replaced.map(|p| {
            debug!(target: LOG_SCENE, "wait for `{}` superseded", p.scene);
            p.scene
        })
    }

    /// Resumes the wait if `signal` reports the awaited scene as loaded.
    ///
    /// Returns the scene name exactly once per armed wait.
    pub fn resume(&mut self, signal: &impl SceneSignal) -> Option<String> {
        let pending = self.pending.as_ref()?;
        if !signal.is_fully_loaded() || signal.active_scene() != pending.scene {
            return None;
        }
        self.pending.take().map(|p| p.scene)
    }

    /// Reports a stalled load once. The wait stays armed so a late load
    /// still completes.
    pub fn check_timeout(&mut self, now: Duration) -> Option<SessionError> {
        let timeout = self.timeout;
        let pending = self.pending.as_mut()?;
        if pending.timeout_reported {
            return None;
        }
        let waited = now.saturating_sub(pending.started_at);
        if waited < timeout {
            return None;
        }
        pending.timeout_reported = true;
        let err = SessionError::SceneSignalTimeout {
            scene: pending.scene.clone(),
            waited,
        };
        warn!(target: LOG_SCENE, "{err}");
        Some(err)
    }

    pub fn disarm(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_follow_settings() {
        let settings = SessionSettings::default();
        assert_eq!(SceneRoute::from_name("Main", &settings), SceneRoute::Menu);
        assert_eq!(SceneRoute::from_name("Lobby", &settings), SceneRoute::Lobby);
        assert_eq!(SceneRoute::from_name("Desert", &settings), SceneRoute::Game);
        assert_eq!(SceneRoute::Menu.phase(), None);
        assert_eq!(SceneRoute::Game.phase(), Some(SessionPhase::InGame));
    }

    #[test]
    fn resumes_exactly_once() {
        let mut wait = SceneWait::new(Duration::from_secs(1));
        wait.arm("Lobby", Duration::ZERO);

        assert_eq!(wait.resume(&SceneSnapshot::loading("Lobby")), None);
        assert_eq!(wait.resume(&SceneSnapshot::loaded("Game")), None);
        assert_eq!(
            wait.resume(&SceneSnapshot::loaded("Lobby")).as_deref(),
            Some("Lobby")
        );
        assert_eq!(wait.resume(&SceneSnapshot::loaded("Lobby")), None);
        assert!(!wait.is_armed());
    }

    #[test]
    fn timeout_reported_once_and_wait_survives() {
        let mut wait = SceneWait::new(Duration::from_millis(100));
        wait.arm("Game", Duration::from_millis(50));

        assert!(wait.check_timeout(Duration::from_millis(100)).is_none());
        let err = wait.check_timeout(Duration::from_millis(150)).unwrap();
        assert_eq!(
            err,
            SessionError::SceneSignalTimeout {
                scene: "Game".into(),
                waited: Duration::from_millis(100),
            }
        );
        assert!(wait.check_timeout(Duration::from_secs(5)).is_none());
        assert_eq!(
            wait.resume(&SceneSnapshot::loaded("Game")).as_deref(),
            Some("Game")
        );
    }

    #[test]
    fn rearming_replaces_pending_wait() {
        let mut wait = SceneWait::new(Duration::from_secs(1));
        assert_eq!(wait.arm("Lobby", Duration::ZERO), None);
        assert_eq!(wait.arm("Main", Duration::ZERO).as_deref(), Some("Lobby"));
        assert_eq!(wait.scene(), Some("Main"));
        assert_eq!(wait.resume(&SceneSnapshot::loaded("Lobby")), None);
    }
}
