//! RON-backed configuration.
//!
//! A settings file is one RON map from section name to section value:
//!
//! ```ron
//! {
//!     "session": {
//!         "spawn_slots": 8,
//!         "member_limit": Some(4),
//!         "reconcile_policy": "staged",
//!     },
//! }
//! ```
//!
//! Missing files, sections and fields fall back to their defaults.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use ron::Value as RonValue;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use crate::roster::ReconcilePolicy;

/// A configuration section stored under [`Settings::SECTION`].
pub trait Settings: Default + Serialize + DeserializeOwned {
    const SECTION: &'static str;
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings io: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings file is not valid RON: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("section `{section}`: {source}")]
    Section {
        section: &'static str,
        #[source]
        source: ron::Error,
    },
    #[error("invalid settings: {0}")]
    Invalid(String),
}

/// Parsed settings document, kept as raw sections until a type asks for one.
#[derive(Debug, Clone, Default)]
pub struct SettingsFile {
    sections: HashMap<String, RonValue>,
}

impl SettingsFile {
    pub fn parse(content: &str) -> Result<Self, SettingsError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let sections: HashMap<String, RonValue> = ron::from_str(content)?;
        Ok(Self { sections })
    }

    /// Reads `path`; a missing file is an empty document.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::parse(&fs::read_to_string(path)?)
    }

    pub fn has_section(&self, section: &str) -> bool {
        self.sections.contains_key(section)
    }

    /// Deserializes one section, or returns its default if absent.
    pub fn section<S: Settings>(&self) -> Result<S, SettingsError> {
        match self.sections.get(S::SECTION) {
            Some(value) => value
                .clone()
                .into_rust::<S>()
                .map_err(|source| SettingsError::Section {
                    section: S::SECTION,
                    source,
                }),
            None => Ok(S::default()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Spawn slots the lobby scene offers.
    pub spawn_slots: usize,
    /// Slots beyond this stay deactivated. Unset means "current member count".
    pub member_limit: Option<usize>,
    pub menu_scene: String,
    pub lobby_scene: String,
    /// Scene requested by a start without an explicit target.
    pub game_scene: String,
    pub scene_load_timeout_ms: u64,
    pub reconcile_policy: ReconcilePolicy,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            spawn_slots: 10,
            member_limit: None,
            menu_scene: "Main".into(),
            lobby_scene: "Lobby".into(),
            game_scene: "Game".into(),
            scene_load_timeout_ms: 10_000,
            reconcile_policy: ReconcilePolicy::Unified,
        }
    }
}

impl Settings for SessionSettings {
    const SECTION: &'static str = "session";
}

impl SessionSettings {
    /// Loads and validates the `session` section of `path`.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let settings: Self = SettingsFile::load(path)?.section()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn scene_load_timeout(&self) -> Duration {
        Duration::from_millis(self.scene_load_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.spawn_slots == 0 {
            return Err(SettingsError::Invalid("spawn_slots must be at least 1".into()));
        }
        if let Some(limit) = self.member_limit {
            if limit > self.spawn_slots {
                return Err(SettingsError::Invalid(format!(
                    "member_limit {limit} exceeds spawn_slots {}",
                    self.spawn_slots
                )));
            }
        }

        let scenes = [&self.menu_scene, &self.lobby_scene, &self.game_scene];
        if scenes.iter().any(|s| s.trim().is_empty()) {
            return Err(SettingsError::Invalid("scene names must not be empty".into()));
        }
        if self.menu_scene == self.lobby_scene
            || self.menu_scene == self.game_scene
            || self.lobby_scene == self.game_scene
        {
            return Err(SettingsError::Invalid("scene names must be distinct".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = SessionSettings::default();
        settings.validate().unwrap();
        assert_eq!(settings.scene_load_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn missing_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = SessionSettings::load(&dir.path().join("absent.ron")).unwrap();
        assert_eq!(settings, SessionSettings::default());
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{
                "session": {{
                    "spawn_slots": 6,
                    "member_limit": Some(4),
                    "reconcile_policy": "staged",
                }},
                "audio": {{ "volume": 3 }},
            }}"#
        )
        .unwrap();

        let settings = SessionSettings::load(file.path()).unwrap();
        assert_eq!(settings.spawn_slots, 6);
        assert_eq!(settings.member_limit, Some(4));
        assert_eq!(settings.reconcile_policy, ReconcilePolicy::Staged);
        assert_eq!(settings.lobby_scene, "Lobby");
    }

    #[test]
    fn broken_documents_are_reported() {
        assert!(matches!(
            SettingsFile::parse("{ \"session\": "),
            Err(SettingsError::Parse(_))
        ));

        let doc = SettingsFile::parse(r#"{ "session": { "spawn_slots": "many" } }"#).unwrap();
        assert!(matches!(
            doc.section::<SessionSettings>(),
            Err(SettingsError::Section { section: "session", .. })
        ));
    }

    #[test]
    fn validation_rejects_inconsistent_values() {
        let too_many = SessionSettings {
            spawn_slots: 2,
            member_limit: Some(3),
            ..Default::default()
        };
        assert!(matches!(too_many.validate(), Err(SettingsError::Invalid(_))));

        let clash = SessionSettings {
            game_scene: "Lobby".into(),
            ..Default::default()
        };
        assert!(clash.validate().is_err());

        let empty = SessionSettings {
            spawn_slots: 0,
            ..Default::default()
        };
        assert!(empty.validate().is_err());
    }
}
