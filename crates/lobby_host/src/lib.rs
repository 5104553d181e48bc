//! Headless lobby host.
//!
//! Replays a [`Scenario`] against the Bevy session plugin without a window,
//! a transport or a scene loader, and reports where the session ended up.

pub mod logging;
pub mod runner;
pub mod scenario;

pub use runner::{build_app, run, ScenarioReport};
pub use scenario::{Scenario, ScenarioStep};

pub const LOG_HOST: &str = "lobby/host";
