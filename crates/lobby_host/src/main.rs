use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use lobby_host::{logging, runner, Scenario, LOG_HOST};
use lobby_session::SessionSettings;
use tracing::info;

#[derive(Parser)]
#[command(name = "lobby_host")]
#[command(about = "Replays a scripted lobby session headlessly")]
struct Args {
    /// Scenario file (RON)
    #[arg(short, long)]
    scenario: PathBuf,

    /// Settings file (RON); defaults apply when omitted
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Also write logs to this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = logging::init(args.log_dir.as_deref(), args.verbose)?;

    let settings = match &args.settings {
        Some(path) => SessionSettings::load(path)
            .with_context(|| format!("loading settings {}", path.display()))?,
        None => SessionSettings::default(),
    };
    let scenario = Scenario::load(&args.scenario)?;
    info!(
        target: LOG_HOST,
        "running {} step(s) from {}",
        scenario.steps.len(),
        args.scenario.display()
    );

    let report = runner::run(&scenario, settings);
    print!("{report}");
    Ok(())
}
