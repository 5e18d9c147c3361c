mod cli;
mod cmd;
mod config;
mod files;
mod git;
mod host;
mod logger;
mod prompt;
mod services;
mod spinner;
mod version;
mod workflow;

use anyhow::Result;
use std::process::ExitCode;
use tracing::{error, info};

fn main() -> Result<ExitCode> {
    logger::init()?;
    info!(args = ?std::env::args().collect::<Vec<_>>(), "worktree start");

    match cli::run() {
        Ok(code) => {
            info!(?code, "worktree finished");
            Ok(code)
        }
        Err(err) => {
            error!(error = ?err, "worktree failed");
            Err(err)
        }
    }
}
