//! Fire-and-forget launching of user-configured commands.

use std::process::Stdio;

use anyhow::{Context, Result};
use log::{debug, error, info};
use tokio::process::Command;

/// Starts external programs on behalf of button bindings.
///
/// Implementations must never fail towards the caller; problems are logged.
#[cfg_attr(test, mockall::automock)]
pub trait ProcessLauncher: Send + Sync {
    fn launch(&self, command: &str);
}

/// Spawns the configured executable detached from the daemon's stdio.
///
/// The whole (trimmed) setting is the program path; no shell parsing is
/// done. The child is not awaited.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandLauncher;

impl CommandLauncher {
    fn spawn(&self, program: &str) -> Result<()> {
        let child = Command::new(program)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to run {program}"))?;

        info!("Launched {program} (pid {:?})", child.id());
        Ok(())
    }
}

/// Program path of a configured command, `None` when nothing is set.
fn program_of(command: &str) -> Option<&str> {
    Some(command.trim()).filter(|program| !program.is_empty())
}

impl ProcessLauncher for CommandLauncher {
    fn launch(&self, command: &str) {
        let Some(program) = program_of(command) else {
            debug!("No custom command configured");
            return;
        };

        if let Err(e) = self.spawn(program) {
            error!("{e:#}");
        }
    }
}
