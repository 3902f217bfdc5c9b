//! Subprocess plugins
//!
//! Any plugin whose command is not a loadable module runs as a child
//! process. The child gets the metadata's leading arguments followed by the
//! user's arguments, inherits the parent environment (plus
//! `LEDGERCTL_HOME`), and is wired straight to the CLI's configured
//! streams. The dispatching command waits for the child to exit.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::config::{Home, Streams, HOME_ENV};
use crate::error::{LedgerError, Result};
use crate::utils::env::expand_env;

use super::module::PluginContext;
use super::types::PublishedPlugin;

/// Builds [`ProcessCommand`]s for published plugins.
pub struct ProcessAdapter;

impl ProcessAdapter {
    /// Wrap `plugin` as a command that runs its executable as a child
    /// process.
    pub fn wrap(plugin: &PublishedPlugin, ctx: &PluginContext) -> ProcessCommand {
        ProcessCommand {
            name: plugin.name().to_string(),
            base: plugin.command().base.clone(),
            args: plugin.command().args.clone(),
            source_dir: plugin.path.clone(),
            home: ctx.settings.home.clone(),
            streams: Arc::clone(&ctx.streams),
        }
    }
}

/// A deferred subprocess invocation. Owns nothing until it is run.
#[derive(Debug)]
pub struct ProcessCommand {
    name: String,
    base: String,
    args: Vec<String>,
    source_dir: PathBuf,
    home: Home,
    streams: Arc<Streams>,
}

impl ProcessCommand {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The executable to spawn, with environment references expanded.
    pub fn program(&self) -> PathBuf {
        resolve_program(&self.base, &self.source_dir)
    }

    /// Child arguments: declared arguments first, then `user_args`.
    pub fn argv(&self, user_args: &[String]) -> Vec<String> {
        self.args.iter().chain(user_args).cloned().collect()
    }

    /// Spawn the child and wait for it to exit.
    ///
    /// # Errors
    /// - `LedgerError::Subprocess` if the child cannot be started
    /// - `LedgerError::SubprocessExit` if it exits unsuccessfully
    pub async fn run(&self, user_args: Vec<String>) -> Result<()> {
        let program = self.program();
        let argv = self.argv(&user_args);
        debug!(plugin = %self.name, program = %program.display(), ?argv, "Spawning plugin");

        let mut cmd = tokio::process::Command::new(&program);
        cmd.args(&argv)
            .env(HOME_ENV, self.home.as_path())
            .stdin(self.stdio(self.streams.stdin.to_stdio())?)
            .stdout(self.stdio(self.streams.stdout.to_stdio())?)
            .stderr(self.stdio(self.streams.stderr.to_stdio())?);

        let status = cmd.status().await.map_err(|e| LedgerError::Subprocess {
            name: self.name.clone(),
            reason: format!("{}: {}", program.display(), e),
        })?;

        if status.success() {
            return Ok(());
        }

        Err(LedgerError::SubprocessExit {
            name: self.name.clone(),
            // Killed by a signal: no code to hand through.
            code: status.code().unwrap_or(1),
        })
    }

    fn stdio(&self, stdio: std::io::Result<std::process::Stdio>) -> Result<std::process::Stdio> {
        stdio.map_err(|e| LedgerError::Subprocess {
            name: self.name.clone(),
            reason: format!("failed to attach streams: {}", e),
        })
    }
}

/// Resolve a plugin's command base to the path handed to the loader or
/// spawned as a process.
///
/// Environment references are expanded. A relative path with more than one
/// component (`./echo.sh`, `bin/tool`) is taken relative to the plugin's
/// source directory; a bare name is left for `PATH` lookup.
pub fn resolve_program(base: &str, source_dir: &Path) -> PathBuf {
    let expanded = PathBuf::from(expand_env(base));
    if expanded.is_relative() && expanded.components().count() > 1 {
        source_dir.join(expanded)
    } else {
        expanded
    }
}
