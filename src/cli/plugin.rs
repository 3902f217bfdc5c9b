//! `plugin` subcommands: install, uninstall and list.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;

use ledgerctl::config::Settings;
use ledgerctl::plugins::{Installer, PluginStore, SymlinkStore};
use ledgerctl::LedgerError;

#[derive(Subcommand)]
pub(crate) enum PluginAction {
    /// Install a plugin from the local filesystem
    Install {
        /// Plugin source directory containing plugin.yaml
        path: Option<String>,
    },
    /// Uninstall a plugin
    Uninstall {
        /// Name of the installed plugin
        name: Option<String>,
    },
    /// List all installed plugins
    List,
}

pub(crate) fn cmd_plugin(action: PluginAction, settings: &Settings, out: &mut dyn Write) -> Result<()> {
    let installer = Installer::new(SymlinkStore::new(settings.home.plugins()));

    match action {
        PluginAction::Install { path } => cmd_plugin_install(&installer, path.as_deref(), out),
        PluginAction::Uninstall { name } => cmd_plugin_uninstall(&installer, name.as_deref(), out),
        PluginAction::List => cmd_plugin_list(&installer, out),
    }
}

pub(crate) fn cmd_plugin_install<S: PluginStore>(
    installer: &Installer<S>,
    path: Option<&str>,
    out: &mut dyn Write,
) -> Result<()> {
    let path = required(path, "plugin path not specified")?;
    installer.install(Path::new(path))?;
    writeln!(out, "successfully installed the plugin")?;
    Ok(())
}

pub(crate) fn cmd_plugin_uninstall<S: PluginStore>(
    installer: &Installer<S>,
    name: Option<&str>,
    out: &mut dyn Write,
) -> Result<()> {
    let name = required(name, "plugin name not specified")?;
    installer.uninstall(name)?;
    writeln!(out, "successfully uninstalled the plugin")?;
    Ok(())
}

pub(crate) fn cmd_plugin_list<S: PluginStore>(installer: &Installer<S>, out: &mut dyn Write) -> Result<()> {
    let plugins = installer
        .store()
        .list()
        .context("Failed to list plugins")?;

    if plugins.is_empty() {
        writeln!(out, "no plugins currently exist")?;
        return Ok(());
    }

    for plugin in &plugins {
        writeln!(out, "{}", plugin.name())?;
    }
    Ok(())
}

/// Trim a positional argument, rejecting it when absent or blank.
fn required<'a>(value: Option<&'a str>, message: &str) -> Result<&'a str> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(LedgerError::Validation(message.to_string()).into()),
    }
}
