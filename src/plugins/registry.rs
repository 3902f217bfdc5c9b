//! Command tree for built-in and plugin subcommands
//!
//! The [`CommandTree`] holds the root `clap` command (with the built-in
//! subcommands) and every plugin command attached at startup. Attaching a
//! name that is already present replaces it: a later plugin replaces an
//! earlier one, and any plugin replaces a built-in of the same name.
//!
//! Plugin subcommands accept every token after their name verbatim,
//! flags included, and hand them to the plugin unparsed.

use std::collections::HashSet;

use clap::{Arg, ArgMatches, Command};
use tracing::{debug, warn};

use crate::error::Result;

use super::module::PluginCommand;
use super::process::ProcessCommand;
use super::types::PublishedPlugin;

/// Argument id under which a plugin subcommand collects its arguments.
pub const PLUGIN_ARGS: &str = "args";

/// How an attached plugin runs.
pub enum ResolvedCommand {
    /// In-process command built by a module's factory.
    Module(Box<dyn PluginCommand>),
    /// Child process.
    Process(ProcessCommand),
}

impl ResolvedCommand {
    pub async fn run(&self, args: Vec<String>) -> Result<()> {
        match self {
            ResolvedCommand::Module(command) => command.run(args).await,
            ResolvedCommand::Process(command) => command.run(args).await,
        }
    }

    pub fn is_module(&self) -> bool {
        matches!(self, ResolvedCommand::Module(_))
    }
}

impl std::fmt::Debug for ResolvedCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolvedCommand::Module(_) => f.write_str("Module(..)"),
            ResolvedCommand::Process(command) => f.debug_tuple("Process").field(command).finish(),
        }
    }
}

/// A plugin subcommand ready to be placed in the tree.
#[derive(Debug)]
pub struct AttachedCommand {
    pub name: String,
    pub description: String,
    pub usage: String,
    pub command: ResolvedCommand,
}

impl AttachedCommand {
    pub fn new(plugin: &PublishedPlugin, command: ResolvedCommand) -> Self {
        Self {
            name: plugin.name().to_string(),
            description: plugin.metadata.description.clone(),
            usage: plugin.metadata.usage.clone(),
            command,
        }
    }

    fn to_clap(&self) -> Command {
        let mut cmd = Command::new(self.name.clone())
            .about(self.description.clone())
            .disable_help_flag(true)
            .disable_version_flag(true)
            .arg(
                Arg::new(PLUGIN_ARGS)
                    .num_args(0..)
                    .trailing_var_arg(true)
                    .allow_hyphen_values(true),
            );
        if !self.usage.is_empty() {
            cmd = cmd.override_usage(self.usage.clone());
        }
        cmd
    }
}

/// The root command plus attached plugin commands.
pub struct CommandTree {
    root: Command,
    plugins: Vec<AttachedCommand>,
}

impl CommandTree {
    pub fn new(root: Command) -> Self {
        Self {
            root,
            plugins: Vec::new(),
        }
    }

    /// Attach a plugin command, replacing any earlier one of the same name.
    pub fn attach(&mut self, command: AttachedCommand) {
        if let Some(pos) = self.plugins.iter().position(|p| p.name == command.name) {
            warn!(plugin = %command.name, "Plugin name registered twice, keeping the last one");
            self.plugins.remove(pos);
        } else if self.root.find_subcommand(&command.name).is_some() {
            warn!(plugin = %command.name, "Plugin replaces built-in command");
        }

        debug!(
            plugin = %command.name,
            module = command.command.is_module(),
            "Attached plugin command"
        );
        self.plugins.push(command);
    }

    /// Look up an attached plugin by subcommand name.
    pub fn plugin(&self, name: &str) -> Option<&AttachedCommand> {
        self.plugins.iter().find(|p| p.name == name)
    }

    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Build the full `clap` command: built-ins not shadowed by a plugin,
    /// then the plugin subcommands in attach order.
    pub fn build(&self) -> Command {
        let shadowed: HashSet<&str> = self
            .plugins
            .iter()
            .map(|p| p.name.as_str())
            .filter(|name| self.root.find_subcommand(name).is_some())
            .collect();

        let mut root = if shadowed.is_empty() {
            self.root.clone()
        } else {
            self.rebuild_root_without(&shadowed)
        };
        if self.plugin("help").is_some() {
            root = root.disable_help_subcommand(true);
        }

        for plugin in &self.plugins {
            root = root.subcommand(plugin.to_clap());
        }
        root
    }

    /// Run the plugin selected by `matches`, if any.
    ///
    /// Returns `None` when the matched subcommand is not a plugin, leaving
    /// dispatch to the built-ins.
    pub async fn dispatch(&self, matches: &ArgMatches) -> Option<Result<()>> {
        let (name, sub) = matches.subcommand()?;
        let plugin = self.plugin(name)?;
        let args = sub
            .get_many::<String>(PLUGIN_ARGS)
            .map(|values| values.cloned().collect())
            .unwrap_or_default();

        debug!(plugin = %name, ?args, "Dispatching plugin command");
        Some(plugin.command.run(args).await)
    }

    // clap cannot remove a subcommand once added, so a shadowed built-in
    // means copying the root without it.
    fn rebuild_root_without(&self, shadowed: &HashSet<&str>) -> Command {
        let template = &self.root;
        let mut root = Command::new(template.get_name().to_string())
            .subcommand_required(template.is_subcommand_required_set())
            .arg_required_else_help(template.is_arg_required_else_help_set())
            .propagate_version(template.is_propagate_version_set());

        if let Some(about) = template.get_about() {
            root = root.about(about.clone());
        }
        if let Some(version) = template.get_version() {
            root = root.version(version.to_string());
        }
        for arg in template.get_arguments() {
            // clap regenerates its own help and version flags
            if matches!(arg.get_id().as_str(), "help" | "version") {
                continue;
            }
            root = root.arg(arg.clone());
        }
        for sub in template
            .get_subcommands()
            .filter(|s| !shadowed.contains(s.get_name()))
        {
            root = root.subcommand(sub.clone());
        }
        root
    }
}

impl std::fmt::Debug for CommandTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandTree")
            .field("root", &self.root.get_name())
            .field("plugins", &self.plugins)
            .finish()
    }
}
