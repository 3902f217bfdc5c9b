//! Plugin types for ledgerctl
//!
//! This module defines the metadata parsed from a plugin's `plugin.yaml`
//! file and the published form of an installed plugin.

use std::path::PathBuf;

use serde::Deserialize;

/// Filename of the metadata file every plugin source directory must contain.
pub const METADATA_FILENAME: &str = "plugin.yaml";

/// Metadata loaded from a plugin's `plugin.yaml` file.
///
/// # Example
///
/// ```yaml
/// name: echo
/// usage: echo [words...]
/// description: Echo the arguments back
/// command: ./echo.sh --flag
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PluginMetadata {
    /// Subcommand name and published entry key.
    pub name: String,

    /// Usage line shown in help output.
    #[serde(default)]
    pub usage: String,

    /// One-line description shown in help output.
    #[serde(default)]
    pub description: String,

    /// The command to run, split into base and leading arguments.
    pub command: CommandLine,
}

/// A plugin command string split on whitespace.
///
/// `"./bin/tool --flag value"` becomes base `./bin/tool` and args
/// `["--flag", "value"]`. Environment references in the base are kept
/// unexpanded until the command is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct CommandLine {
    pub base: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn parse(command: &str) -> Result<Self, String> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let base = parts
            .next()
            .ok_or_else(|| "command must not be empty".to_string())?;
        Ok(Self {
            base,
            args: parts.collect(),
        })
    }
}

impl TryFrom<String> for CommandLine {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

/// An installed plugin as seen through the plugins directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPlugin {
    /// Parsed metadata.
    pub metadata: PluginMetadata,

    /// Absolute path of the plugin's source directory.
    pub path: PathBuf,

    /// The published link inside the plugins directory.
    pub entry: PathBuf,
}

impl PublishedPlugin {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn command(&self) -> &CommandLine {
        &self.metadata.command
    }
}
