//! Configuration for ledgerctl
//!
//! The plugin subsystem only needs two resolved values: the home directory
//! (plugins live under `<home>/plugins`) and the switch that disables plugin
//! loading entirely. Both are resolved here with the precedence
//! flag > environment > `<home>/config.json` > default.

mod streams;

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{LedgerError, Result};
use crate::utils::env::expand_env;

pub use streams::{Fallback, Stream, Streams};

/// Environment variable naming the home directory.
pub const HOME_ENV: &str = "LEDGERCTL_HOME";

/// Environment variable that disables plugin loading when truthy.
pub const DISABLE_PLUGINS_ENV: &str = "LEDGERCTL_DISABLE_PLUGINS";

/// Name of the optional config file inside the home directory.
pub const CONFIG_FILENAME: &str = "config.json";

/// Location of the ledgerctl configuration files.
///
/// Defaults to `~/.ledgerctl`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Home(PathBuf);

impl Home {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// `~/.ledgerctl`, or `.ledgerctl` relative to the working directory
    /// when no home directory can be determined.
    pub fn default_dir() -> Self {
        let base = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self(base.join(".ledgerctl"))
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Join components onto the home directory.
    pub fn path<I, P>(&self, components: I) -> PathBuf
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        components
            .into_iter()
            .fold(self.0.clone(), |acc, c| acc.join(c))
    }

    /// Directory holding published plugin links.
    pub fn plugins(&self) -> PathBuf {
        self.path(["plugins"])
    }

    pub fn config_file(&self) -> PathBuf {
        self.path([CONFIG_FILENAME])
    }
}

impl std::fmt::Display for Home {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Values given on the command line that take precedence over everything
/// else.
///
/// These must be known before the command tree is built, so they are
/// scanned from the raw argument list ahead of clap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub home: Option<PathBuf>,
    pub disable_plugins: bool,
}

impl Overrides {
    /// Scan leading global flags from `args` (program name excluded).
    ///
    /// Root help and version flags are skipped. Scanning stops at the first
    /// other token that is not a global flag, so arguments meant for a
    /// subcommand or plugin are never consumed.
    pub fn scan<S: AsRef<str>>(args: &[S]) -> Self {
        let mut overrides = Self::default();
        let mut iter = args.iter().map(AsRef::as_ref);

        while let Some(arg) = iter.next() {
            match arg {
                "--disable-plugins" => overrides.disable_plugins = true,
                "-h" | "--help" | "-V" | "--version" => {}
                "--home" => match iter.next() {
                    Some(value) => overrides.home = Some(PathBuf::from(value)),
                    None => break,
                },
                _ => match arg.strip_prefix("--home=") {
                    Some(value) => overrides.home = Some(PathBuf::from(value)),
                    None => break,
                },
            }
        }

        overrides
    }
}

/// Contents of `<home>/config.json`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub disable_plugins: bool,
}

/// Resolved settings consumed by the plugin subsystem.
#[derive(Debug, Clone)]
pub struct Settings {
    pub home: Home,
    pub disable_plugins: bool,
}

impl Settings {
    pub fn new(home: Home) -> Self {
        Self {
            home,
            disable_plugins: false,
        }
    }

    /// Resolve settings from the process environment and config file.
    pub fn load(overrides: &Overrides) -> Result<Self> {
        Self::load_with(overrides, |key| std::env::var(key).ok())
    }

    /// Resolve settings using `env` as the environment lookup.
    pub fn load_with<F>(overrides: &Overrides, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let home = match (&overrides.home, env(HOME_ENV)) {
            (Some(path), _) => Home::new(path.clone()),
            (None, Some(value)) if !value.trim().is_empty() => Home::new(expand_env(&value)),
            _ => Home::default_dir(),
        };

        let file = read_file_config(&home.config_file())?;
        let mut disable_plugins = file.disable_plugins;

        if let Some(value) = env(DISABLE_PLUGINS_ENV) {
            disable_plugins = parse_bool(&value).ok_or_else(|| {
                LedgerError::Config(format!(
                    "{} must be a boolean, got '{}'",
                    DISABLE_PLUGINS_ENV, value
                ))
            })?;
        }

        if overrides.disable_plugins {
            disable_plugins = true;
        }

        debug!(home = %home, disable_plugins, "Resolved settings");

        Ok(Self {
            home,
            disable_plugins,
        })
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    if !path.exists() {
        return Ok(FileConfig::default());
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        LedgerError::Config(format!("Failed to read {}: {}", path.display(), e))
    })?;

    serde_json::from_str(&content).map_err(|e| {
        LedgerError::Config(format!("Failed to parse {}: {}", path.display(), e))
    })
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
