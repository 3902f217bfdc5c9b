//! Plugin system for ledgerctl
//!
//! Plugins add top-level subcommands to the CLI without rebuilding it. A
//! plugin is a source directory holding a `plugin.yaml` metadata file and
//! whatever the metadata's `command` points at: a script, a binary, or a
//! dynamic library built against this crate.
//!
//! # Architecture
//!
//! - **types**: metadata parsed from `plugin.yaml` and the published form
//! - **store**: the plugins directory, one symbolic link per plugin
//! - **installer**: validation, install and uninstall
//! - **module**: in-process modules loaded through `libloading`
//! - **process**: subprocess execution of everything else
//! - **registry**: the `clap` command tree built-ins and plugins share
//! - **loader**: startup wiring from published plugins to the tree
//!
//! # Plugin Directory Structure
//!
//! ```text
//! ~/.ledgerctl/plugins/
//! ├── echo -> /home/user/src/echo-plugin
//! └── query -> /opt/ledger/query-plugin
//!
//! /home/user/src/echo-plugin/
//! ├── plugin.yaml
//! └── echo.sh
//! ```
//!
//! # Example plugin.yaml
//!
//! ```yaml
//! name: echo
//! usage: echo [words...]
//! description: Echo the arguments back
//! command: ./echo.sh --flag
//! ```

pub mod installer;
pub mod loader;
pub mod module;
pub mod process;
pub mod registry;
pub mod store;
pub mod types;

pub use installer::{validate_name, Installer};
pub use loader::{load_plugins, resolve_plugin};
pub use module::{
    check_declaration, DylibLoader, LoadOutcome, ModuleLoader, PluginCommand, PluginContext,
    PluginDeclaration, SubprocessOnlyLoader, ABI_VERSION, DECLARATION_SYMBOL,
};
pub use process::{resolve_program, ProcessAdapter, ProcessCommand};
pub use registry::{AttachedCommand, CommandTree, ResolvedCommand, PLUGIN_ARGS};
pub use store::{load_metadata, PluginStore, SymlinkStore};
pub use types::{CommandLine, PluginMetadata, PublishedPlugin, METADATA_FILENAME};

/// The module loader for the current target.
#[cfg(any(unix, windows))]
pub fn default_loader() -> Box<dyn ModuleLoader> {
    Box::new(DylibLoader)
}

/// The module loader for the current target.
#[cfg(not(any(unix, windows)))]
pub fn default_loader() -> Box<dyn ModuleLoader> {
    Box::new(SubprocessOnlyLoader)
}
