//! In-process plugin modules
//!
//! A plugin whose command base is a dynamic library (`.so`, `.dylib`,
//! `.dll`) can run inside the ledgerctl process instead of as a subprocess.
//! The library must export a [`PluginDeclaration`] under the symbol
//! `LEDGERCTL_PLUGIN`, which is what [`export_plugin!`](crate::export_plugin)
//! generates:
//!
//! ```rust,ignore
//! use ledgerctl::plugins::{PluginCommand, PluginContext};
//!
//! struct Echo;
//!
//! #[async_trait::async_trait]
//! impl PluginCommand for Echo {
//!     async fn run(&self, args: Vec<String>) -> ledgerctl::Result<()> {
//!         println!("{}", args.join(" "));
//!         Ok(())
//!     }
//! }
//!
//! fn new(_ctx: &PluginContext) -> Box<dyn PluginCommand> {
//!     Box::new(Echo)
//! }
//!
//! ledgerctl::export_plugin!(new);
//! ```
//!
//! Loading distinguishes three outcomes. An artifact that cannot be opened
//! as a library at all is [`LoadOutcome::NotAModule`], the normal case for
//! scripts and binaries. A library that opens but does not honour the
//! declaration contract is a hard [`LedgerError::ModuleContract`] error.
//! Anything else is [`LoadOutcome::Loaded`].
//!
//! Opened libraries are never unloaded. There is no safe point to do so
//! once their code has been handed out, so each opened library is leaked
//! for the rest of the process.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use libloading::Library;
use tracing::{debug, info};

use crate::config::{Settings, Streams};
use crate::error::{LedgerError, Result};

/// Name of the symbol every module plugin must export.
pub const DECLARATION_SYMBOL: &str = "LEDGERCTL_PLUGIN";

/// Bumped whenever [`PluginDeclaration`] or [`PluginCommand`] change shape.
pub const ABI_VERSION: u32 = 1;

const EXPECTED_DEFINITION: &str = "fn(&PluginContext) -> Box<dyn PluginCommand>";

/// A command provided by a plugin.
#[async_trait]
pub trait PluginCommand: Send + Sync {
    /// Run the command with the arguments given after its name.
    async fn run(&self, args: Vec<String>) -> Result<()>;
}

/// Shared state handed to module factories.
#[derive(Debug, Clone)]
pub struct PluginContext {
    pub settings: Settings,
    pub streams: Arc<Streams>,
}

impl PluginContext {
    pub fn new(settings: Settings, streams: Arc<Streams>) -> Self {
        Self { settings, streams }
    }
}

/// The record a module plugin exports under [`DECLARATION_SYMBOL`].
///
/// Host and plugin must be built with the same compiler and the same
/// ledgerctl version; `abi_version` and `core_version` are checked before
/// `new` is called.
#[derive(Debug, Clone, Copy)]
pub struct PluginDeclaration {
    pub abi_version: u32,
    pub core_version: &'static str,
    pub new: fn(&PluginContext) -> Box<dyn PluginCommand>,
}

/// Export a command factory from a `cdylib` plugin crate.
#[macro_export]
macro_rules! export_plugin {
    ($factory:path) => {
        #[doc(hidden)]
        #[no_mangle]
        pub static LEDGERCTL_PLUGIN: $crate::plugins::PluginDeclaration =
            $crate::plugins::PluginDeclaration {
                abi_version: $crate::plugins::ABI_VERSION,
                core_version: $crate::VERSION,
                new: $factory,
            };
    };
}

/// Result of trying to load an artifact as a module.
pub enum LoadOutcome {
    /// The artifact is a module; here is its command.
    Loaded(Box<dyn PluginCommand>),
    /// The artifact is not a loadable module. Fall back to a subprocess.
    NotAModule,
}

impl std::fmt::Debug for LoadOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadOutcome::Loaded(_) => f.write_str("Loaded(..)"),
            LoadOutcome::NotAModule => f.write_str("NotAModule"),
        }
    }
}

/// Resolves plugin artifacts as in-process modules.
#[cfg_attr(test, mockall::automock)]
pub trait ModuleLoader {
    /// Try to load `path` as a module and build its command with `ctx`.
    ///
    /// Returns `Ok(LoadOutcome::NotAModule)` when `path` cannot be opened
    /// as a library, and `Err(LedgerError::ModuleContract)` when it can but
    /// does not export a valid declaration.
    fn load_module(&self, path: &Path, ctx: &PluginContext) -> Result<LoadOutcome>;
}

/// Loads module plugins with the platform dynamic loader.
#[derive(Debug, Default, Clone, Copy)]
pub struct DylibLoader;

impl ModuleLoader for DylibLoader {
    fn load_module(&self, path: &Path, ctx: &PluginContext) -> Result<LoadOutcome> {
        // dlopen("") opens the host program itself, and bare names would be
        // searched on the library path. Only real files can be modules.
        if path.as_os_str().is_empty() || !path.is_file() {
            debug!(path = %path.display(), "Not a module file");
            return Ok(LoadOutcome::NotAModule);
        }

        // SAFETY: opening a library runs its initialisers. Plugins are
        // trusted code installed by the user.
        let library = match unsafe { Library::new(path) } {
            Ok(library) => library,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Not a loadable module");
                return Ok(LoadOutcome::NotAModule);
            }
        };
        let library: &'static Library = Box::leak(Box::new(library));

        // SAFETY: the symbol, if present, is the static emitted by
        // `export_plugin!`. The library is leaked so the reference never
        // dangles.
        let declaration: Option<&'static PluginDeclaration> = unsafe {
            library
                .get::<*const PluginDeclaration>(DECLARATION_SYMBOL.as_bytes())
                .ok()
                .and_then(|symbol| (*symbol).as_ref())
        };

        let declaration = check_declaration(path, declaration)?;
        info!(path = %path.display(), "Loaded module plugin");
        Ok(LoadOutcome::Loaded((declaration.new)(ctx)))
    }
}

/// A loader for targets without dynamic loading: every artifact is run as
/// a subprocess.
#[derive(Debug, Default, Clone, Copy)]
pub struct SubprocessOnlyLoader;

impl ModuleLoader for SubprocessOnlyLoader {
    fn load_module(&self, _path: &Path, _ctx: &PluginContext) -> Result<LoadOutcome> {
        Ok(LoadOutcome::NotAModule)
    }
}

/// Verify that an opened module exported a declaration of the expected
/// shape.
pub fn check_declaration<'a>(
    path: &Path,
    declaration: Option<&'a PluginDeclaration>,
) -> Result<&'a PluginDeclaration> {
    let declaration = declaration.ok_or_else(|| LedgerError::ModuleContract {
        path: path.to_path_buf(),
        reason: format!(
            "could not find symbol {}. Plugin must export it with export_plugin!",
            DECLARATION_SYMBOL
        ),
    })?;

    if declaration.abi_version != ABI_VERSION || declaration.core_version != crate::VERSION {
        return Err(LedgerError::ModuleContract {
            path: path.to_path_buf(),
            reason: format!(
                "{} does not match expected definition {} (plugin abi {} / ledgerctl {}, host abi {} / ledgerctl {})",
                DECLARATION_SYMBOL,
                EXPECTED_DEFINITION,
                declaration.abi_version,
                declaration.core_version,
                ABI_VERSION,
                crate::VERSION
            ),
        });
    }

    Ok(declaration)
}
