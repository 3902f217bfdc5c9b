//! ledgerctl - command-line client for ledger networks, extensible with
//! plugins
//!
//! The library holds the plugin subsystem and the configuration it runs
//! on; the `ledgerctl` binary wires both into a `clap` command tree.

pub mod config;
pub mod error;
pub mod plugins;
pub mod utils;

pub use config::{Home, Settings, Streams};
pub use error::{LedgerError, Result};

/// Version of this crate. Module plugins must be built against the same
/// version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
