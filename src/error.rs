//! Error types for ledgerctl
//!
//! This module defines all error types used by the plugin subsystem and the
//! CLI around it. Uses `thiserror` for ergonomic error handling with automatic
//! `Display` and `Error` trait implementations.

use std::path::PathBuf;

use thiserror::Error;

/// The primary error type for ledgerctl operations.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// User input mistakes (bad install target, empty plugin name, etc.)
    #[error("{0}")]
    Validation(String),

    /// Filesystem failures with the underlying cause appended
    #[error("{context}: {source}")]
    Filesystem {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// A plugin metadata file is missing or malformed
    #[error("failed to load plugin metadata from {}: {reason}", path.display())]
    Metadata { path: PathBuf, reason: String },

    /// A named resource does not exist
    #[error("{0}")]
    NotFound(String),

    /// The artifact is a loadable module but breaks the factory contract
    #[error("invalid plugin module {}: {reason}", path.display())]
    ModuleContract { path: PathBuf, reason: String },

    /// The plugin process could not be started
    #[error("plugin '{name}' failed to run: {reason}")]
    Subprocess { name: String, reason: String },

    /// The plugin process exited unsuccessfully
    #[error("plugin '{name}' exited with status {code}")]
    SubprocessExit { name: String, code: i32 },

    /// Configuration errors (unreadable config file, bad values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LedgerError {
    /// Wrap an I/O error with a description of what was being attempted.
    pub fn filesystem(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Filesystem {
            context: context.into(),
            source,
        }
    }

    /// Process exit code the CLI should use when this error ends a run.
    ///
    /// A failed plugin process hands its own code through; everything else
    /// exits with 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::SubprocessExit { code, .. } => *code,
            _ => 1,
        }
    }
}

/// A specialized `Result` type for ledgerctl operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
