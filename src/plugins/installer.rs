//! Plugin installation and removal
//!
//! Installing validates a candidate source directory and publishes it
//! through a [`PluginStore`]; uninstalling removes the published entry by
//! plugin name. Installation is not idempotent: publishing a name that is
//! already published fails and leaves the existing entry alone.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use crate::error::{LedgerError, Result};

use super::store::{load_metadata, PluginStore};
use super::types::PublishedPlugin;

static NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_\-]{0,63}$").expect("plugin name pattern is valid")
});

/// Publishes and unpublishes plugins.
///
/// The metadata filename is always the store's, so anything installed can
/// be listed again.
pub struct Installer<S> {
    store: S,
}

impl<S: PluginStore> Installer<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Install the plugin whose source directory is `source`.
    ///
    /// # Errors
    /// - `LedgerError::Validation` if `source` does not exist, lacks a
    ///   metadata file, or declares a name that is not link-safe
    /// - `LedgerError::Metadata` if the metadata file is malformed
    /// - `LedgerError::Filesystem` if the plugin is already published or
    ///   the plugins directory cannot be created
    pub fn install(&self, source: &Path) -> Result<PublishedPlugin> {
        self.store.init()?;

        self.validate(source)?;

        let path = source.canonicalize().map_err(|e| {
            LedgerError::filesystem(format!("failed to resolve {}", source.display()), e)
        })?;
        let metadata = load_metadata(&path, self.store.filename())?;
        validate_name(&metadata.name)?;

        let entry = self.store.publish(&metadata.name, &path)?;

        info!(plugin = %metadata.name, path = %path.display(), "Installed plugin");

        Ok(PublishedPlugin {
            metadata,
            path,
            entry,
        })
    }

    /// Remove the first published plugin named `name`.
    pub fn uninstall(&self, name: &str) -> Result<PublishedPlugin> {
        let plugin = self
            .store
            .list()?
            .into_iter()
            .find(|p| p.name() == name)
            .ok_or_else(|| LedgerError::NotFound(format!("plugin '{}' was not found", name)))?;

        self.store.unpublish(&plugin)?;

        info!(plugin = %name, "Uninstalled plugin");
        Ok(plugin)
    }

    fn validate(&self, source: &Path) -> Result<()> {
        if !source.exists() {
            return Err(LedgerError::Validation(format!(
                "plugin does not exist: {}",
                source.display()
            )));
        }

        let filename = self.store.filename();
        if !source.join(filename).is_file() {
            return Err(LedgerError::Validation(format!(
                "{} does not exist in {}",
                filename,
                source.display()
            )));
        }

        Ok(())
    }
}

/// Check that a plugin name can be used as a link name and a subcommand.
pub fn validate_name(name: &str) -> Result<()> {
    if !NAME_RE.is_match(name) {
        return Err(LedgerError::Validation(format!(
            "Invalid plugin name '{}': must be 1-64 alphanumeric characters, hyphens or underscores, starting with alphanumeric",
            name
        )));
    }
    Ok(())
}
