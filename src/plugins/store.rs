//! Published plugin storage
//!
//! Installed plugins are published as links inside the plugins directory,
//! one per plugin, named after the plugin and pointing at its source
//! directory. The source directory stays the single owner of the plugin's
//! content; the link exists only so enumeration is a directory listing.
//!
//! Callers go through the [`PluginStore`] trait so the link-based layout can
//! be swapped without touching the installer or the command loader.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{LedgerError, Result};

use super::types::{PluginMetadata, PublishedPlugin, METADATA_FILENAME};

/// Read/write access to the set of published plugins.
#[cfg_attr(test, mockall::automock)]
pub trait PluginStore {
    /// Make sure the plugins directory exists, creating parents as needed.
    fn init(&self) -> Result<()>;

    /// Name of the metadata file every published source directory holds.
    fn filename(&self) -> &str;

    /// Enumerate all published plugins.
    ///
    /// Re-reads the filesystem on every call. A missing plugins directory
    /// yields an empty list. Any unreadable or malformed entry fails the
    /// whole enumeration.
    fn list(&self) -> Result<Vec<PublishedPlugin>>;

    /// Publish `source` under `name` and return the published entry.
    /// Fails if `name` is already published.
    fn publish(&self, name: &str, source: &Path) -> Result<PathBuf>;

    /// Remove a published entry. The source directory is left untouched.
    fn unpublish(&self, plugin: &PublishedPlugin) -> Result<()>;
}

/// A [`PluginStore`] that keeps published plugins as symbolic links.
#[derive(Debug, Clone)]
pub struct SymlinkStore {
    dir: PathBuf,
    filename: String,
}

impl SymlinkStore {
    /// A store over `dir` using the default `plugin.yaml` metadata filename.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_filename(dir, METADATA_FILENAME)
    }

    pub fn with_filename(dir: impl Into<PathBuf>, filename: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            filename: filename.into(),
        }
    }

    /// The plugins directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn load_entry(&self, entry: PathBuf) -> Result<PublishedPlugin> {
        let path = match fs::read_link(&entry) {
            Ok(target) if target.is_absolute() => target,
            Ok(target) => self.dir.join(target),
            // Plain directories are tolerated and treated as their own source.
            Err(_) => entry.clone(),
        };
        let metadata = load_metadata(&entry, &self.filename)?;

        Ok(PublishedPlugin {
            metadata,
            path,
            entry,
        })
    }
}

impl PluginStore for SymlinkStore {
    fn filename(&self) -> &str {
        &self.filename
    }

    fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            LedgerError::filesystem(
                format!("failed to create plugins directory {}", self.dir.display()),
                e,
            )
        })
    }

    fn list(&self) -> Result<Vec<PublishedPlugin>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(dir = %self.dir.display(), "Plugins directory does not exist");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(LedgerError::filesystem(
                    format!("failed to read plugins directory {}", self.dir.display()),
                    e,
                ))
            }
        };

        let mut plugins = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                LedgerError::filesystem(
                    format!("failed to read entry in {}", self.dir.display()),
                    e,
                )
            })?;
            plugins.push(self.load_entry(entry.path())?);
        }

        Ok(plugins)
    }

    fn publish(&self, name: &str, source: &Path) -> Result<PathBuf> {
        self.init()?;

        let link = self.dir.join(name);
        create_link(source, &link).map_err(|e| {
            LedgerError::filesystem(
                format!(
                    "failed to publish plugin '{}' at {}",
                    name,
                    link.display()
                ),
                e,
            )
        })?;

        info!(plugin = %name, source = %source.display(), "Published plugin");
        Ok(link)
    }

    fn unpublish(&self, plugin: &PublishedPlugin) -> Result<()> {
        remove_link(&plugin.entry).map_err(|e| {
            LedgerError::filesystem(
                format!(
                    "failed to remove plugin '{}' at {}",
                    plugin.name(),
                    plugin.entry.display()
                ),
                e,
            )
        })?;

        info!(plugin = %plugin.name(), "Unpublished plugin");
        Ok(())
    }
}

/// Load `filename` from `dir` and parse it as plugin metadata.
///
/// Both a missing file and malformed contents are metadata errors.
pub fn load_metadata(dir: &Path, filename: &str) -> Result<PluginMetadata> {
    let path = dir.join(filename);

    let content = fs::read_to_string(&path).map_err(|e| LedgerError::Metadata {
        path: path.clone(),
        reason: e.to_string(),
    })?;

    serde_yaml::from_str(&content).map_err(|e| LedgerError::Metadata {
        path,
        reason: e.to_string(),
    })
}

#[cfg(unix)]
fn create_link(source: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(source, link)
}

#[cfg(windows)]
fn create_link(source: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_dir(source, link)
}

#[cfg(unix)]
fn remove_link(link: &Path) -> std::io::Result<()> {
    fs::remove_file(link)
}

#[cfg(windows)]
fn remove_link(link: &Path) -> std::io::Result<()> {
    fs::remove_dir(link)
}
