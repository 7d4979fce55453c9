//! Path management for sidecopy
//!
//! ## Path Resolution Order
//!
//! 1. `SIDECOPY_CONFIG_DIR` environment variable (if set)
//! 2. Unix (Linux/macOS): `$XDG_CONFIG_HOME/sidecopy` or `~/.config/sidecopy`
//! 3. Windows: `%APPDATA%\sidecopy`
//!
//! The default backup root is `~/sidecopy_backups`: outside any synced
//! project folder, and easy to find.

use std::path::PathBuf;

use directories::BaseDirs;

use crate::error::BackupError;

/// Name of the default backup root under the home directory
const DEFAULT_BACKUP_DIR: &str = "sidecopy_backups";

/// Manages the paths used by sidecopy itself
#[derive(Debug, Clone)]
pub struct SidecopyPaths {
    /// Directory holding the settings file
    base_dir: PathBuf,
}

impl SidecopyPaths {
    /// Create a new SidecopyPaths instance
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self, BackupError> {
        let base_dir = match std::env::var_os("SIDECOPY_CONFIG_DIR") {
            Some(custom) => PathBuf::from(custom),
            None => resolve_default_path()?,
        };

        Ok(Self { base_dir })
    }

    /// Create SidecopyPaths with a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the path to the settings file
    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Backup root used when the settings do not name one
    pub fn default_backup_root(&self) -> Result<PathBuf, BackupError> {
        let dirs = BaseDirs::new()
            .ok_or_else(|| BackupError::Config("Could not determine home directory".into()))?;
        Ok(dirs.home_dir().join(DEFAULT_BACKUP_DIR))
    }

    /// Ensure the config directory exists
    pub fn ensure_directories(&self) -> Result<(), BackupError> {
        std::fs::create_dir_all(&self.base_dir).map_err(|e| {
            BackupError::Storage(format!("Failed to create config directory: {}", e))
        })
    }
}

/// Resolve the default config directory based on platform
#[cfg(not(windows))]
fn resolve_default_path() -> Result<PathBuf, BackupError> {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(xdg).join("sidecopy"));
    }
    let dirs = BaseDirs::new()
        .ok_or_else(|| BackupError::Config("Could not determine home directory".into()))?;
    Ok(dirs.home_dir().join(".config").join("sidecopy"))
}

/// Resolve the default config directory based on platform
#[cfg(windows)]
fn resolve_default_path() -> Result<PathBuf, BackupError> {
    let appdata = std::env::var_os("APPDATA")
        .ok_or_else(|| BackupError::Config("Could not determine APPDATA directory".into()))?;
    Ok(PathBuf::from(appdata).join("sidecopy"))
}
