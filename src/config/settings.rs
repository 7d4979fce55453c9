//! User settings for sidecopy
//!
//! Where backups go, how many to keep, and how working files are grouped.
//! The backup core never reads these; the CLI resolves them and passes the
//! values into each call.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::paths::SidecopyPaths;
use crate::backup::IdentityMode;
use crate::error::BackupError;
use crate::storage::file_io::{read_json, write_json_atomic};

/// Upper bound on retained backups per working file
pub const MAX_RETENTION: u32 = 256;

/// User settings for sidecopy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Backup root; `None` means `~/sidecopy_backups`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_root: Option<PathBuf>,

    /// Backups kept per working file; 0 disables backups
    #[serde(default = "default_retention_count")]
    pub retention_count: u32,

    /// How backups of different working files are told apart
    #[serde(default)]
    pub identity_mode: IdentityMode,
}

fn default_schema_version() -> u32 {
    1
}

fn default_retention_count() -> u32 {
    1
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            backup_root: None,
            retention_count: default_retention_count(),
            identity_mode: IdentityMode::default(),
        }
    }
}

impl Settings {
    /// Load settings from disk, or use defaults if the file doesn't exist
    ///
    /// Defaults are not persisted; the caller decides when to save.
    pub fn load_or_create(paths: &SidecopyPaths) -> Result<Self, BackupError> {
        let settings: Settings = read_json(paths.settings_file())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to disk
    pub fn save(&self, paths: &SidecopyPaths) -> Result<(), BackupError> {
        self.validate()?;
        paths.ensure_directories()?;
        write_json_atomic(paths.settings_file(), self)
    }

    pub fn validate(&self) -> Result<(), BackupError> {
        if self.retention_count > MAX_RETENTION {
            return Err(BackupError::Config(format!(
                "retention_count must be between 0 and {}, got {}",
                MAX_RETENTION, self.retention_count
            )));
        }
        if let Some(root) = &self.backup_root {
            if root.as_os_str().is_empty() {
                return Err(BackupError::Config("backup_root must not be empty".into()));
            }
        }
        Ok(())
    }

    /// Backup root to use, falling back to the default location
    pub fn resolved_backup_root(&self, paths: &SidecopyPaths) -> Result<PathBuf, BackupError> {
        match &self.backup_root {
            Some(root) => Ok(root.clone()),
            None => paths.default_backup_root(),
        }
    }
}
