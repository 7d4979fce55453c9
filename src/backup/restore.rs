//! Backup restoration
//!
//! Copies a chosen backup back over the working file. The chosen backup is
//! re-validated at call time, and the working file is replaced through a
//! temporary sibling so a failed restore leaves it untouched.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::info;

use super::copier::{Clock, FileCopier};
use super::manager::{absolutize, BackupEntry, BackupId, BackupSetManager};
use crate::error::{BackupError, BackupResult};
use crate::storage::file_io::{copy_atomic, Overwrite};

/// Handles restoring working files from their backups
pub struct RestoreManager<'a, C, K> {
    sets: &'a BackupSetManager<C, K>,
}

impl<'a, C: FileCopier, K: Clock> RestoreManager<'a, C, K> {
    pub fn new(sets: &'a BackupSetManager<C, K>) -> Self {
        Self { sets }
    }

    /// Overwrite `source` with the contents of backup `id`
    ///
    /// This does not back up the current working file first; callers that
    /// want that should call `create_backup` before restoring. The backup
    /// itself is left in place.
    pub fn restore(&self, source: &Path, id: &BackupId) -> BackupResult<RestoreResult> {
        let entry = self.sets.resolve(source, id)?;
        let target = restore_target(source)?;
        check_writable(&target)?;

        let bytes = copy_atomic(&self.sets.copier, entry.path(), &target, Overwrite::Allow)
            .map_err(|e| classify_restore_error(&entry, &target, id, e))?;

        info!(
            backup = %entry.path().display(),
            target = %target.display(),
            bytes,
            "restored backup"
        );

        Ok(RestoreResult {
            backup_date: entry.created_at(),
            entry,
            target,
            bytes,
        })
    }

    /// Check that `id` could be restored over `source`, without touching it
    pub fn validate(&self, source: &Path, id: &BackupId) -> BackupResult<ValidationResult> {
        let entry = self.sets.resolve(source, id)?;
        let (target, target_problem) = match restore_target(source) {
            Ok(target) => {
                let problem = check_writable(&target).err();
                (target, problem.map(|e| e.to_string()))
            }
            Err(e) => (absolutize(source), Some(e.to_string())),
        };
        let target_size = fs::metadata(&target)
            .ok()
            .filter(|m| m.is_file())
            .map(|m| m.len());

        Ok(ValidationResult {
            backup_date: entry.created_at(),
            entry,
            target,
            target_size,
            target_problem,
        })
    }
}

/// The file a restore of `source` writes to
///
/// A symlinked working file is replaced at the file it points to; renaming
/// over the link itself would turn it into a detached copy.
fn restore_target(source: &Path) -> BackupResult<PathBuf> {
    let target = absolutize(source);
    if !target.is_symlink() {
        return Ok(target);
    }
    fs::canonicalize(&target)
        .map_err(|e| BackupError::unwritable(&target, format!("broken symlink: {}", e)))
}

/// Refuse targets we know cannot be replaced
fn check_writable(target: &Path) -> BackupResult<()> {
    let parent = target
        .parent()
        .ok_or_else(|| BackupError::unwritable(target, "no parent directory"))?;

    match fs::metadata(parent) {
        Ok(meta) if meta.is_dir() => {
            if meta.permissions().readonly() {
                return Err(BackupError::unwritable(target, "directory is read-only"));
            }
        }
        Ok(_) => return Err(BackupError::unwritable(target, "parent is not a directory")),
        Err(e) => return Err(BackupError::unwritable(target, e)),
    }

    match fs::metadata(target) {
        Ok(meta) if meta.is_dir() => Err(BackupError::unwritable(target, "target is a directory")),
        Ok(meta) if meta.permissions().readonly() => {
            Err(BackupError::unwritable(target, "file is read-only"))
        }
        _ => Ok(()),
    }
}

fn classify_restore_error(
    entry: &BackupEntry,
    target: &Path,
    id: &BackupId,
    err: io::Error,
) -> BackupError {
    match err.kind() {
        // The backup vanished between resolve and copy
        io::ErrorKind::NotFound if !entry.path().exists() => {
            BackupError::BackupNotFound(id.to_string())
        }
        io::ErrorKind::PermissionDenied => BackupError::unwritable(target, err),
        _ => BackupError::copy_failed(entry.path(), target, err),
    }
}

/// Result of a restore operation
#[derive(Debug)]
pub struct RestoreResult {
    /// The backup that was restored
    pub entry: BackupEntry,
    /// Working file that was overwritten
    pub target: PathBuf,
    /// Date the backup was created
    pub backup_date: DateTime<Utc>,
    /// Bytes written to the working file
    pub bytes: u64,
}

impl RestoreResult {
    pub fn summary(&self) -> String {
        format!(
            "Restored {} from backup of {} ({} bytes)",
            self.target.display(),
            self.backup_date.format("%Y-%m-%d %H:%M:%S UTC"),
            self.bytes
        )
    }
}

/// Result of validating a restore
#[derive(Debug)]
pub struct ValidationResult {
    pub entry: BackupEntry,
    pub target: PathBuf,
    pub backup_date: DateTime<Utc>,
    /// Current size of the working file, if it exists
    pub target_size: Option<u64>,
    /// Why the working file could not be replaced, if it could not
    pub target_problem: Option<String>,
}

impl ValidationResult {
    pub fn can_restore(&self) -> bool {
        self.target_problem.is_none()
    }

    pub fn summary(&self) -> String {
        match &self.target_problem {
            None if self.target_size.is_some() => "Ready (working file will be replaced)".into(),
            None => "Ready (working file will be recreated)".into(),
            Some(problem) => format!("Blocked: {}", problem),
        }
    }
}
