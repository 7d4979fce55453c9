//! Error types for sidecopy
//!
//! Every file-system failure is translated into one of these kinds at the
//! backup manager boundary; raw `std::io::Error` values never reach the host.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// The main error type for sidecopy operations
#[derive(Error, Debug)]
pub enum BackupError {
    /// Backup root is missing, not listable, or could not be created
    #[error("Backup root unavailable: {}: {reason}", path.display())]
    BackupRootUnavailable { path: PathBuf, reason: String },

    /// A file name does not follow the backup naming scheme
    ///
    /// Swallowed during enumeration; only surfaced by direct decode calls.
    #[error("Not a backup file name: {0}")]
    MalformedName(String),

    /// The chosen backup no longer exists (evicted or deleted externally)
    #[error("Backup not found: {0}")]
    BackupNotFound(String),

    /// The working file's location cannot be written
    #[error("Destination not writable: {}: {reason}", path.display())]
    DestinationUnwritable { path: PathBuf, reason: String },

    /// An I/O error happened while copying; no partial file was left behind
    #[error("Copy failed from {} to {}: {reason}", from.display(), to.display())]
    CopyFailed {
        from: PathBuf,
        to: PathBuf,
        reason: String,
    },

    /// An old backup could not be deleted during retention enforcement
    #[error("Failed to evict backup {}: {reason}", path.display())]
    EvictionFailed { path: PathBuf, reason: String },

    /// The working file's path yields no usable backup name
    ///
    /// It has no file name, or one that is not valid UTF-8.
    #[error("Working file cannot be backed up: {}: {reason}", path.display())]
    UnsupportedWorkingFile { path: PathBuf, reason: String },

    /// Invalid or unreadable settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// Settings file I/O errors
    #[error("Storage error: {0}")]
    Storage(String),
}

impl BackupError {
    pub(crate) fn root_unavailable(path: &Path, reason: impl ToString) -> Self {
        Self::BackupRootUnavailable {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn unwritable(path: &Path, reason: impl ToString) -> Self {
        Self::DestinationUnwritable {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn copy_failed(from: &Path, to: &Path, reason: impl ToString) -> Self {
        Self::CopyFailed {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn unsupported_file(path: &Path) -> Self {
        Self::UnsupportedWorkingFile {
            path: path.to_path_buf(),
            reason: "file name is missing or not valid UTF-8".to_string(),
        }
    }

    /// Check if this is a "backup not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::BackupNotFound(_))
    }

    /// Check if the backup root could not be used
    pub fn is_root_unavailable(&self) -> bool {
        matches!(self, Self::BackupRootUnavailable { .. })
    }

    /// Whether the failure aborts the operation that produced it
    ///
    /// Eviction failures are warnings: the backup that triggered them stands.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::EvictionFailed { .. } | Self::MalformedName(_))
    }
}

impl From<serde_json::Error> for BackupError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type alias for sidecopy operations
pub type BackupResult<T> = Result<T, BackupError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BackupError::Config("retention_count must be at most 256".into());
        assert_eq!(
            err.to_string(),
            "Configuration error: retention_count must be at most 256"
        );
    }

    #[test]
    fn test_not_found_error() {
        let err = BackupError::BackupNotFound("scene_20250101-000000-000000-000.blend".into());
        assert!(err.is_not_found());
        assert!(err.is_fatal());
        assert!(err.to_string().starts_with("Backup not found: scene_"));
    }

    #[test]
    fn test_root_unavailable_display() {
        let path = Path::new("/mnt/gone");
        let err = BackupError::root_unavailable(path, "No such file or directory");
        assert!(err.is_root_unavailable());
        assert_eq!(
            err.to_string(),
            "Backup root unavailable: /mnt/gone: No such file or directory"
        );
    }

    #[test]
    fn test_eviction_failure_is_not_fatal() {
        let err = BackupError::EvictionFailed {
            path: PathBuf::from("/b/scene_x.blend"),
            reason: "permission denied".into(),
        };
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_unsupported_file_display() {
        let err = BackupError::unsupported_file(Path::new("/"));
        assert!(err.is_fatal());
        assert_eq!(
            err.to_string(),
            "Working file cannot be backed up: /: file name is missing or not valid UTF-8"
        );
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: BackupError = json_err.into();
        assert!(matches!(err, BackupError::Config(_)));
    }
}
