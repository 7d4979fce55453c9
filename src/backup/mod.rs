//! Rolling backups of a single working file
//!
//! Backups live in a backup root that is separate from the working file's own
//! directory, so saving to a synced folder does not upload a pile of
//! near-identical copies.
//!
//! # Architecture
//!
//! - `naming`: pure mapping between (identity, stamp) and backup file names
//! - `BackupSetManager`: lists, creates and evicts backups in one root
//! - `RestoreManager`: validates and restores a chosen backup
//! - `FileCopier` / `Clock`: injected capabilities used by the managers
//!
//! # On-disk layout
//!
//! The backup root is flat. Each backup is a full copy named
//! `<key>_<YYYYMMDD>-<HHMMSS>-<micros>-<seq>.<ext>`; anything else in the
//! root is ignored and never deleted. In-progress copies carry a
//! `.sidecopy-tmp` suffix and are renamed into place once complete.
//!
//! # Example
//!
//! ```rust,ignore
//! use sidecopy::backup::{BackupSetManager, IdentityMode, RestoreManager};
//!
//! let manager = BackupSetManager::new("/home/me/sidecopy_backups", IdentityMode::PathHash);
//!
//! // After the host finished saving
//! let outcome = manager.create_backup(Path::new("scene.blend"), 5)?;
//!
//! // Later, roll back to the oldest retained copy
//! let set = manager.list_backups(Path::new("scene.blend"))?;
//! if let Some(oldest) = set.oldest() {
//!     RestoreManager::new(&manager).restore(Path::new("scene.blend"), &oldest.id())?;
//! }
//! ```

mod copier;
mod manager;
pub mod naming;
mod restore;

pub use copier::{Clock, FileCopier, StdCopier, SystemClock};
pub use manager::{
    BackupEntry, BackupId, BackupSet, BackupSetManager, CreateOutcome, EvictionReport, GroupSummary,
};
pub use naming::{BackupStamp, IdentityMode, WorkingFileIdentity};
pub use restore::{RestoreManager, RestoreResult, ValidationResult};
