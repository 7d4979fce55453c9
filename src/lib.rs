//! sidecopy - rolling timestamped backups of saved files
//!
//! Every time a working file is saved, a timestamped copy is placed in a
//! backup root directory. Only the newest `retention` copies per file are
//! kept; older ones are evicted. Any copy can later be restored over the
//! working file.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `backup`: Naming scheme, backup set management and restore
//! - `storage`: Atomic temp-then-rename file writes
//! - `config`: Configuration and path management
//! - `error`: Custom error types
//! - `cli`: Command handlers for the `sidecopy` binary
//!
//! # Example
//!
//! ```rust,ignore
//! use sidecopy::backup::{BackupSetManager, IdentityMode};
//! use sidecopy::config::{Settings, SidecopyPaths};
//!
//! let paths = SidecopyPaths::new()?;
//! let settings = Settings::load_or_create(&paths)?;
//! let root = settings.resolved_backup_root(&paths)?;
//! let manager = BackupSetManager::new(root, settings.identity_mode);
//! manager.create_backup(Path::new("scene.blend"), settings.retention_count)?;
//! ```

pub mod backup;
pub mod cli;
pub mod config;
pub mod error;
pub mod storage;

pub use error::{BackupError, BackupResult};
