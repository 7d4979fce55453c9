//! CLI command handlers
//!
//! Bridges clap argument parsing with the backup and config layers.

pub mod backup;
pub mod config;

pub use backup::{handle_backup_command, BackupCommands, BackupOptions};
pub use config::{handle_config_command, ConfigCommands};
