//! Config CLI commands

use std::path::PathBuf;

use clap::Subcommand;

use crate::backup::IdentityMode;
use crate::config::settings::MAX_RETENTION;
use crate::config::{Settings, SidecopyPaths};
use crate::error::{BackupError, BackupResult};

/// Config subcommands
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration and paths
    Show,

    /// Set the directory backups are stored in
    SetRoot {
        /// Backup root directory
        dir: PathBuf,
    },

    /// Set how many backups to keep per file (0 disables backups)
    SetRetention {
        count: u32,
    },

    /// Set how files are grouped: 'stem' or 'path-hash'
    SetIdentityMode {
        mode: IdentityMode,
    },
}

/// Handle a config command
pub fn handle_config_command(
    paths: &SidecopyPaths,
    settings: &mut Settings,
    cmd: ConfigCommands,
) -> BackupResult<()> {
    match cmd {
        ConfigCommands::Show => {
            println!("sidecopy Configuration");
            println!("======================");
            println!("Config file:     {}", paths.settings_file().display());
            match settings.resolved_backup_root(paths) {
                Ok(root) => println!("Backup root:     {}", root.display()),
                Err(e) => println!("Backup root:     <unresolved: {}>", e),
            }
            println!("Retention count: {}", settings.retention_count);
            println!("Identity mode:   {}", settings.identity_mode);
            return Ok(());
        }

        ConfigCommands::SetRoot { dir } => {
            let dir = std::path::absolute(&dir)
                .map_err(|e| BackupError::Config(format!("Invalid backup root: {}", e)))?;
            println!("Backup root set to {}", dir.display());
            settings.backup_root = Some(dir);
        }

        ConfigCommands::SetRetention { count } => {
            if count > MAX_RETENTION {
                return Err(BackupError::Config(format!(
                    "Retention count must be between 0 and {}",
                    MAX_RETENTION
                )));
            }
            settings.retention_count = count;
            if count == 0 {
                println!("Backups disabled.");
            } else {
                println!("Keeping {} backup(s) per file.", count);
            }
        }

        ConfigCommands::SetIdentityMode { mode } => {
            settings.identity_mode = mode;
            println!("Identity mode set to {}.", mode);
            println!("Existing backups made under another mode are not regrouped.");
        }
    }

    settings.save(paths)
}
