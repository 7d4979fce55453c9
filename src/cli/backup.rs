//! Backup CLI commands
//!
//! The CLI stands in for the host application: `create` is the
//! save-completed hook, `list`/`info` the browsing panel, and `restore` the
//! recall action.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use tabled::{Table, Tabled};

use crate::backup::{BackupEntry, BackupId, BackupSetManager, IdentityMode, RestoreManager};
use crate::error::{BackupError, BackupResult};

/// Backup subcommands
#[derive(Subcommand)]
pub enum BackupCommands {
    /// Back up a file that was just saved
    Create {
        /// Working file
        file: PathBuf,
    },

    /// List the backups of a file, oldest first
    List {
        /// Working file
        file: PathBuf,

        /// Show full paths and details
        #[arg(short, long)]
        long: bool,
    },

    /// Restore a file from one of its backups
    Restore {
        /// Working file
        file: PathBuf,

        /// Backup name, list index, or 'latest'
        backup: String,

        /// Actually overwrite the working file
        #[arg(short, long)]
        force: bool,

        /// Back up the current working file before restoring
        #[arg(short, long)]
        snapshot: bool,
    },

    /// Show information about a specific backup
    Info {
        /// Working file
        file: PathBuf,

        /// Backup name, list index, or 'latest'
        backup: String,
    },

    /// Delete backups beyond the retention count
    Prune {
        /// Working file
        file: PathBuf,

        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },

    /// Show where the backups of a file are kept
    Where {
        /// Working file
        file: PathBuf,
    },
}

/// Values resolved from settings and command-line overrides
#[derive(Debug, Clone)]
pub struct BackupOptions {
    pub backup_root: PathBuf,
    pub retention: u32,
    pub identity_mode: IdentityMode,
}

#[derive(Tabled)]
struct BackupRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Backup")]
    name: String,
    #[tabled(rename = "Created (UTC)")]
    created: String,
    #[tabled(rename = "Age")]
    age: String,
    #[tabled(rename = "Size")]
    size: String,
}

/// Handle a backup command
pub fn handle_backup_command(opts: &BackupOptions, cmd: BackupCommands) -> BackupResult<()> {
    let manager = BackupSetManager::new(&opts.backup_root, opts.identity_mode);

    match cmd {
        BackupCommands::Create { file } => {
            let outcome = manager.create_backup(&file, opts.retention)?;

            match &outcome.entry {
                Some(entry) => {
                    println!("Backup created: {}", entry.file_name());
                    println!("Location: {}", entry.path().display());
                }
                None => {
                    println!("Backups are disabled (retention count is 0).");
                }
            }

            for path in &outcome.eviction.evicted {
                println!("Evicted: {}", display_name(path));
            }
            for failure in &outcome.eviction.failures {
                eprintln!("Warning: {}", failure);
            }
        }

        BackupCommands::List { file, long } => {
            let set = match manager.list_backups(&file) {
                Ok(set) => set,
                Err(e) if e.is_root_unavailable() && !manager.backup_root().exists() => {
                    println!("No backups found.");
                    let root = manager.backup_root();
                    println!("Backup root {} does not exist yet.", root.display());
                    return Ok(());
                }
                Err(e) => return Err(e),
            };

            if set.is_empty() {
                println!("No backups found for {}.", file.display());
                println!("Create one with: sidecopy create {}", file.display());
                return Ok(());
            }

            println!("Backups of {}", file.display());
            println!();

            let now = chrono::Utc::now();
            if long {
                for (i, entry) in set.iter().enumerate() {
                    println!(
                        "{}. {}\n   Path: {}\n   Created: {}\n   Size: {}\n   Age: {}\n",
                        i + 1,
                        entry.file_name(),
                        entry.path().display(),
                        entry.created_at().format("%Y-%m-%d %H:%M:%S%.6f UTC"),
                        format_size(entry.size_bytes()),
                        format_duration(now.signed_duration_since(entry.created_at())),
                    );
                }
            } else {
                let rows: Vec<BackupRow> = set
                    .iter()
                    .enumerate()
                    .map(|(i, entry)| {
                        let created = entry.created_at();
                        BackupRow {
                            index: i + 1,
                            name: entry.file_name(),
                            created: created.format("%Y-%m-%d %H:%M:%S").to_string(),
                            age: format_duration(now.signed_duration_since(created)),
                            size: format_size(entry.size_bytes()),
                        }
                    })
                    .collect();
                println!("{}", Table::new(&rows));
            }

            println!();
            println!("Total: {} backup(s)", set.len());
        }

        BackupCommands::Restore {
            file,
            backup,
            force,
            snapshot,
        } => {
            let id = resolve_backup_id(&manager, &file, &backup)?;
            let restorer = RestoreManager::new(&manager);
            let validation = restorer.validate(&file, &id)?;

            println!("Backup Information");
            println!("==================");
            println!("Backup: {}", validation.entry.path().display());
            println!(
                "Created: {}",
                validation.backup_date.format("%Y-%m-%d %H:%M:%S UTC")
            );
            println!("Target: {}", validation.target.display());
            println!("Status: {}", validation.summary());
            println!();

            if !force {
                println!("WARNING: This will overwrite {}!", file.display());
                println!("To proceed, run again with --force flag:");
                println!("  sidecopy restore {} {} --force", file.display(), backup);
                return Ok(());
            }

            if snapshot {
                snapshot_before_restore(&manager, &file)?;
            }

            let result = restorer.restore(&file, &id)?;
            println!("Restore complete!");
            println!("{}", result.summary());
        }

        BackupCommands::Info { file, backup } => {
            let id = resolve_backup_id(&manager, &file, &backup)?;
            let validation = RestoreManager::new(&manager).validate(&file, &id)?;
            let entry = &validation.entry;

            println!("Backup Details");
            println!("==============");
            println!("File: {}", entry.path().display());
            println!("Belongs to: {}", entry.identity());
            println!("Size: {}", format_size(entry.size_bytes()));
            println!(
                "Created: {}",
                entry.created_at().format("%Y-%m-%d %H:%M:%S%.6f UTC")
            );
            println!("Sequence: {}", entry.stamp().seq());
            println!();
            match validation.target_size {
                Some(size) => println!("Working file: {} ({})", file.display(), format_size(size)),
                None => println!("Working file: {} (missing)", file.display()),
            }
            println!("Restore: {}", validation.summary());
        }

        BackupCommands::Prune { file, force } => {
            let to_delete = manager.excess_count(&file, opts.retention)?;

            if to_delete == 0 {
                println!("No backups to prune.");
                println!("Retention count: {}", opts.retention);
                return Ok(());
            }

            println!("Prune Summary");
            println!("=============");
            println!("Retention count: {}", opts.retention);
            println!("To be deleted: {} backup(s)", to_delete);
            println!();

            if !force {
                println!("To delete old backups, run again with --force flag:");
                println!("  sidecopy prune {} --force", file.display());
                return Ok(());
            }

            let report = manager.enforce_retention(&file, opts.retention)?;
            println!("Deleted {} backup(s).", report.evicted.len());
            for failure in &report.failures {
                eprintln!("Warning: {}", failure);
            }
        }

        BackupCommands::Where { file } => {
            let summary = manager.group_summary(&file)?;
            println!("Working file: {}", file.display());
            println!("Backup root:  {}", summary.backup_root.display());
            let mode = manager.identity_mode();
            println!("Group:        {} ({} mode)", summary.identity, mode);
            println!("Backups:      {}", summary.count);
        }
    }

    Ok(())
}

/// Back up the current working file without evicting anything
///
/// Retention is raised by one for this call so the snapshot cannot push out
/// the backup that is about to be restored.
fn snapshot_before_restore(manager: &BackupSetManager, file: &Path) -> BackupResult<()> {
    if !file.exists() {
        println!("No current working file to snapshot.");
        return Ok(());
    }

    let keep = manager.list_backups(file)?.len() as u32 + 1;
    if let Some(entry) = manager.create_backup(file, keep)?.entry {
        println!("Pre-restore backup saved: {}", entry.file_name());
        println!();
    }
    Ok(())
}

/// Resolve a backup argument: a file name, a 1-based list index, or 'latest'
fn resolve_backup_id(
    manager: &BackupSetManager,
    file: &Path,
    backup: &str,
) -> BackupResult<BackupId> {
    if backup.eq_ignore_ascii_case("latest") {
        return manager
            .latest(file)?
            .map(|entry| entry.id())
            .ok_or_else(|| BackupError::BackupNotFound("latest".to_string()));
    }

    if let Ok(index) = backup.parse::<usize>() {
        let set = manager.list_backups(file)?;
        return index
            .checked_sub(1)
            .and_then(|i| set.entries().get(i))
            .map(BackupEntry::id)
            .ok_or_else(|| BackupError::BackupNotFound(format!("#{}", index)));
    }

    // Accept a path into the backup root as well as a bare name
    let name = Path::new(backup)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| backup.to_string());
    Ok(BackupId::new(name))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Format a duration in human-readable form
fn format_duration(duration: chrono::Duration) -> String {
    let total_seconds = duration.num_seconds().max(0);

    if total_seconds < 60 {
        return format!("{}s", total_seconds);
    }

    let minutes = total_seconds / 60;
    if minutes < 60 {
        return format!("{}m", minutes);
    }

    let hours = minutes / 60;
    if hours < 24 {
        return format!("{}h", hours);
    }

    format!("{}d", hours / 24)
}

/// Format a file size in human-readable form
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (BackupSetManager, PathBuf, TempDir) {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("backups");
        let manager = BackupSetManager::new(root, IdentityMode::Stem);
        let file = temp.path().join("scene.blend");
        fs::write(&file, b"data").unwrap();
        (manager, file, temp)
    }

    #[test]
    fn test_resolve_latest_and_index() {
        let (manager, file, _temp) = setup();
        let first = manager.create_backup(&file, 5).unwrap().entry.unwrap();
        let second = manager.create_backup(&file, 5).unwrap().entry.unwrap();

        let resolve = |arg: &str| resolve_backup_id(&manager, &file, arg);

        assert_eq!(resolve("latest").unwrap(), second.id());
        assert_eq!(resolve("1").unwrap(), first.id());
        assert!(resolve("0").unwrap_err().is_not_found());
        assert!(resolve("3").unwrap_err().is_not_found());
    }

    #[test]
    fn test_resolve_path_to_name() {
        let (manager, file, _temp) = setup();
        let entry = manager.create_backup(&file, 5).unwrap().entry.unwrap();
        let as_path = entry.path().display().to_string();

        let resolved = resolve_backup_id(&manager, &file, &as_path).unwrap();
        assert_eq!(resolved, entry.id());
    }

    #[test]
    fn test_snapshot_never_evicts_restore_target() {
        let (manager, file, _temp) = setup();
        let only = manager.create_backup(&file, 1).unwrap().entry.unwrap();

        snapshot_before_restore(&manager, &file).unwrap();

        let set = manager.list_backups(&file).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.oldest().unwrap(), &only);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(chrono::Duration::seconds(42)), "42s");
        assert_eq!(format_duration(chrono::Duration::minutes(5)), "5m");
        assert_eq!(format_duration(chrono::Duration::hours(30)), "1d");
        assert_eq!(format_duration(chrono::Duration::seconds(-3)), "0s");
    }
}
