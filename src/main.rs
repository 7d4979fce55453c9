use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sidecopy::cli::{handle_backup_command, handle_config_command, BackupCommands, BackupOptions};
use sidecopy::config::{Settings, SidecopyPaths};

#[derive(Parser)]
#[command(
    name = "sidecopy",
    version,
    about = "Rolling timestamped backups for files you save",
    long_about = "sidecopy keeps a bounded set of timestamped copies of a working file \
                  in a backup directory. Run `create` after each save; the oldest \
                  copies are evicted once the retention count is exceeded."
)]
struct Cli {
    /// Backup root directory (overrides the configured one)
    #[arg(long, global = true, env = "SIDECOPY_BACKUP_ROOT")]
    root: Option<PathBuf>,

    /// Number of backups to keep per file (overrides the configured one)
    #[arg(long, global = true, value_parser = clap::value_parser!(u32).range(0..=256))]
    retention: Option<u32>,

    /// Log progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Backup(BackupCommands),

    /// Configuration commands
    #[command(subcommand)]
    Config(sidecopy::cli::ConfigCommands),
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_env("SIDECOPY_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let paths = SidecopyPaths::new()?;
    let mut settings = Settings::load_or_create(&paths)?;

    match cli.command {
        Commands::Backup(cmd) => {
            let backup_root = match cli.root {
                Some(root) => root,
                None => settings.resolved_backup_root(&paths)?,
            };
            let opts = BackupOptions {
                backup_root,
                retention: cli.retention.unwrap_or(settings.retention_count),
                identity_mode: settings.identity_mode,
            };
            tracing::debug!(
                root = %opts.backup_root.display(),
                retention = opts.retention,
                "resolved options"
            );
            handle_backup_command(&opts, cmd)?;
        }
        Commands::Config(cmd) => {
            handle_config_command(&paths, &mut settings, cmd)?;
        }
    }

    Ok(())
}
