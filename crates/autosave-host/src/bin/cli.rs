//! Autosave CLI
//!
//! Inspect and maintain the host's data directory, and run the snapshot
//! organizer.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::Level;

use autosave_core::retention::{self, BackupFile};
use autosave_core::storage::copy_atomic;
use autosave_core::{
    GcReport, OrganizeError, OrganizeReport, Organizer, OrganizerConfig, RecordKind, RecordStore,
    RotationOutcome,
};
use autosave_host::config::{HostConfig, StorageArgs};
use autosave_host::logging::{self, LogFormat};

/// Autosave - manage saved browser records
#[derive(Parser)]
#[command(name = "autosave")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "CLI for the autosave native messaging host")]
struct Cli {
    #[command(flatten)]
    storage: StorageArgs,

    /// Show info-level logs
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show collection sizes
    Stats,

    /// Write a snapshot of every collection
    Export {
        /// Copy the snapshot here as well
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Delete every collection, the stats file and all backups
    Clear {
        /// Skip confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// List archived copies, newest first
    Backups {
        /// Only this collection (image, prompt or page)
        #[arg(long, value_parser = parse_kind)]
        kind: Option<RecordKind>,
    },

    /// Delete archived copies beyond the newest KEEP
    Prune {
        #[arg(long, value_parser = parse_kind)]
        kind: RecordKind,
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        keep: u64,
    },

    /// Replace a collection with the records of a backup file
    Restore {
        #[arg(value_parser = parse_kind)]
        kind: RecordKind,
        file: PathBuf,
    },

    /// Show the active cleanup policy and backup count
    CleanupInfo,

    /// Move the newest extension dump from the downloads folder into place
    Organize {
        /// Organizer config file
        #[arg(long, default_value = "organizer_config.json")]
        config: PathBuf,
        #[arg(long)]
        download_folder: Option<PathBuf>,
        #[arg(long)]
        target_folder: Option<PathBuf>,
        #[arg(long)]
        backup_folder: Option<PathBuf>,
        #[arg(long)]
        pattern: Option<String>,
        /// Leave processed dumps where they are
        #[arg(long)]
        no_backup: bool,
        /// Print config and matching files, then exit
        #[arg(long)]
        status: bool,
        /// Keep running every `auto_run_interval` seconds
        #[arg(long)]
        watch: bool,
        /// Override `auto_run_interval` (seconds)
        #[arg(long)]
        interval: Option<u64>,
    },
}

fn parse_kind(s: &str) -> Result<RecordKind, String> {
    s.parse()
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { Level::INFO } else { Level::WARN };
    logging::init(level, LogFormat::Text, None)?;

    match cli.command {
        Commands::Stats => run_stats(&cli.storage.resolve()?),
        Commands::Export { output } => run_export(&cli.storage.resolve()?, output),
        Commands::Clear { yes } => run_clear(&cli.storage.resolve()?, yes),
        Commands::Backups { kind } => run_backups(&cli.storage.resolve()?, kind),
        Commands::Prune { kind, keep } => run_prune(&cli.storage.resolve()?, kind, keep),
        Commands::Restore { kind, file } => run_restore(&cli.storage.resolve()?, kind, &file),
        Commands::CleanupInfo => run_cleanup_info(&cli.storage.resolve()?),
        Commands::Organize {
            config,
            download_folder,
            target_folder,
            backup_folder,
            pattern,
            no_backup,
            status,
            watch,
            interval,
        } => {
            let path = config;
            let mut config = OrganizerConfig::load(&path)?;
            let mut changed = false;
            if let Some(dir) = download_folder {
                config.download_folder = dir;
                changed = true;
            }
            if let Some(dir) = target_folder {
                config.target_folder = dir;
                changed = true;
            }
            if let Some(dir) = backup_folder {
                config.backup_folder = dir;
                changed = true;
            }
            if let Some(pattern) = pattern {
                config.file_pattern = pattern;
                changed = true;
            }
            if no_backup {
                config.backup_old_files = false;
                changed = true;
            }
            if let Some(secs) = interval {
                config.auto_run_interval = secs;
                changed = true;
            }
            if changed {
                config.save(&path)?;
            }

            let organizer = Organizer::new(config);
            if status {
                run_organize_status(&organizer)
            } else if watch {
                run_organize_watch(&organizer).await
            } else {
                let report = organizer.organize()?;
                print_organize_report(&report);
                Ok(())
            }
        }
    }
}

fn open_store(config: &HostConfig) -> anyhow::Result<RecordStore> {
    RecordStore::open(config.layout.clone()).with_context(|| {
        format!("Cannot open data directory {}", config.layout.data_dir.display())
    })
}

fn run_stats(config: &HostConfig) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let stats = store.stats();

    println!("{}", "=== Autosave Statistics ===".cyan().bold());
    println!();
    println!("{}: {}", "Images".white().bold(), stats.total_images);
    println!("{}: {}", "Prompts".white().bold(), stats.total_prompts);
    println!("{}: {}", "Pages".white().bold(), stats.total_pages);
    println!("{}: {}", "Data Directory".white().bold(), stats.data_directory);
    println!("{}: {}", "Backup Directory".white().bold(), config.layout.backup_dir.display());
    println!("{}: {}", "Backup Files".white().bold(), store.backup_count()?);
    Ok(())
}

fn run_export(config: &HostConfig, output: Option<PathBuf>) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let path = store.export_snapshot()?;
    println!("{}: {}", "Exported".green().bold(), path.display());

    if let Some(output) = output {
        copy_atomic(&path, &output)
            .with_context(|| format!("Cannot copy export to {}", output.display()))?;
        println!("{}: {}", "Copied to".green().bold(), output.display());
    }
    Ok(())
}

fn run_clear(config: &HostConfig, yes: bool) -> anyhow::Result<()> {
    let mut store = open_store(config)?;
    let stats = store.stats();

    println!("{}", "=== Clear All Data ===".red().bold());
    println!();
    println!(
        "This removes {} images, {} prompts, {} pages and {} backup files.",
        stats.total_images,
        stats.total_prompts,
        stats.total_pages,
        store.backup_count()?
    );

    if !yes {
        print!("{} ", "Continue? [y/N]".yellow().bold());
        io::stdout().flush()?;
        let mut answer = String::new();
        io::stdin().read_line(&mut answer)?;
        if !matches!(answer.trim(), "y" | "Y" | "yes") {
            println!("{}", "Aborted.".dimmed());
            return Ok(());
        }
    }

    let report = store.clear_all()?;
    println!("{}: {} files", "Removed".green().bold(), report.removed.len());
    Ok(())
}

fn run_backups(config: &HostConfig, kind: Option<RecordKind>) -> anyhow::Result<()> {
    let kinds: Vec<RecordKind> = match kind {
        Some(kind) => vec![kind],
        None => RecordKind::ALL.to_vec(),
    };

    println!("{}", "=== Backups ===".cyan().bold());
    for kind in kinds {
        let files = retention::list_backups(&config.layout.backup_dir, kind.stem())?;
        println!();
        println!("{} ({})", kind.stem().white().bold(), files.len());
        if files.is_empty() {
            println!("  {}", "none".dimmed());
        }
        for file in &files {
            print_backup(file);
        }
    }
    Ok(())
}

fn print_backup(file: &BackupFile) {
    let modified: DateTime<Local> = file.modified.into();
    println!(
        "  {}  {}",
        modified.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
        file.file_name()
    );
}

fn run_prune(config: &HostConfig, kind: RecordKind, keep: u64) -> anyhow::Result<()> {
    let keep = usize::try_from(keep).context("--keep is too large")?;
    let report = retention::collect_excess(&config.layout.backup_dir, kind.stem(), keep)?;
    print_gc(&report);
    Ok(())
}

fn print_gc(report: &GcReport) {
    println!("{}: {}", "Kept".white().bold(), report.kept);
    println!("{}: {}", "Deleted".white().bold(), report.deleted.len());
    for path in &report.deleted {
        println!("  {} {}", "-".red(), path.display());
    }
    if !report.failed.is_empty() {
        println!("{}: {}", "Failed".yellow().bold(), report.failed.len());
        for path in &report.failed {
            println!("  {} {}", "!".yellow().bold(), path.display());
        }
    }
}

fn run_restore(config: &HostConfig, kind: RecordKind, file: &Path) -> anyhow::Result<()> {
    let mut store = open_store(config)?;
    let report = store.restore_from(kind, file, config.rotation.policy())?;

    println!("{}", "=== Restore ===".cyan().bold());
    println!("{}: {}", "Collection".white().bold(), report.kind.stem());
    println!("{}: {}", "Restored".green().bold(), report.restored);
    if report.duplicates_dropped > 0 {
        println!("{}: {}", "Duplicates dropped".yellow(), report.duplicates_dropped);
    }
    if report.invalid_dropped > 0 {
        println!("{}: {}", "Records without key dropped".yellow(), report.invalid_dropped);
    }
    print_rotation(&report.rotation);
    Ok(())
}

fn print_rotation(outcome: &RotationOutcome) {
    match outcome {
        RotationOutcome::Untouched | RotationOutcome::Kept => {}
        RotationOutcome::Deleted => println!("{}", "Previous file deleted".dimmed()),
        RotationOutcome::Archived { backup, gc } => {
            println!("{}: {}", "Previous file archived".white().bold(), backup.display());
            if !gc.deleted.is_empty() {
                println!("{}: {}", "Old backups removed".white().bold(), gc.deleted.len());
            }
        }
        RotationOutcome::RenamedAside(path) => {
            println!("{}: {}", "Previous file renamed".white().bold(), path.display());
        }
    }
}

fn run_cleanup_info(config: &HostConfig) -> anyhow::Result<()> {
    let store = open_store(config)?;
    println!("{}", "=== Cleanup Policy ===".cyan().bold());
    println!("{}: {}", "Mode".white().bold(), config.rotation.mode);
    println!("{}: {}", "Max Backup Files".white().bold(), config.rotation.max_backup_files);
    println!("{}: {}", "Backup Directory".white().bold(), config.layout.backup_dir.display());
    println!("{}: {}", "Current Backups".white().bold(), store.backup_count()?);
    Ok(())
}

fn run_organize_status(organizer: &Organizer) -> anyhow::Result<()> {
    let config = organizer.config();
    println!("{}", "=== Organizer ===".cyan().bold());
    println!("{}: {}", "Download Folder".white().bold(), config.download_folder.display());
    println!("{}: {}", "Pattern".white().bold(), config.file_pattern);
    println!("{}: {}", "Target".white().bold(), config.target_path().display());
    println!(
        "{}: {}",
        "Backup Folder".white().bold(),
        if config.backup_old_files {
            config.backup_folder.display().to_string()
        } else {
            "disabled".to_string()
        }
    );
    println!("{}: {}", "Max Backup Files".white().bold(), config.max_backup_files);
    println!("{}: {}s", "Watch Interval".white().bold(), config.auto_run_interval);

    let files = organizer.find_files()?;
    println!();
    println!("{} ({})", "Matching Files".white().bold(), files.len());
    if files.is_empty() {
        println!("  {}", "none".dimmed());
    }
    for (i, file) in files.iter().enumerate() {
        let modified: DateTime<Local> = file.modified.into();
        let marker = if i == 0 { "*".green().bold() } else { " ".normal() };
        println!(
            "  {} {}  {}",
            marker,
            modified.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
            file.path.display()
        );
    }
    Ok(())
}

async fn run_organize_watch(organizer: &Organizer) -> anyhow::Result<()> {
    let secs = organizer.config().auto_run_interval.max(1);
    println!(
        "{} every {}s, Ctrl-C to stop",
        "Watching".cyan().bold(),
        secs
    );

    let mut ticker = tokio::time::interval(Duration::from_secs(secs));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match organizer.organize() {
                    Ok(report) => print_organize_report(&report),
                    Err(OrganizeError::NoFiles { .. }) => {}
                    Err(e) => eprintln!("{} {}", "!".yellow().bold(), e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                println!("{}", "Stopped.".dimmed());
                return Ok(());
            }
        }
    }
}

fn print_organize_report(report: &OrganizeReport) {
    let stamp = Local::now().format("%H:%M:%S").to_string();
    println!(
        "[{}] {} {} -> {}",
        stamp.dimmed(),
        "Organized".green().bold(),
        report.source.display(),
        report.target.display()
    );
    println!(
        "  {} images, {} prompts",
        report.summary.images, report.summary.prompts
    );
    print_rotation(&report.rotation);
    if !report.archived_sources.is_empty() {
        println!("  {}: {}", "Moved to backup".white().bold(), report.archived_sources.len());
    }
    if !report.gc.deleted.is_empty() {
        println!("  {}: {}", "Old backups removed".white().bold(), report.gc.deleted.len());
    }
}
