//! Autosave Native Messaging Host
//!
//! Launched by the browser with the extension's origin as argument. Reads
//! length-prefixed JSON requests from stdin and answers each one on stdout
//! until the browser closes the pipe.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, Level};

use autosave_core::RecordStore;
use autosave_host::config::StorageArgs;
use autosave_host::logging::{self, LogFormat};
use autosave_host::protocol::framing::{FrameCodec, DEFAULT_MAX_INCOMING, DEFAULT_MAX_OUTGOING};
use autosave_host::{AutosaveServer, StdioTransport};

#[derive(Parser)]
#[command(name = "autosave-host")]
#[command(author, version, about = "Native messaging host for the autosave browser extension")]
struct Cli {
    #[command(flatten)]
    storage: StorageArgs,

    /// Largest request body accepted, in bytes
    #[arg(
        long,
        env = "AUTOSAVE_MAX_MESSAGE_BYTES",
        default_value_t = DEFAULT_MAX_INCOMING,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    max_message_bytes: u32,

    /// Also append log lines to this file
    #[arg(long, env = "AUTOSAVE_LOG_FILE", value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Log line format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Native window handle passed by Chrome on Windows
    #[arg(long, hide = true)]
    parent_window: Option<String>,

    /// Caller origin (Chrome) or manifest path and extension id (Firefox)
    #[arg(hide = true)]
    launcher_args: Vec<String>,
}

fn main() -> ExitCode {
    // Parse before logging so --help/--version print cleanly
    let cli = Cli::parse();

    if let Err(e) = logging::init(Level::INFO, cli.log_format, cli.log_file.as_deref()) {
        eprintln!("autosave-host: {:#}", e);
        return ExitCode::FAILURE;
    }

    info!("Autosave host v{} starting...", env!("CARGO_PKG_VERSION"));
    if !cli.launcher_args.is_empty() || cli.parent_window.is_some() {
        info!(
            caller = ?cli.launcher_args,
            parent_window = ?cli.parent_window,
            "Launched by browser"
        );
    }

    let config = match cli.storage.resolve() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let store = match RecordStore::open(config.layout.clone()) {
        Ok(store) => {
            let stats = store.stats();
            info!(
                data_dir = %config.layout.data_dir.display(),
                backup_dir = %config.layout.backup_dir.display(),
                images = stats.total_images,
                prompts = stats.total_prompts,
                pages = stats.total_pages,
                "Storage initialized"
            );
            store
        }
        Err(e) => {
            error!("Failed to initialize storage: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!(
        mode = %config.rotation.mode,
        max_backup_files = config.rotation.max_backup_files,
        "Cleanup policy"
    );

    let mut server = AutosaveServer::new(store, config.rotation);
    let transport = StdioTransport::new(FrameCodec::new(cli.max_message_bytes, DEFAULT_MAX_OUTGOING));

    info!("Starting native messaging loop on stdio");
    match transport.run(&mut server) {
        Ok(()) => {
            info!("Autosave host shutting down");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Native messaging loop failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
