//! Warden command line: data-dir bootstrap and the internal worker entry.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use warden_tools::{builtin_registry, run_worker};

#[derive(Parser)]
#[command(
    name = "warden",
    version,
    about = "Local authorization and containment backend for a single-user AI assistant"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the app data directory and database.
    Init {
        /// Override the app data directory.
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Internal worker entry spawned by the tool runner. Reads one request
    /// from stdin and writes one response to stdout.
    #[command(name = "tool-worker", hide = true)]
    ToolWorker,
}

fn main() -> Result<()> {
    let _ = env_logger::try_init();
    let cli = Cli::parse();
    match cli.command {
        Commands::ToolWorker => {
            let code = run_worker(&builtin_registry());
            std::process::exit(code);
        }
        Commands::Init { data_dir } => init(data_dir),
    }
}

fn init(data_dir: Option<PathBuf>) -> Result<()> {
    let root = match data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };
    std::fs::create_dir_all(root.join("quarantine"))
        .with_context(|| format!("creating {}", root.display()))?;
    std::fs::create_dir_all(root.join("tool_runs"))?;
    warden_store::Store::open(&root.join("warden.db")).context("opening database")?;
    log::info!("app data initialized (root={})", root.display());
    println!("initialized app data at {}", root.display());
    Ok(())
}

fn default_data_dir() -> Result<PathBuf> {
    directories::ProjectDirs::from("", "", "warden")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .context("could not resolve an app data directory")
}
