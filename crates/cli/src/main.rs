use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use facetfs_core::config::{self, AppConfig};
use facetfs_core::index::TagIndex;
use facetfs_core::scanner;
use facetfs_core::vfs::VfsAdapter;
use probe::SignatureProbe;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Scan { json } => run_scan(cfg, json).await,
        Commands::Ls { path, json } => run_ls(cfg, &path, json).await,
        Commands::Stat { path } => run_stat(cfg, &path).await,
        Commands::Readlink { path } => run_readlink(cfg, &path).await,
    }
}

#[derive(Parser)]
#[command(name = "facetfs")]
#[command(about = "Faceted media index over a virtual directory tree", long_about = None)]
struct Cli {
    /// Path to config TOML
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk the source tree once and index new or changed media files
    Scan {
        /// Output JSON summary
        #[arg(long)]
        json: bool,
    },
    /// List the entries of a virtual path
    Ls {
        /// Virtual path, e.g. /audio_mpeg/files
        path: String,
        /// Output JSON entries
        #[arg(long)]
        json: bool,
    },
    /// Show the entry kind of a virtual path
    Stat {
        path: String,
    },
    /// Print the real path a file-id leaf links to
    Readlink {
        path: String,
    },
}

async fn open_index(cfg: &AppConfig) -> Result<TagIndex> {
    Ok(TagIndex::open(&cfg.database.path).await?)
}

fn adapter(cfg: &AppConfig, index: TagIndex) -> VfsAdapter {
    VfsAdapter::new(index).with_root_listing(cfg.browse.list_all_at_root)
}

async fn run_scan(cfg: AppConfig, json: bool) -> Result<()> {
    let index = open_index(&cfg).await?;
    let probe = SignatureProbe::new();
    let deadline = Duration::from_secs(cfg.probe.deadline_secs);
    let root = std::path::PathBuf::from(&cfg.scan.root);

    let summary = scanner::scan(&root, &index, &probe, deadline).await?;
    if json {
        println!(
            "{}",
            serde_json::json!({
                "seen": summary.seen,
                "indexed": summary.indexed,
                "fresh": summary.fresh,
                "not_media": summary.not_media,
                "failed": summary.failed,
            })
        );
    } else {
        println!(
            "seen {} indexed {} fresh {} not media {} failed {}",
            summary.seen, summary.indexed, summary.fresh, summary.not_media, summary.failed
        );
    }
    Ok(())
}

async fn run_ls(cfg: AppConfig, path: &str, json: bool) -> Result<()> {
    let index = open_index(&cfg).await?;
    let entries = adapter(&cfg, index).readdir(path).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        for entry in entries {
            println!("{}", entry.name);
        }
    }
    Ok(())
}

async fn run_stat(cfg: AppConfig, path: &str) -> Result<()> {
    let index = open_index(&cfg).await?;
    let kind = adapter(&cfg, index).getattr(path).await?;
    println!("{:?}", kind);
    Ok(())
}

async fn run_readlink(cfg: AppConfig, path: &str) -> Result<()> {
    let index = open_index(&cfg).await?;
    let target = adapter(&cfg, index).readlink(path).await?;
    println!("{}", target.display());
    Ok(())
}
