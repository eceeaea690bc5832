//! tracker — operator CLI for the competitor tracker
//!
//! # Subcommands
//! - `run`                  — one detection pass, then dispatch what changed
//! - `digest [--days N]`    — build and send the digest for the trailing window
//! - `list [--days N]`      — print recorded updates (add `--json` for JSON)
//! - `sources`              — print the configured sources

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use competitor_tracker::{
    build_tracker,
    config::{Settings, SourceRegistry},
    logging,
};

#[derive(Debug, Parser)]
#[command(name = "tracker", version, about = "Competitor change tracker")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Check every source once and notify configured channels
    Run,

    /// Send the digest of recent updates
    Digest {
        /// Trailing window in days (defaults to DIGEST_DAYS)
        #[arg(long)]
        days: Option<u32>,
    },

    /// List recorded updates, newest first
    List {
        #[arg(long, default_value_t = 7)]
        days: u32,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show the configured sources
    Sources,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    logging::init();
    let cli = Cli::parse();

    match execute(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn execute(cmd: Commands) -> Result<()> {
    let settings = Settings::from_env();
    match cmd {
        Commands::Sources => {
            let registry = SourceRegistry::load_default()?;
            for s in registry.sources() {
                println!("{:<12} {:<10} {}", s.competitor, s.kind, s.link());
            }
        }
        Commands::Run => {
            let tracker = build_tracker(&settings)?;
            let out = tracker.run().await?;
            println!(
                "run completed: {} checked, {} updates, {} unchanged, {} without content, {} failed",
                out.report.checked,
                out.report.detected(),
                out.report.unchanged,
                out.report.no_content,
                out.report.failed
            );
            for ev in &out.report.events {
                println!("  {} {}", ev.source_kind.emoji(), ev.title());
            }
            println!(
                "deliveries: {} ok, {} failed, not configured: {}",
                out.dispatch.delivered(),
                out.dispatch.failed(),
                out.dispatch.not_configured.join(", ")
            );
        }
        Commands::Digest { days } => {
            let tracker = build_tracker(&settings)?;
            let (digest, report) = tracker.digest(days.unwrap_or(settings.digest_days)).await?;
            println!(
                "digest ({}): {} updates from {} competitors; {} delivered, {} failed",
                digest.window_description(),
                digest.total(),
                digest.groups.len(),
                report.delivered(),
                report.failed()
            );
        }
        Commands::List { days, json } => {
            let tracker = build_tracker(&settings)?;
            let rows = tracker.store().window_query(days)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                for r in rows {
                    println!(
                        "{}  {:<10} {:<10} {}  {}",
                        r.observed_at.format("%Y-%m-%d %H:%M"),
                        r.competitor_name,
                        r.source_kind,
                        &r.content_sha256[..12.min(r.content_sha256.len())],
                        r.source_url
                    );
                }
            }
        }
    }
    Ok(())
}
