//! CLI entry point for the libsafe exporter.

use std::io::{self, IsTerminal};

use anyhow::{Context, Result};
use clap::Parser;
use libsafe_export::{
    CandidateFilter, DatabaseCandidateSource, ExportConfig, OutputStore, RepositoryClient,
    ResumableBatchExporter,
};
use tracing::{debug, info};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(args.default_log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    match dotenvy::dotenv() {
        Ok(path) => debug!(path = %path.display(), "loaded .env"),
        Err(error) => debug!(error = %error, "no .env file loaded"),
    }

    let config = ExportConfig::from_env().context("invalid configuration")?;
    let database_url = config
        .require_database_url()
        .context("invalid configuration")?;

    info!(
        api = %config.api_url,
        export_dir = %config.export_dir.display(),
        authenticated = config.credentials.is_some(),
        "libsafe export starting"
    );

    let store = OutputStore::open(&config.export_dir).with_context(|| {
        format!(
            "cannot open export directory {}",
            config.export_dir.display()
        )
    })?;
    let client = RepositoryClient::from_config(&config).context("cannot build repository client")?;
    let candidates = DatabaseCandidateSource::connect(database_url)
        .await
        .context("cannot connect to metadata database")?;

    let filter = CandidateFilter::new(config.communities()).with_range(args.start, args.end);

    let show_progress = !args.quiet && io::stderr().is_terminal();
    let mut exporter = ResumableBatchExporter::new(client, store)
        .with_limit(args.number)
        .with_progress(show_progress);

    let summary = exporter
        .run_from(&candidates, &filter)
        .await
        .context("export run aborted")?;

    if !args.quiet {
        println!(
            "Exported {} of {} candidates ({} skipped, {} failed) in {:.1}s",
            summary.exported,
            summary.candidates,
            summary.skipped(),
            summary.failed,
            summary.elapsed.as_secs_f64()
        );
        println!("Ledger: {}", summary.ledger_path.display());
        if summary.limit_reached {
            println!(
                "Stopped at the --number limit of {}",
                summary.limit.unwrap_or_default()
            );
        }
    }

    Ok(())
}
