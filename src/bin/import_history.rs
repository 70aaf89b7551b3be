//! One-shot historical import.
//!
//! Reads a JSON-lines export of dated price observations for one store,
//! rebuilds its interval history and commits it through the same
//! coordinator as live runs. Uses the same environment configuration as
//! the server for the database connection.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;

use price_ledger::commit::CommitCoordinator;
use price_ledger::config::AppConfig;
use price_ledger::importer::{HistoricalImporter, OpenEnd, read_observations};
use price_ledger::persistence;
use price_ledger::telemetry;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Rebuild a store's price intervals from recorded observations",
    long_about = "Rebuild a store's price intervals from recorded observations.\n\n\
                  The target store must have no intervals yet; the import is refused \
                  otherwise, since its intervals would overlap the existing history."
)]
struct Args {
    /// Store the observations belong to
    #[arg(long)]
    store: String,

    /// JSON-lines file of {"sku","kind","price","observed_at"} records
    #[arg(long)]
    input: PathBuf,

    /// End of each product's final interval: `last-observed`, `now` or an
    /// RFC 3339 timestamp
    #[arg(long, default_value_t = OpenEnd::LastObserved)]
    open_end: OpenEnd,

    /// Parse and stage only, write nothing
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = AppConfig::from_env()?;
    telemetry::init(config.log_format);

    let file = File::open(&args.input)
        .with_context(|| format!("opening {}", args.input.display()))?;
    let set = read_observations(BufReader::new(file))?;
    tracing::info!(
        store = %args.store,
        observations = set.observations.len(),
        skipped = set.skipped,
        open_end = %args.open_end,
        "observations loaded"
    );

    let importer = HistoricalImporter::new(args.store.as_str(), args.open_end);
    let batch = importer.stage(set.observations, Utc::now());
    tracing::info!(
        intervals = batch.new_intervals.len(),
        products = batch.metadata_seeds.len(),
        "history staged"
    );
    if args.dry_run {
        return Ok(());
    }

    let store = persistence::open(&config).await.context("opening price store")?;
    importer.ensure_empty_target(store.as_ref()).await?;
    let coordinator = CommitCoordinator::new(store, config.commit_parallelism);
    let result = coordinator.commit(batch).await;

    tracing::info!(
        store = %result.store,
        created = result.intervals_created,
        seeded = result.metadata_seeded,
        failed = result.failed_operations,
        "history imported"
    );
    if result.is_partial() {
        anyhow::bail!(
            "{} write(s) failed: {}",
            result.failed_operations,
            result.errors.join("; ")
        );
    }
    Ok(())
}
