// src/bin/backfill_snapshots.rs

use std::process::ExitCode;

use clap::Parser;
use dotenvy::dotenv;
use quiz_backend::{cli, migration::backfill::run_backfill, utils::telemetry::init_tracing};

/// Synthesizes snapshots for completed quiz attempts that have none.
#[derive(Debug, Parser)]
#[command(name = "backfill-snapshots", about = "Backfill missing attempt snapshots")]
struct Args {
    #[command(flatten)]
    batch: cli::BatchArgs,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env before clap reads env fallbacks
    dotenv().ok();
    let args = Args::parse();
    let _guard = init_tracing(&args.batch.rust_log, &args.batch.log_dir, "backfill.log");

    let result = match cli::connect(&args.batch.database_url, args.batch.schema()).await {
        Ok(store) => run_backfill(&store, args.batch.options()).await,
        Err(e) => Err(e),
    };

    cli::finish(result)
}
