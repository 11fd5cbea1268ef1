// src/bin/repair_snapshots.rs

use std::process::ExitCode;

use clap::Parser;
use dotenvy::dotenv;
use quiz_backend::{cli, migration::repair::run_repair, utils::telemetry::init_tracing};

/// Rebuilds attempt snapshots that were captured without their text.
#[derive(Debug, Parser)]
#[command(name = "repair-snapshots", about = "Repair blank attempt snapshots")]
struct Args {
    #[command(flatten)]
    batch: cli::BatchArgs,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    let args = Args::parse();
    let _guard = init_tracing(&args.batch.rust_log, &args.batch.log_dir, "repair.log");

    let result = match cli::connect(&args.batch.database_url, args.batch.schema()).await {
        Ok(store) => run_repair(&store, args.batch.options()).await,
        Err(e) => Err(e),
    };

    cli::finish(result)
}
