// src/cli.rs

use std::process::ExitCode;
use std::time::Duration;

use clap::Args;
use sqlx::postgres::PgPoolOptions;

use crate::{
    error::AppError,
    migration::{BatchOptions, MigrationReport},
    store::PgStore,
};

/// Flags shared by the snapshot batch binaries.
#[derive(Debug, Clone, Args)]
pub struct BatchArgs {
    #[arg(long, help = "Compute and report without writing anything")]
    pub dry_run: bool,

    #[arg(long, help = "Log progress for every record")]
    pub verbose: bool,

    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: String,

    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub rust_log: String,

    #[arg(long, env = "LOG_DIR", default_value = "logs")]
    pub log_dir: String,
}

impl BatchArgs {
    pub fn options(&self) -> BatchOptions {
        BatchOptions {
            dry_run: self.dry_run,
            verbose: self.verbose,
        }
    }

    /// A dry run only checks the schema; it never migrates.
    pub fn schema(&self) -> Schema {
        if self.dry_run {
            Schema::Check
        } else {
            Schema::Migrate
        }
    }
}

/// What [`connect`] does with the database schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    /// Apply pending migrations.
    Migrate,
    /// Refuse to run against a schema with pending migrations.
    Check,
}

/// Connects to Postgres, retrying while the database comes up, then
/// migrates or checks the schema.
pub async fn connect(database_url: &str, schema: Schema) -> Result<PgStore, AppError> {
    let mut retry_count = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(database_url)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    return Err(AppError::InternalServerError(format!(
                        "Failed to connect to database after 5 retries: {}",
                        e
                    )));
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    };
    tracing::info!("Database connected...");

    let store = PgStore::new(pool);
    match schema {
        Schema::Migrate => {
            store.migrate().await?;
            tracing::info!("Migrations applied successfully.");
        }
        Schema::Check => {
            store.check_schema().await?;
            tracing::info!("Schema is up to date, migrations left alone.");
        }
    }
    Ok(store)
}

/// Prints the summary and maps the run to a process exit code.
pub fn finish(result: Result<MigrationReport, AppError>) -> ExitCode {
    match result {
        Ok(report) => {
            print!("{}", report);
            if report.has_failures() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            tracing::error!("Run aborted: {}", e);
            eprintln!("run aborted: {}", e);
            ExitCode::FAILURE
        }
    }
}
