// src/migration/backfill.rs

use crate::{
    error::AppError,
    migration::{BatchOptions, MigrationReport, Target, run},
    store::QuizStore,
};

/// Synthesizes snapshots for completed attempts that never got one.
///
/// The rebuild reads the bank as it is now, so an attempt whose quiz was
/// edited after submission gets the edited content; the report counts those
/// as `drifted`. Attempts that already have questions are left alone.
pub async fn run_backfill(
    store: &dyn QuizStore,
    options: BatchOptions,
) -> Result<MigrationReport, AppError> {
    run(store, Target::MissingSnapshot, options).await
}
