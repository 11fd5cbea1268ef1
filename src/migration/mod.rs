// src/migration/mod.rs

//! Offline jobs that retrofit snapshots onto completed attempts.
//!
//! Backfill and repair differ only in which records they pick up; both
//! rebuild through [`reconstruct_snapshot`]. Each record is read, rebuilt and
//! written on its own, so a crash loses at most the record in flight and a
//! re-run picks up the rest.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::{
    error::AppError,
    models::{
        attempt::{AttemptKey, AttemptRecord},
        question_bank::QuestionBank,
    },
    quiz::capture::{SelectionSource, reconstruct_snapshot},
    store::QuizStore,
};

pub mod backfill;
pub mod repair;

/// Flags shared by both batch entry points.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    /// Compute and report, write nothing.
    pub dry_run: bool,
    /// Log every record at `info` instead of `debug`.
    pub verbose: bool,
}

/// Which completed attempts a job picks up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// No snapshot, or one without questions.
    MissingSnapshot,
    /// A snapshot whose questions all lost their text.
    CorruptSnapshot,
}

impl Target {
    fn job_name(self) -> &'static str {
        match self {
            Target::MissingSnapshot => "snapshot backfill",
            Target::CorruptSnapshot => "snapshot repair",
        }
    }

    fn verb(self) -> &'static str {
        match self {
            Target::MissingSnapshot => "migrated",
            Target::CorruptSnapshot => "repaired",
        }
    }

    fn applies(self, record: &AttemptRecord) -> bool {
        match self {
            Target::MissingSnapshot => record.needs_backfill(),
            Target::CorruptSnapshot => record.needs_repair(),
        }
    }
}

/// What happened to one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// A snapshot was rebuilt (and written unless dry-run).
    Rebuilt {
        source: SelectionSource,
        questions: usize,
        /// The bank changed after submission, or submission time is unknown.
        drifted: bool,
    },
    /// The record already has a usable snapshot.
    Skipped,
    /// The referenced bank no longer exists.
    Unresolvable,
    /// Rebuild or save failed; the record is untouched.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedRecord {
    pub key: AttemptKey,
    pub reason: String,
}

/// End-of-run tallies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub target: Target,
    pub dry_run: bool,
    pub scanned: usize,
    pub rebuilt: usize,
    pub skipped: usize,
    pub unresolvable: usize,
    pub failed: usize,
    pub drifted: usize,
    pub unresolved_keys: Vec<AttemptKey>,
    pub failures: Vec<FailedRecord>,
}

impl MigrationReport {
    fn new(target: Target, dry_run: bool) -> Self {
        Self {
            target,
            dry_run,
            scanned: 0,
            rebuilt: 0,
            skipped: 0,
            unresolvable: 0,
            failed: 0,
            drifted: 0,
            unresolved_keys: Vec::new(),
            failures: Vec::new(),
        }
    }

    fn record(&mut self, key: AttemptKey, outcome: RecordOutcome) {
        self.scanned += 1;
        match outcome {
            RecordOutcome::Rebuilt { drifted, .. } => {
                self.rebuilt += 1;
                if drifted {
                    self.drifted += 1;
                }
            }
            RecordOutcome::Skipped => self.skipped += 1,
            RecordOutcome::Unresolvable => {
                self.unresolvable += 1;
                self.unresolved_keys.push(key);
            }
            RecordOutcome::Failed(reason) => {
                self.failed += 1;
                self.failures.push(FailedRecord { key, reason });
            }
        }
    }

    /// Non-zero exit status for the batch binaries.
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

impl fmt::Display for MigrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dry_run {
            write!(f, "[dry-run] ")?;
        }
        writeln!(
            f,
            "{}: scanned {}, {} {}, skipped {}, unresolvable {}, failed {}",
            self.target.job_name(),
            self.scanned,
            self.target.verb(),
            self.rebuilt,
            self.skipped,
            self.unresolvable,
            self.failed
        )?;

        if self.drifted > 0 {
            writeln!(
                f,
                "  warning: {} record(s) were rebuilt from the current quiz content, which changed \
                 after submission (or submission time is unknown); they may not match what the \
                 student originally saw",
                self.drifted
            )?;
        }
        for key in &self.unresolved_keys {
            writeln!(f, "  unresolvable: {} (quiz not found)", key)?;
        }
        for failure in &self.failures {
            writeln!(f, "  failed: {}: {}", failure.key, failure.reason)?;
        }
        Ok(())
    }
}

/// Runs one job over every candidate record.
///
/// Only a failed scan aborts the run. Per-record errors are tallied.
pub async fn run(
    store: &dyn QuizStore,
    target: Target,
    options: BatchOptions,
) -> Result<MigrationReport, AppError> {
    let keys = match target {
        Target::MissingSnapshot => store.completed_missing_snapshot().await?,
        Target::CorruptSnapshot => store.completed_with_snapshot().await?,
    };

    tracing::info!(
        job = target.job_name(),
        candidates = keys.len(),
        dry_run = options.dry_run,
        "Starting run"
    );

    let mut report = MigrationReport::new(target, options.dry_run);

    // Completed attempts outside this job's scan are already valid for it.
    // Counted before the loop so this run's own writes are not included.
    if target == Target::MissingSnapshot {
        let valid = store.completed_with_snapshot().await?.len();
        report.scanned += valid;
        report.skipped += valid;
    }
    let mut banks: HashMap<i64, Option<QuestionBank>> = HashMap::new();

    for key in keys {
        let outcome = process(store, target, key, &mut banks, options).await;
        log_outcome(key, &outcome, options);
        report.record(key, outcome);
    }

    tracing::info!(
        job = target.job_name(),
        rebuilt = report.rebuilt,
        skipped = report.skipped,
        unresolvable = report.unresolvable,
        failed = report.failed,
        "Run finished"
    );
    Ok(report)
}

async fn process(
    store: &dyn QuizStore,
    target: Target,
    key: AttemptKey,
    banks: &mut HashMap<i64, Option<QuestionBank>>,
    options: BatchOptions,
) -> RecordOutcome {
    let record = match store.get_attempt(key).await {
        Ok(Some(record)) => record,
        Ok(None) => return RecordOutcome::Skipped,
        Err(e) => return RecordOutcome::Failed(format!("load failed: {}", e)),
    };

    if !target.applies(&record) {
        return RecordOutcome::Skipped;
    }

    let bank = match banks.get(&key.quiz_id) {
        Some(cached) => cached.clone(),
        None => match store.get_bank(key.quiz_id).await {
            Ok(found) => {
                banks.insert(key.quiz_id, found.clone());
                found
            }
            Err(e) => return RecordOutcome::Failed(format!("quiz load failed: {}", e)),
        },
    };
    let Some(bank) = bank else {
        return RecordOutcome::Unresolvable;
    };

    let reconstruction = reconstruct_snapshot(&bank, record.persisted_selection());
    if let Err(fault) = reconstruction.check() {
        return RecordOutcome::Failed(fault.to_string());
    }

    let drifted = record
        .submitted_at
        .is_none_or(|submitted| bank.version_updated_at > submitted);

    if !options.dry_run {
        if let Err(e) = store.write_snapshot(key, &reconstruction.snapshot).await {
            return RecordOutcome::Failed(format!("save failed: {}", e));
        }
    }

    RecordOutcome::Rebuilt {
        source: reconstruction.source,
        questions: reconstruction.snapshot.questions.len(),
        drifted,
    }
}

fn log_outcome(key: AttemptKey, outcome: &RecordOutcome, options: BatchOptions) {
    match outcome {
        RecordOutcome::Failed(reason) => {
            tracing::error!(
                student_id = key.student_id,
                quiz_id = key.quiz_id,
                "Record failed: {}",
                reason
            );
        }
        other if options.verbose => {
            tracing::info!(
                student_id = key.student_id,
                quiz_id = key.quiz_id,
                dry_run = options.dry_run,
                "{:?}",
                other
            );
        }
        other => {
            tracing::debug!(
                student_id = key.student_id,
                quiz_id = key.quiz_id,
                "{:?}",
                other
            );
        }
    }
}
