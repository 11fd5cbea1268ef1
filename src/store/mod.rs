// src/store/mod.rs

use async_trait::async_trait;

use crate::{
    error::AppError,
    models::{
        attempt::{AttemptKey, AttemptRecord},
        question_bank::{BankRevision, QuestionBank},
        snapshot::AttemptSnapshot,
    },
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Persistence for quiz banks and attempt records.
///
/// Every write touches a single bank or a single attempt; there is no
/// multi-record transaction anywhere in the subsystem.
#[async_trait]
pub trait QuizStore: Send + Sync {
    async fn get_bank(&self, quiz_id: i64) -> Result<Option<QuestionBank>, AppError>;

    /// Stores a new bank and returns it with its assigned id.
    async fn insert_bank(&self, bank: QuestionBank) -> Result<QuestionBank, AppError>;

    /// Persists `bank` only if the stored revision is still `expected`.
    /// A concurrent edit, content or display count, yields `AppError::Conflict`.
    async fn update_bank(&self, bank: &QuestionBank, expected: BankRevision)
    -> Result<(), AppError>;

    async fn get_attempt(&self, key: AttemptKey) -> Result<Option<AttemptRecord>, AppError>;

    /// Inserts `record` unless one already exists for its key; returns the stored one.
    async fn insert_attempt(&self, record: &AttemptRecord) -> Result<AttemptRecord, AppError>;

    /// Overwrites an attempt that is still open. A completed attempt yields
    /// `AppError::Conflict` and is left untouched.
    async fn save_open_attempt(&self, record: &AttemptRecord) -> Result<(), AppError>;

    /// Replaces only the snapshot and its version stamp.
    async fn write_snapshot(
        &self,
        key: AttemptKey,
        snapshot: &AttemptSnapshot,
    ) -> Result<(), AppError>;

    /// Completed attempts whose snapshot is absent or has no questions.
    async fn completed_missing_snapshot(&self) -> Result<Vec<AttemptKey>, AppError>;

    /// Completed attempts carrying a snapshot with at least one question.
    async fn completed_with_snapshot(&self) -> Result<Vec<AttemptKey>, AppError>;
}
