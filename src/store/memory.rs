// src/store/memory.rs

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    error::AppError,
    models::{
        attempt::{AttemptKey, AttemptRecord},
        question_bank::{BankRevision, QuestionBank},
        snapshot::AttemptSnapshot,
    },
    store::QuizStore,
};

/// Process-local store. Used by the test suites and for local runs without Postgres.
#[derive(Debug, Default)]
pub struct MemoryStore {
    banks: RwLock<BTreeMap<i64, QuestionBank>>,
    attempts: RwLock<BTreeMap<AttemptKey, AttemptRecord>>,
    failing_snapshot_writes: RwLock<BTreeSet<AttemptKey>>,
    last_bank_id: AtomicI64,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of attempt writes performed so far.
    pub fn attempt_writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Stores `record` as-is, completed or not. Seeds legacy data in tests.
    pub async fn put_attempt(&self, record: AttemptRecord) {
        self.attempts.write().await.insert(record.key(), record);
    }

    /// Drops a bank, leaving its attempts behind.
    pub async fn remove_bank(&self, quiz_id: i64) -> Option<QuestionBank> {
        self.banks.write().await.remove(&quiz_id)
    }

    /// Makes every later `write_snapshot` for `key` fail like a storage error.
    pub async fn fail_snapshot_writes(&self, key: AttemptKey) {
        self.failing_snapshot_writes.write().await.insert(key);
    }

    /// Copy of every attempt, ordered by key.
    pub async fn all_attempts(&self) -> Vec<AttemptRecord> {
        self.attempts.read().await.values().cloned().collect()
    }

    fn count_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl QuizStore for MemoryStore {
    async fn get_bank(&self, quiz_id: i64) -> Result<Option<QuestionBank>, AppError> {
        Ok(self.banks.read().await.get(&quiz_id).cloned())
    }

    async fn insert_bank(&self, mut bank: QuestionBank) -> Result<QuestionBank, AppError> {
        bank.id = self.last_bank_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.banks.write().await.insert(bank.id, bank.clone());
        Ok(bank)
    }

    async fn update_bank(
        &self,
        bank: &QuestionBank,
        expected: BankRevision,
    ) -> Result<(), AppError> {
        let mut banks = self.banks.write().await;
        let stored = banks
            .get_mut(&bank.id)
            .ok_or_else(|| AppError::NotFound(format!("Quiz {} not found", bank.id)))?;

        if stored.revision() != expected {
            return Err(AppError::Conflict(format!(
                "Quiz {} was edited concurrently (now at version {})",
                bank.id, stored.version
            )));
        }
        *stored = bank.clone();
        Ok(())
    }

    async fn get_attempt(&self, key: AttemptKey) -> Result<Option<AttemptRecord>, AppError> {
        Ok(self.attempts.read().await.get(&key).cloned())
    }

    async fn insert_attempt(&self, record: &AttemptRecord) -> Result<AttemptRecord, AppError> {
        let mut attempts = self.attempts.write().await;
        let stored = attempts.entry(record.key()).or_insert_with(|| {
            self.count_write();
            record.clone()
        });
        Ok(stored.clone())
    }

    async fn save_open_attempt(&self, record: &AttemptRecord) -> Result<(), AppError> {
        let mut attempts = self.attempts.write().await;
        let stored = attempts
            .get_mut(&record.key())
            .ok_or_else(|| AppError::NotFound(format!("Attempt {} not found", record.key())))?;

        if stored.is_entered {
            return Err(AppError::Conflict("Attempt already submitted".to_string()));
        }
        *stored = record.clone();
        self.count_write();
        Ok(())
    }

    async fn write_snapshot(
        &self,
        key: AttemptKey,
        snapshot: &AttemptSnapshot,
    ) -> Result<(), AppError> {
        if self.failing_snapshot_writes.read().await.contains(&key) {
            return Err(AppError::InternalServerError(format!(
                "write refused for attempt {}",
                key
            )));
        }

        let mut attempts = self.attempts.write().await;
        let stored = attempts
            .get_mut(&key)
            .ok_or_else(|| AppError::NotFound(format!("Attempt {} not found", key)))?;

        stored.install_snapshot(snapshot.clone());
        self.count_write();
        Ok(())
    }

    async fn completed_missing_snapshot(&self) -> Result<Vec<AttemptKey>, AppError> {
        Ok(self
            .attempts
            .read()
            .await
            .values()
            .filter(|r| r.is_entered && !r.has_usable_snapshot())
            .map(AttemptRecord::key)
            .collect())
    }

    async fn completed_with_snapshot(&self) -> Result<Vec<AttemptKey>, AppError> {
        Ok(self
            .attempts
            .read()
            .await
            .values()
            .filter(|r| r.is_entered && r.has_usable_snapshot())
            .map(AttemptRecord::key)
            .collect())
    }
}
