// src/store/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, migrate::Migrator, types::Json};

use crate::{
    error::AppError,
    models::{
        attempt::{Answers, AttemptKey, AttemptRecord},
        question_bank::{BankRevision, Question, QuestionBank},
        snapshot::AttemptSnapshot,
    },
    store::QuizStore,
};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Postgres-backed store over the `quizzes` and `quiz_attempts` tables.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Applies the schema in `migrations/`.
    pub async fn migrate(&self) -> Result<(), AppError> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    /// Fails unless every migration is already applied. Writes nothing.
    pub async fn check_schema(&self) -> Result<(), AppError> {
        let applied: Vec<i64> =
            sqlx::query_scalar("SELECT version FROM _sqlx_migrations WHERE success")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    AppError::InternalServerError(format!(
                        "schema is not initialized ({}); run once without --dry-run",
                        e
                    ))
                })?;

        let pending = pending_migrations(&applied);
        if !pending.is_empty() {
            return Err(AppError::InternalServerError(format!(
                "schema is behind, pending migrations {:?}; run once without --dry-run",
                pending
            )));
        }
        Ok(())
    }
}

/// Helper struct for reading the 'quizzes' table.
#[derive(FromRow)]
struct QuizRow {
    id: i64,
    name: String,
    version: i64,
    version_updated_at: DateTime<Utc>,
    questions: Json<Vec<Question>>,
    questions_to_show_override: Option<i32>,
}

impl From<QuizRow> for QuestionBank {
    fn from(row: QuizRow) -> Self {
        QuestionBank::from_parts(
            row.id,
            row.name,
            row.version,
            row.version_updated_at,
            row.questions.0,
            row.questions_to_show_override
                .and_then(|n| usize::try_from(n).ok()),
        )
    }
}

/// Helper struct for reading the 'quiz_attempts' table.
#[derive(FromRow)]
struct AttemptRow {
    student_id: i64,
    quiz_id: i64,
    quiz_name: String,
    is_entered: bool,
    selection_indices: Option<Json<Vec<usize>>>,
    snapshot: Option<Json<AttemptSnapshot>>,
    quiz_version: Option<i64>,
    answers: Json<Answers>,
    started_at: Option<DateTime<Utc>>,
    submitted_at: Option<DateTime<Utc>>,
}

impl From<AttemptRow> for AttemptRecord {
    fn from(row: AttemptRow) -> Self {
        AttemptRecord {
            student_id: row.student_id,
            quiz_id: row.quiz_id,
            quiz_name: row.quiz_name,
            is_entered: row.is_entered,
            selection_indices: row.selection_indices.map(|j| j.0),
            snapshot: row.snapshot.map(|j| j.0),
            quiz_version: row.quiz_version,
            answers: row.answers.0,
            started_at: row.started_at,
            submitted_at: row.submitted_at,
        }
    }
}

/// Embedded migration versions missing from `applied`.
fn pending_migrations(applied: &[i64]) -> Vec<i64> {
    MIGRATOR
        .iter()
        .map(|migration| migration.version)
        .filter(|version| !applied.contains(version))
        .collect()
}

#[derive(FromRow)]
struct KeyRow {
    student_id: i64,
    quiz_id: i64,
}

impl From<KeyRow> for AttemptKey {
    fn from(row: KeyRow) -> Self {
        AttemptKey {
            student_id: row.student_id,
            quiz_id: row.quiz_id,
        }
    }
}

fn override_column(questions_to_show: Option<usize>) -> Result<Option<i32>, AppError> {
    questions_to_show
        .map(i32::try_from)
        .transpose()
        .map_err(|_| AppError::BadRequest("questions_to_show is too large".to_string()))
}

/// Number of captured questions, 0 when the snapshot has no question array.
const SNAPSHOT_LENGTH: &str = "CASE WHEN jsonb_typeof(snapshot -> 'questions') = 'array' \
     THEN jsonb_array_length(snapshot -> 'questions') ELSE 0 END";

const ATTEMPT_COLUMNS: &str = "student_id, quiz_id, quiz_name, is_entered, selection_indices, \
     snapshot, quiz_version, answers, started_at, submitted_at";

#[async_trait]
impl QuizStore for PgStore {
    async fn get_bank(&self, quiz_id: i64) -> Result<Option<QuestionBank>, AppError> {
        let row = sqlx::query_as::<_, QuizRow>(
            r#"
            SELECT id, name, version, version_updated_at, questions, questions_to_show_override
            FROM quizzes
            WHERE id = $1
            "#,
        )
        .bind(quiz_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(QuestionBank::from))
    }

    async fn insert_bank(&self, mut bank: QuestionBank) -> Result<QuestionBank, AppError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO quizzes (name, version, version_updated_at, questions, questions_to_show_override)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&bank.name)
        .bind(bank.version)
        .bind(bank.version_updated_at)
        .bind(Json(&bank.questions))
        .bind(override_column(bank.questions_to_show_override)?)
        .fetch_one(&self.pool)
        .await?;

        bank.id = id;
        Ok(bank)
    }

    async fn update_bank(
        &self,
        bank: &QuestionBank,
        expected: BankRevision,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE quizzes
            SET name = $2, version = $3, version_updated_at = $4,
                questions = $5, questions_to_show_override = $6
            WHERE id = $1 AND version = $7
              AND questions_to_show_override IS NOT DISTINCT FROM $8
            "#,
        )
        .bind(bank.id)
        .bind(&bank.name)
        .bind(bank.version)
        .bind(bank.version_updated_at)
        .bind(Json(&bank.questions))
        .bind(override_column(bank.questions_to_show_override)?)
        .bind(expected.version)
        .bind(override_column(expected.questions_to_show_override)?)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.get_bank(bank.id).await? {
                Some(current) => Err(AppError::Conflict(format!(
                    "Quiz {} was edited concurrently (now at version {})",
                    bank.id, current.version
                ))),
                None => Err(AppError::NotFound(format!("Quiz {} not found", bank.id))),
            };
        }
        Ok(())
    }

    async fn get_attempt(&self, key: AttemptKey) -> Result<Option<AttemptRecord>, AppError> {
        let sql = format!(
            "SELECT {} FROM quiz_attempts WHERE student_id = $1 AND quiz_id = $2",
            ATTEMPT_COLUMNS
        );
        let row = sqlx::query_as::<_, AttemptRow>(&sql)
            .bind(key.student_id)
            .bind(key.quiz_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(AttemptRecord::from))
    }

    async fn insert_attempt(&self, record: &AttemptRecord) -> Result<AttemptRecord, AppError> {
        sqlx::query(
            r#"
            INSERT INTO quiz_attempts
                (student_id, quiz_id, quiz_name, is_entered, selection_indices,
                 snapshot, quiz_version, answers, started_at, submitted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (student_id, quiz_id) DO NOTHING
            "#,
        )
        .bind(record.student_id)
        .bind(record.quiz_id)
        .bind(&record.quiz_name)
        .bind(record.is_entered)
        .bind(record.selection_indices.as_ref().map(Json))
        .bind(record.snapshot.as_ref().map(Json))
        .bind(record.quiz_version)
        .bind(Json(&record.answers))
        .bind(record.started_at)
        .bind(record.submitted_at)
        .execute(&self.pool)
        .await?;

        self.get_attempt(record.key())
            .await?
            .ok_or_else(|| AppError::InternalServerError("Inserted attempt vanished".to_string()))
    }

    async fn save_open_attempt(&self, record: &AttemptRecord) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE quiz_attempts
            SET quiz_name = $3, is_entered = $4, selection_indices = $5, snapshot = $6,
                quiz_version = $7, answers = $8, started_at = $9, submitted_at = $10
            WHERE student_id = $1 AND quiz_id = $2 AND is_entered = FALSE
            "#,
        )
        .bind(record.student_id)
        .bind(record.quiz_id)
        .bind(&record.quiz_name)
        .bind(record.is_entered)
        .bind(record.selection_indices.as_ref().map(Json))
        .bind(record.snapshot.as_ref().map(Json))
        .bind(record.quiz_version)
        .bind(Json(&record.answers))
        .bind(record.started_at)
        .bind(record.submitted_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.get_attempt(record.key()).await? {
                Some(_) => Err(AppError::Conflict("Attempt already submitted".to_string())),
                None => Err(AppError::NotFound(format!("Attempt {} not found", record.key()))),
            };
        }
        Ok(())
    }

    async fn write_snapshot(
        &self,
        key: AttemptKey,
        snapshot: &AttemptSnapshot,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE quiz_attempts
            SET snapshot = $3, quiz_version = $4
            WHERE student_id = $1 AND quiz_id = $2
            "#,
        )
        .bind(key.student_id)
        .bind(key.quiz_id)
        .bind(Json(snapshot))
        .bind(snapshot.quiz_version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Attempt {} not found", key)));
        }
        Ok(())
    }

    async fn completed_missing_snapshot(&self) -> Result<Vec<AttemptKey>, AppError> {
        let sql = format!(
            r#"
            SELECT student_id, quiz_id
            FROM quiz_attempts
            WHERE is_entered
              AND (snapshot IS NULL OR {} = 0)
            ORDER BY student_id, quiz_id
            "#,
            SNAPSHOT_LENGTH
        );
        let rows = sqlx::query_as::<_, KeyRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(AttemptKey::from).collect())
    }

    async fn completed_with_snapshot(&self) -> Result<Vec<AttemptKey>, AppError> {
        let sql = format!(
            r#"
            SELECT student_id, quiz_id
            FROM quiz_attempts
            WHERE is_entered
              AND {} > 0
            ORDER BY student_id, quiz_id
            "#,
            SNAPSHOT_LENGTH
        );
        let rows = sqlx::query_as::<_, KeyRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(AttemptKey::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_embedded_migration_is_pending_on_empty_schema() {
        let all: Vec<i64> = MIGRATOR.iter().map(|m| m.version).collect();
        assert!(!all.is_empty());
        assert_eq!(pending_migrations(&[]), all);
    }

    #[test]
    fn test_nothing_pending_once_applied() {
        let all: Vec<i64> = MIGRATOR.iter().map(|m| m.version).collect();
        assert!(pending_migrations(&all).is_empty());
    }

    #[test]
    fn test_override_column_rejects_huge_counts() {
        assert_eq!(override_column(Some(3)).unwrap(), Some(3));
        assert_eq!(override_column(None).unwrap(), None);
        assert!(override_column(Some(usize::MAX)).is_err());
    }
}
