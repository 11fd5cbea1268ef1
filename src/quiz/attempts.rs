// src/quiz/attempts.rs

use chrono::Utc;
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    error::AppError,
    models::{
        attempt::{Answers, AttemptKey, AttemptRecord, AttemptView, DisplayQuestion, ReviewItem, ScoreSummary},
        question_bank::ANSWER_SLOTS,
    },
    quiz::{
        capture::{capture, reconstruct_snapshot},
        scoring,
        selection::{self, SelectionStrategy},
    },
    store::QuizStore,
};

/// Starts an attempt, or returns the open one for `key`.
///
/// Selection and capture happen once, here. A resumed attempt keeps the
/// positions it was given the first time. `seed` drives random selection.
pub async fn start_attempt(
    store: &dyn QuizStore,
    key: AttemptKey,
    strategy: SelectionStrategy,
    seed: u64,
) -> Result<AttemptRecord, AppError> {
    if let Some(existing) = store.get_attempt(key).await? {
        if existing.is_entered {
            return Err(AppError::Conflict("Attempt already submitted".to_string()));
        }
        return ensure_captured(store, existing).await;
    }

    let bank = store
        .get_bank(key.quiz_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Quiz {} not found", key.quiz_id)))?;

    if bank.is_empty() {
        return Err(AppError::BadRequest("Quiz has no questions".to_string()));
    }

    let indices = selection::select_for(&bank, strategy, &mut StdRng::seed_from_u64(seed));
    let snapshot = capture(&bank, &indices);

    let mut record = AttemptRecord::start(key, bank.name.clone(), indices);
    record.install_snapshot(snapshot);

    tracing::info!(
        student_id = key.student_id,
        quiz_id = key.quiz_id,
        quiz_version = bank.version,
        "Attempt started"
    );

    // A concurrent start for the same key may have won; the stored one is authoritative.
    let stored = store.insert_attempt(&record).await?;
    ensure_captured(store, stored).await
}

/// Captures the snapshot of an open attempt that has none yet.
///
/// Reuses the persisted selection. A missing bank is logged and tolerated so
/// the student can still submit.
async fn ensure_captured(
    store: &dyn QuizStore,
    mut record: AttemptRecord,
) -> Result<AttemptRecord, AppError> {
    if record.has_usable_snapshot() || record.is_entered {
        return Ok(record);
    }

    let Some(bank) = store.get_bank(record.quiz_id).await? else {
        tracing::warn!(
            student_id = record.student_id,
            quiz_id = record.quiz_id,
            "Quiz not found, attempt left without snapshot"
        );
        return Ok(record);
    };

    let reconstruction = reconstruct_snapshot(&bank, record.persisted_selection());
    if reconstruction.snapshot.is_empty() {
        tracing::warn!(
            student_id = record.student_id,
            quiz_id = record.quiz_id,
            "No selected question could be captured"
        );
        return Ok(record);
    }

    record.install_snapshot(reconstruction.snapshot);
    match store.save_open_attempt(&record).await {
        Ok(()) => Ok(record),
        Err(AppError::Conflict(_)) => store
            .get_attempt(record.key())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Attempt {} not found", record.key()))),
        Err(e) => Err(e),
    }
}

/// Current state of the attempt as the student sees it.
pub async fn view_attempt(store: &dyn QuizStore, key: AttemptKey) -> Result<AttemptView, AppError> {
    let record = store
        .get_attempt(key)
        .await?
        .ok_or_else(|| AppError::NotFound("No attempt for this quiz".to_string()))?;

    let record = ensure_captured(store, record).await?;
    Ok(to_view(&record))
}

/// Builds the display model. Correct answers stay hidden.
pub fn to_view(record: &AttemptRecord) -> AttemptView {
    let questions = record
        .snapshot
        .as_ref()
        .map(|s| {
            s.questions
                .iter()
                .enumerate()
                .map(|(i, q)| DisplayQuestion::new(i + 1, q))
                .collect()
        })
        .unwrap_or_default();

    AttemptView {
        quiz_id: record.quiz_id,
        quiz_name: record.quiz_name.clone(),
        quiz_version: record.quiz_version,
        is_entered: record.is_entered,
        questions,
        answers: record.answers.clone(),
        score: record.is_entered.then(|| scoring::score(record)),
    }
}

/// Records the student's answers and closes the attempt.
///
/// If the snapshot was never captured, capture is retried first; if that
/// still fails the submission goes through and the missing questions count
/// as unattempted.
pub async fn submit_attempt(
    store: &dyn QuizStore,
    key: AttemptKey,
    answers: Answers,
) -> Result<(AttemptRecord, ScoreSummary), AppError> {
    let record = store
        .get_attempt(key)
        .await?
        .ok_or_else(|| AppError::NotFound("Start the quiz before submitting".to_string()))?;

    if record.is_entered {
        return Err(AppError::Conflict("Attempt already submitted".to_string()));
    }

    let mut record = ensure_captured(store, record).await?;

    match record.snapshot.as_ref().filter(|s| !s.is_empty()) {
        Some(snapshot) => scoring::validate_answers(snapshot, &answers)?,
        None => {
            if let Some((position, option)) = answers
                .iter()
                .find(|&(_, &option)| option == 0 || option > ANSWER_SLOTS)
            {
                return Err(AppError::BadRequest(format!(
                    "Option {} at position {} must be between 1 and {}",
                    option, position, ANSWER_SLOTS
                )));
            }
        }
    }

    record.answers = answers;
    record.is_entered = true;
    record.submitted_at = Some(Utc::now());
    store.save_open_attempt(&record).await?;

    let summary = scoring::score(&record);
    tracing::info!(
        student_id = key.student_id,
        quiz_id = key.quiz_id,
        correct = summary.correct,
        incorrect = summary.incorrect,
        unattempted = summary.unattempted,
        "Attempt submitted"
    );

    Ok((record, summary))
}

/// Review data for one display position of a submitted attempt.
pub async fn review_attempt(
    store: &dyn QuizStore,
    key: AttemptKey,
    position: usize,
) -> Result<ReviewItem, AppError> {
    let record = store
        .get_attempt(key)
        .await?
        .ok_or_else(|| AppError::NotFound("No attempt for this quiz".to_string()))?;

    if !record.is_entered {
        return Err(AppError::Conflict("Attempt has not been submitted yet".to_string()));
    }

    scoring::review(&record, position)
}
