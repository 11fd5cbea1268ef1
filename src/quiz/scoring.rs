// src/quiz/scoring.rs

use crate::{
    error::AppError,
    models::{
        attempt::{Answers, AttemptRecord, ReviewItem, ScoreSummary},
        question_bank::ANSWER_SLOTS,
        snapshot::AttemptSnapshot,
    },
};

/// Grades `answers` against the frozen snapshot. Never touches the live bank.
///
/// Questions without a resolvable correct answer and selected positions that
/// were never captured both count as unattempted.
pub fn score_snapshot(snapshot: &AttemptSnapshot, answers: &Answers) -> ScoreSummary {
    let mut summary = ScoreSummary::default();

    for (i, question) in snapshot.questions.iter().enumerate() {
        let position = i + 1;

        let Some(correct) = question.resolved_correct_answer() else {
            tracing::warn!(
                position,
                stable_id = %question.stable_id,
                correct_answer = ?question.correct_answer,
                "Captured question has no usable correct answer, not graded"
            );
            summary.ineligible_positions.push(position);
            summary.unattempted += 1;
            continue;
        };

        match answers.get(&(position as u32)) {
            None => summary.unattempted += 1,
            Some(&chosen) if chosen == correct => summary.correct += 1,
            Some(_) => summary.incorrect += 1,
        }
    }

    summary.unattempted += snapshot.missing_positions.len();
    summary
}

/// Grades a persisted attempt.
///
/// Without a snapshot nothing can be graded, so every selected position is
/// unattempted until backfill supplies one.
pub fn score(record: &AttemptRecord) -> ScoreSummary {
    match &record.snapshot {
        Some(snapshot) => score_snapshot(snapshot, &record.answers),
        None => ScoreSummary {
            unattempted: record.persisted_selection().map_or(0, <[usize]>::len),
            ..Default::default()
        },
    }
}

/// Review data for display position `position` (1-based).
pub fn review(record: &AttemptRecord, position: usize) -> Result<ReviewItem, AppError> {
    let snapshot = record
        .snapshot
        .as_ref()
        .ok_or_else(|| AppError::NotFound("Attempt has no captured questions".to_string()))?;

    let question = snapshot.question_at(position).ok_or_else(|| {
        AppError::NotFound(format!(
            "Position {} is out of range (1..={})",
            position,
            snapshot.questions.len()
        ))
    })?;

    Ok(ReviewItem {
        position,
        question: question.clone(),
        selected: record.answers.get(&(position as u32)).copied(),
        correct_answer: question.correct_answer,
        summary: score_snapshot(snapshot, &record.answers),
    })
}

/// Rejects answers that do not fit the attempt's snapshot.
pub fn validate_answers(snapshot: &AttemptSnapshot, answers: &Answers) -> Result<(), AppError> {
    let displayed = snapshot.questions.len() as u32;

    for (&position, &option) in answers {
        if position == 0 || position > displayed {
            return Err(AppError::BadRequest(format!(
                "Answer for position {} but the attempt shows {} questions",
                position, displayed
            )));
        }
        if option == 0 || option > ANSWER_SLOTS {
            return Err(AppError::BadRequest(format!(
                "Option {} at position {} must be between 1 and {}",
                option, position, ANSWER_SLOTS
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{attempt::AttemptKey, snapshot::CapturedQuestion};

    fn snapshot(correct: &[Option<u8>]) -> AttemptSnapshot {
        let questions = correct
            .iter()
            .enumerate()
            .map(|(i, c)| CapturedQuestion {
                stable_id: format!("q_{}", i),
                title: format!("Q{}", i),
                answer1: "a".into(),
                answer2: "b".into(),
                answer3: "c".into(),
                answer4: "d".into(),
                correct_answer: *c,
                original_index: i,
                ..Default::default()
            })
            .collect();
        AttemptSnapshot {
            questions,
            quiz_version: 1,
            missing_positions: Vec::new(),
        }
    }

    fn answers(pairs: &[(u32, u8)]) -> Answers {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_score_mixed() {
        let snap = snapshot(&[Some(2), Some(1), Some(4)]);
        let summary = score_snapshot(&snap, &answers(&[(1, 2), (2, 2), (3, 4)]));

        assert_eq!(summary.correct, 2);
        assert_eq!(summary.incorrect, 1);
        assert_eq!(summary.unattempted, 0);
        assert_eq!(summary.total(), 3);
    }

    #[test]
    fn test_unanswered_is_unattempted() {
        let snap = snapshot(&[Some(1), Some(1)]);
        let summary = score_snapshot(&snap, &answers(&[(2, 1)]));
        assert_eq!(summary.correct, 1);
        assert_eq!(summary.unattempted, 1);
    }

    #[test]
    fn test_undefined_correct_answer_is_ineligible() {
        let snap = snapshot(&[None, Some(7), Some(3)]);
        let summary = score_snapshot(&snap, &answers(&[(1, 1), (2, 1), (3, 3)]));

        assert_eq!(summary.correct, 1);
        assert_eq!(summary.incorrect, 0);
        assert_eq!(summary.unattempted, 2);
        assert_eq!(summary.ineligible_positions, vec![1, 2]);
    }

    #[test]
    fn test_missing_positions_count_as_unattempted() {
        let mut snap = snapshot(&[Some(1)]);
        snap.missing_positions = vec![8, 9];
        let summary = score_snapshot(&snap, &answers(&[(1, 1)]));
        assert_eq!(summary.correct, 1);
        assert_eq!(summary.unattempted, 2);
        assert_eq!(summary.total(), 3);
    }

    #[test]
    fn test_review_reads_snapshot_only() {
        let key = AttemptKey {
            student_id: 1,
            quiz_id: 2,
        };
        let mut record = AttemptRecord::start(key, "Quiz".into(), vec![0, 1]);
        record.install_snapshot(snapshot(&[Some(2), Some(1)]));
        record.answers = answers(&[(1, 3)]);
        record.is_entered = true;

        let item = review(&record, 1).unwrap();
        assert_eq!(item.selected, Some(3));
        assert_eq!(item.correct_answer, Some(2));
        assert_eq!(item.question.title, "Q0");
        assert_eq!(item.summary.incorrect, 1);
        assert_eq!(item.summary.unattempted, 1);

        assert!(matches!(review(&record, 0), Err(AppError::NotFound(_))));
        assert!(matches!(review(&record, 3), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_score_without_snapshot() {
        let key = AttemptKey {
            student_id: 1,
            quiz_id: 2,
        };
        let record = AttemptRecord::start(key, "Quiz".into(), vec![3, 1, 0]);
        assert_eq!(score(&record).unattempted, 3);
    }

    #[test]
    fn test_validate_answers_bounds() {
        let snap = snapshot(&[Some(1), Some(2)]);
        assert!(validate_answers(&snap, &answers(&[(1, 4), (2, 1)])).is_ok());
        assert!(validate_answers(&snap, &answers(&[(0, 1)])).is_err());
        assert!(validate_answers(&snap, &answers(&[(3, 1)])).is_err());
        assert!(validate_answers(&snap, &answers(&[(1, 5)])).is_err());
        assert!(validate_answers(&snap, &answers(&[(1, 0)])).is_err());
    }
}
