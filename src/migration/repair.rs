// src/migration/repair.rs

use crate::{
    error::AppError,
    migration::{BatchOptions, MigrationReport, Target, run},
    store::QuizStore,
};

/// Rebuilds snapshots that were captured with blank text.
///
/// A rebuild that would still be blank (the bank question itself has no
/// text) is reported as a failure and nothing is written.
pub async fn run_repair(
    store: &dyn QuizStore,
    options: BatchOptions,
) -> Result<MigrationReport, AppError> {
    run(store, Target::CorruptSnapshot, options).await
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::{
        models::{
            attempt::{AttemptKey, AttemptRecord},
            question_bank::{Question, QuestionBank},
            snapshot::{AttemptSnapshot, CapturedQuestion},
        },
        store::MemoryStore,
    };

    fn question(title: &str) -> Question {
        Question {
            title: title.into(),
            answer1: "true".into(),
            answer2: "false".into(),
            correct_answer: Some(2),
            ..Default::default()
        }
    }

    fn blank_snapshot(positions: &[usize]) -> AttemptSnapshot {
        AttemptSnapshot {
            questions: positions
                .iter()
                .map(|&i| CapturedQuestion {
                    stable_id: format!("q_{}", i),
                    original_index: i,
                    correct_answer: Some(2),
                    ..Default::default()
                })
                .collect(),
            quiz_version: 1,
            missing_positions: Vec::new(),
        }
    }

    fn corrupt_record(student_id: i64, quiz_id: i64, selection: Option<Vec<usize>>) -> AttemptRecord {
        let key = AttemptKey {
            student_id,
            quiz_id,
        };
        let mut record = AttemptRecord::start(key, "Logic".into(), Vec::new());
        record.selection_indices = selection;
        record.is_entered = true;
        record.submitted_at = Some(Utc::now());
        record.install_snapshot(blank_snapshot(&[0, 1]));
        record
    }

    #[tokio::test]
    async fn test_repair_rebuilds_from_selection() {
        let store = MemoryStore::new();
        let mut bank = QuestionBank::new(0, "Logic".into(), vec![question("A"), question("B"), question("C")]);
        bank.add_question(question("D")).unwrap();
        let quiz = store.insert_bank(bank).await.unwrap();
        store.put_attempt(corrupt_record(1, quiz.id, Some(vec![2, 0]))).await;

        let report = run_repair(&store, BatchOptions::default()).await.unwrap();
        assert_eq!(report.rebuilt, 1);

        let record = store.all_attempts().await.remove(0);
        let snap = record.snapshot.unwrap();
        assert!(!snap.is_corrupt());
        let titles: Vec<&str> = snap.questions.iter().map(|q| q.title.as_str()).collect();
        assert_eq!(titles, vec!["C", "A"]);
        assert_eq!(record.quiz_version, Some(2));
    }

    #[tokio::test]
    async fn test_repair_without_selection_uses_prefix() {
        let store = MemoryStore::new();
        let mut bank = QuestionBank::new(0, "Logic".into(), vec![question("A"), question("B"), question("C")]);
        bank.set_questions_to_show(Some(2)).unwrap();
        let quiz = store.insert_bank(bank).await.unwrap();
        store.put_attempt(corrupt_record(1, quiz.id, None)).await;

        run_repair(&store, BatchOptions::default()).await.unwrap();

        let snap = store.all_attempts().await.remove(0).snapshot.unwrap();
        let titles: Vec<&str> = snap.questions.iter().map(|q| q.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_blank_bank_is_a_hard_failure() {
        let store = MemoryStore::new();
        let bank = QuestionBank::new(0, "Logic".into(), vec![Question::default(), Question::default()]);
        let quiz = store.insert_bank(bank).await.unwrap();
        let record = corrupt_record(1, quiz.id, None);
        store.put_attempt(record.clone()).await;

        let report = run_repair(&store, BatchOptions::default()).await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.rebuilt, 0);
        assert!(report.has_failures());
        assert_eq!(store.all_attempts().await[0], record);
    }

    #[tokio::test]
    async fn test_healthy_snapshots_are_skipped() {
        let store = MemoryStore::new();
        let quiz = store
            .insert_bank(QuestionBank::new(0, "Logic".into(), vec![question("A")]))
            .await
            .unwrap();

        let mut healthy = corrupt_record(1, quiz.id, Some(vec![0]));
        healthy.install_snapshot(AttemptSnapshot {
            questions: vec![CapturedQuestion::from_question(&question("A"), 0)],
            quiz_version: 1,
            missing_positions: Vec::new(),
        });
        store.put_attempt(healthy.clone()).await;

        let report = run_repair(&store, BatchOptions::default()).await.unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.rebuilt, 0);
        assert_eq!(store.attempt_writes(), 0);
    }

    #[tokio::test]
    async fn test_dry_run_reports_without_writing() {
        let store = MemoryStore::new();
        let quiz = store
            .insert_bank(QuestionBank::new(0, "Logic".into(), vec![question("A"), question("B")]))
            .await
            .unwrap();
        store.put_attempt(corrupt_record(1, quiz.id, None)).await;
        store.put_attempt(corrupt_record(2, 999, None)).await;
        let before = store.all_attempts().await;

        let dry = run_repair(
            &store,
            BatchOptions {
                dry_run: true,
                verbose: true,
            },
        )
        .await
        .unwrap();

        assert_eq!(store.all_attempts().await, before);
        assert_eq!(store.attempt_writes(), 0);
        assert!(dry.to_string().starts_with("[dry-run]"));

        let live = run_repair(&store, BatchOptions::default()).await.unwrap();
        assert_eq!(
            (dry.scanned, dry.rebuilt, dry.skipped, dry.unresolvable, dry.failed),
            (live.scanned, live.rebuilt, live.skipped, live.unresolvable, live.failed)
        );
        assert_eq!(live.rebuilt, 1);
        assert_eq!(live.unresolvable, 1);
    }
}
