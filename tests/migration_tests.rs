// tests/migration_tests.rs

use chrono::{Duration, Utc};
use quiz_backend::{
    migration::{BatchOptions, backfill::run_backfill, repair::run_repair},
    models::{
        attempt::{Answers, AttemptKey, AttemptRecord},
        question_bank::{Question, QuestionBank},
        snapshot::AttemptSnapshot,
    },
    quiz::{attempts, scoring, selection::SelectionStrategy},
    store::{MemoryStore, QuizStore},
};
use serde_json::json;

fn question(title: &str, correct: u8) -> Question {
    Question {
        title: title.to_string(),
        answer1: format!("{} 1", title),
        answer2: format!("{} 2", title),
        answer3: Some(format!("{} 3", title)),
        answer4: Some(format!("{} 4", title)),
        correct_answer: Some(correct),
        ..Default::default()
    }
}

async fn seeded_bank(store: &MemoryStore) -> QuestionBank {
    let bank = QuestionBank::new(
        0,
        "Constellations".into(),
        vec![
            question("Orion", 2),
            question("Lyra", 1),
            question("Cygnus", 4),
            question("Draco", 3),
            question("Aquila", 1),
        ],
    );
    store.insert_bank(bank).await.unwrap()
}

fn key(student_id: i64, quiz_id: i64) -> AttemptKey {
    AttemptKey {
        student_id,
        quiz_id,
    }
}

/// A completed attempt from before snapshots existed.
fn legacy(key: AttemptKey, selection: Option<Vec<usize>>, answers: &[(u32, u8)]) -> AttemptRecord {
    let mut record = AttemptRecord::start(key, "Constellations".into(), Vec::new());
    record.selection_indices = selection;
    record.is_entered = true;
    record.answers = answers.iter().copied().collect::<Answers>();
    record.submitted_at = Some(Utc::now() + Duration::hours(1));
    record
}

/// The shape left behind by the old capture path: wrapper objects instead of text.
fn wrapper_snapshot(len: usize) -> AttemptSnapshot {
    let questions: Vec<_> = (0..len)
        .map(|i| {
            json!({
                "stable_id": {"$oid": format!("65f0{}", i)},
                "title": {"_doc": {"title": "hidden"}},
                "answer1": {"_doc": {}},
                "answer2": null,
                "answer3": {},
                "answer4": {},
                "correct_answer": {"$numberInt": "2"},
                "original_index": i
            })
        })
        .collect();

    // The version stamp lived on the record only
    serde_json::from_value(json!({"questions": questions})).unwrap()
}

#[tokio::test]
async fn live_attempt_is_pinned_across_edits() {
    let store = MemoryStore::new();
    let bank = seeded_bank(&store).await;
    let k = key(10, bank.id);

    let started = attempts::start_attempt(&store, k, SelectionStrategy::Sequential, 0)
        .await
        .unwrap();
    let shown = started.snapshot.clone().unwrap();

    // Editor reorders, rewrites and regrades after the student saw the quiz
    let mut edited = store.get_bank(bank.id).await.unwrap().unwrap();
    edited.remove_question(0).unwrap();
    edited.replace_question(0, question("Pegasus", 4)).unwrap();
    store.update_bank(&edited, bank.revision()).await.unwrap();

    let view = attempts::view_attempt(&store, k).await.unwrap();
    let titles: Vec<_> = view.questions.iter().map(|q| q.title.as_str()).collect();
    assert_eq!(titles, vec!["Orion", "Lyra", "Cygnus", "Draco", "Aquila"]);

    let answers: Answers = [(1, 2), (2, 1), (3, 4)].into_iter().collect();
    let (record, summary) = attempts::submit_attempt(&store, k, answers).await.unwrap();
    assert_eq!(record.snapshot.as_ref(), Some(&shown));
    assert_eq!(record.quiz_version, Some(1));
    assert_eq!(summary.correct, 3);
    assert_eq!(summary.unattempted, 2);

    // Neither job touches a healthy attempt
    let backfill = run_backfill(&store, BatchOptions::default()).await.unwrap();
    let repair = run_repair(&store, BatchOptions::default()).await.unwrap();
    assert_eq!(backfill.rebuilt, 0);
    assert_eq!(repair.rebuilt, 0);
    assert_eq!(store.get_attempt(k).await.unwrap().unwrap(), record);
}

#[tokio::test]
async fn backfill_scores_legacy_attempt_from_selection() {
    let store = MemoryStore::new();
    let bank = seeded_bank(&store).await;
    let k = key(11, bank.id);
    store
        .put_attempt(legacy(k, Some(vec![4, 1]), &[(1, 1), (2, 3)]))
        .await;

    let report = run_backfill(&store, BatchOptions::default()).await.unwrap();
    assert_eq!(report.scanned, 1);
    assert_eq!(report.rebuilt, 1);
    assert!(!report.has_failures());

    let record = store.get_attempt(k).await.unwrap().unwrap();
    let titles: Vec<_> = record
        .snapshot
        .as_ref()
        .unwrap()
        .questions
        .iter()
        .map(|q| q.title.as_str())
        .collect();
    assert_eq!(titles, vec!["Aquila", "Lyra"]);
    assert_eq!(record.quiz_version, Some(bank.version));

    // Aquila -> 1 is right, Lyra -> 3 is wrong
    let summary = scoring::score(&record);
    assert_eq!((summary.correct, summary.incorrect, summary.unattempted), (1, 1, 0));
}

#[tokio::test]
async fn backfill_is_idempotent() {
    let store = MemoryStore::new();
    let bank = seeded_bank(&store).await;
    store.put_attempt(legacy(key(1, bank.id), None, &[])).await;
    store
        .put_attempt(legacy(key(2, bank.id), Some(vec![2]), &[(1, 4)]))
        .await;
    store.put_attempt(legacy(key(3, 999), Some(vec![0]), &[])).await;

    let first = run_backfill(&store, BatchOptions::default()).await.unwrap();
    assert_eq!(first.rebuilt, 2);
    assert_eq!(first.unresolvable, 1);
    assert_eq!(first.unresolved_keys, vec![key(3, 999)]);

    let after_first = store.all_attempts().await;
    let writes = store.attempt_writes();

    let second = run_backfill(&store, BatchOptions::default()).await.unwrap();
    assert_eq!(second.rebuilt, 0);
    assert_eq!(second.skipped, 2);
    assert_eq!(second.unresolvable, 1);
    assert_eq!(store.all_attempts().await, after_first);
    assert_eq!(store.attempt_writes(), writes);
}

#[tokio::test]
async fn dry_runs_write_nothing_and_match_live_counts() {
    let store = MemoryStore::new();
    let bank = seeded_bank(&store).await;

    store.put_attempt(legacy(key(1, bank.id), Some(vec![3]), &[])).await;
    let mut corrupt = legacy(key(2, bank.id), Some(vec![0, 2]), &[(1, 2)]);
    corrupt.snapshot = Some(wrapper_snapshot(2));
    corrupt.quiz_version = Some(1);
    store.put_attempt(corrupt).await;

    let before = store.all_attempts().await;
    let dry = BatchOptions {
        dry_run: true,
        verbose: true,
    };

    let dry_backfill = run_backfill(&store, dry).await.unwrap();
    let dry_repair = run_repair(&store, dry).await.unwrap();
    assert_eq!(store.all_attempts().await, before);
    assert_eq!(store.attempt_writes(), 0);
    assert!(dry_backfill.to_string().starts_with("[dry-run] "));

    let live_backfill = run_backfill(&store, BatchOptions::default()).await.unwrap();
    let live_repair = run_repair(&store, BatchOptions::default()).await.unwrap();

    assert_eq!(dry_backfill.rebuilt, live_backfill.rebuilt);
    assert_eq!(dry_backfill.skipped, live_backfill.skipped);
    assert_eq!(dry_repair.rebuilt, live_repair.rebuilt);
    assert_eq!(dry_repair.failed, live_repair.failed);
    assert_eq!(live_backfill.rebuilt, 1);
    assert_eq!(live_repair.rebuilt, 1);
}

#[tokio::test]
async fn repair_restores_text_and_grading() {
    let store = MemoryStore::new();
    let bank = seeded_bank(&store).await;
    let k = key(20, bank.id);

    let mut record = legacy(k, Some(vec![2, 0]), &[(1, 4), (2, 1)]);
    record.snapshot = Some(wrapper_snapshot(2));
    record.quiz_version = Some(1);
    store.put_attempt(record).await;

    // Corrupt content cannot be graded
    let before = scoring::score(&store.get_attempt(k).await.unwrap().unwrap());
    assert_eq!(before.correct, 0);
    assert_eq!(before.ineligible_positions, vec![1, 2]);

    // Backfill leaves it to repair
    let backfill = run_backfill(&store, BatchOptions::default()).await.unwrap();
    assert_eq!(backfill.rebuilt, 0);

    let report = run_repair(&store, BatchOptions::default()).await.unwrap();
    assert_eq!(report.rebuilt, 1);

    let repaired = store.get_attempt(k).await.unwrap().unwrap();
    let snapshot = repaired.snapshot.as_ref().unwrap();
    assert!(!snapshot.is_corrupt());
    assert_eq!(snapshot.questions[0].title, "Cygnus");
    assert_eq!(snapshot.questions[1].title, "Orion");
    assert_eq!(repaired.answers, record_answers(&[(1, 4), (2, 1)]));

    // Cygnus -> 4 right, Orion -> 1 wrong
    let after = scoring::score(&repaired);
    assert_eq!((after.correct, after.incorrect), (1, 1));

    let again = run_repair(&store, BatchOptions::default()).await.unwrap();
    assert_eq!(again.rebuilt, 0);
    assert_eq!(again.skipped, 1);
}

#[tokio::test]
async fn report_warns_about_drifted_content() {
    let store = MemoryStore::new();
    let bank = seeded_bank(&store).await;
    let k = key(30, bank.id);

    let mut record = legacy(k, Some(vec![0]), &[]);
    record.submitted_at = Some(bank.version_updated_at - Duration::days(3));
    store.put_attempt(record).await;

    let report = run_backfill(&store, BatchOptions::default()).await.unwrap();
    assert_eq!(report.drifted, 1);

    let text = report.to_string();
    assert!(text.starts_with("snapshot backfill: scanned 1, migrated 1"));
    assert!(text.contains("may not match"));
}

fn record_answers(pairs: &[(u32, u8)]) -> Answers {
    pairs.iter().copied().collect()
}
