// src/models/attempt.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::snapshot::{AttemptSnapshot, CapturedQuestion};

/// Chosen option (1..=4) keyed by 1-based display position.
pub type Answers = BTreeMap<u32, u8>;

/// Identifies one student's attempt at one quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttemptKey {
    pub student_id: i64,
    pub quiz_id: i64,
}

impl std::fmt::Display for AttemptKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "student={} quiz={}", self.student_id, self.quiz_id)
    }
}

/// Represents one row of the 'quiz_attempts' table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub student_id: i64,
    pub quiz_id: i64,

    /// Denormalized quiz name at start time.
    pub quiz_name: String,

    /// Completed flag. Once set the record only changes through repair.
    #[serde(rename = "isEnterd")]
    pub is_entered: bool,

    /// Bank positions chosen at start. `None` on attempts older than random selection.
    pub selection_indices: Option<Vec<usize>>,

    pub snapshot: Option<AttemptSnapshot>,

    /// Bank version the snapshot was captured from.
    pub quiz_version: Option<i64>,

    #[serde(default)]
    pub answers: Answers,

    pub started_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl AttemptRecord {
    /// A fresh, not yet captured attempt.
    pub fn start(key: AttemptKey, quiz_name: String, selection_indices: Vec<usize>) -> Self {
        Self {
            student_id: key.student_id,
            quiz_id: key.quiz_id,
            quiz_name,
            is_entered: false,
            selection_indices: Some(selection_indices),
            snapshot: None,
            quiz_version: None,
            answers: Answers::new(),
            started_at: Some(Utc::now()),
            submitted_at: None,
        }
    }

    pub fn key(&self) -> AttemptKey {
        AttemptKey {
            student_id: self.student_id,
            quiz_id: self.quiz_id,
        }
    }

    /// Persisted selection, if it carries any positions.
    pub fn persisted_selection(&self) -> Option<&[usize]> {
        self.selection_indices
            .as_deref()
            .filter(|indices| !indices.is_empty())
    }

    pub fn has_usable_snapshot(&self) -> bool {
        self.snapshot.as_ref().is_some_and(|s| !s.is_empty())
    }

    /// Completed, but no snapshot to score against.
    pub fn needs_backfill(&self) -> bool {
        self.is_entered && !self.has_usable_snapshot()
    }

    /// Completed, with a snapshot that lost its text.
    pub fn needs_repair(&self) -> bool {
        self.is_entered && self.snapshot.as_ref().is_some_and(AttemptSnapshot::is_corrupt)
    }

    /// Stores `snapshot` and stamps the version it was read from.
    pub fn install_snapshot(&mut self, snapshot: AttemptSnapshot) {
        self.quiz_version = Some(snapshot.quiz_version);
        self.snapshot = Some(snapshot);
    }
}

/// Aggregate result of grading one attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub correct: usize,
    pub incorrect: usize,
    /// Includes positions that could not be graded or were never captured.
    pub unattempted: usize,
    /// Display positions whose correct answer is undefined.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ineligible_positions: Vec<usize>,
}

impl ScoreSummary {
    pub fn total(&self) -> usize {
        self.correct + self.incorrect + self.unattempted
    }
}

/// A snapshot question as shown while the attempt is open (no answer key).
#[derive(Debug, Clone, Serialize)]
pub struct DisplayQuestion {
    pub position: usize,
    pub stable_id: String,
    pub title: String,
    pub image: Option<String>,
    pub image_url: Option<String>,
    pub answer1: String,
    pub answer2: String,
    pub answer3: String,
    pub answer4: String,
}

impl DisplayQuestion {
    pub fn new(position: usize, question: &CapturedQuestion) -> Self {
        Self {
            position,
            stable_id: question.stable_id.clone(),
            title: question.title.clone(),
            image: question.image.clone(),
            image_url: question.image_url.clone(),
            answer1: question.answer1.clone(),
            answer2: question.answer2.clone(),
            answer3: question.answer3.clone(),
            answer4: question.answer4.clone(),
        }
    }
}

/// Response for starting or reopening an attempt.
#[derive(Debug, Serialize)]
pub struct AttemptView {
    pub quiz_id: i64,
    pub quiz_name: String,
    pub quiz_version: Option<i64>,
    #[serde(rename = "isEnterd")]
    pub is_entered: bool,
    pub questions: Vec<DisplayQuestion>,
    pub answers: Answers,
    /// Present once the attempt is submitted.
    pub score: Option<ScoreSummary>,
}

/// Everything a review page needs for one display position.
#[derive(Debug, Serialize)]
pub struct ReviewItem {
    pub position: usize,
    pub question: CapturedQuestion,
    pub selected: Option<u8>,
    pub correct_answer: Option<u8>,
    pub summary: ScoreSummary,
}

/// DTO for submitting an attempt.
#[derive(Debug, Deserialize)]
pub struct SubmitAttemptRequest {
    #[serde(default)]
    pub answers: Answers,
}

#[derive(Debug, Deserialize)]
pub struct ReviewQuery {
    pub position: usize,
}
