// src/quiz/capture.rs

use serde::Serialize;

use crate::{
    models::{
        question_bank::QuestionBank,
        snapshot::{AttemptSnapshot, CapturedQuestion},
    },
    quiz::selection,
};

/// Freezes the questions at `selection` into a snapshot.
///
/// Positions past the end of the bank are skipped and recorded, never fatal.
/// The version stamp comes from the same `bank` value the content was read
/// from, so it always matches what was captured.
pub fn capture(bank: &QuestionBank, selection: &[usize]) -> AttemptSnapshot {
    let mut questions = Vec::with_capacity(selection.len());
    let mut missing_positions = Vec::new();

    for &position in selection {
        match bank.questions.get(position) {
            Some(question) => questions.push(CapturedQuestion::from_question(question, position)),
            None => {
                tracing::warn!(
                    quiz_id = bank.id,
                    position,
                    bank_len = bank.len(),
                    "Selected question no longer exists, skipping"
                );
                missing_positions.push(position);
            }
        }
    }

    AttemptSnapshot {
        questions,
        quiz_version: bank.version,
        missing_positions,
    }
}

/// Where a reconstructed snapshot took its positions from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionSource {
    /// The attempt's own persisted selection.
    Persisted,
    /// First `questions_to_show` questions in bank order.
    SequentialFallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconstruction {
    pub snapshot: AttemptSnapshot,
    pub source: SelectionSource,
}

/// Why a reconstruction cannot be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconstructionFault {
    /// None of the positions resolved to a question.
    NoQuestions,
    /// The bank questions themselves carry no text.
    BlankContent,
}

impl std::fmt::Display for ReconstructionFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconstructionFault::NoQuestions => write!(f, "no selected question exists in the bank"),
            ReconstructionFault::BlankContent => write!(f, "bank questions have no usable text"),
        }
    }
}

impl Reconstruction {
    /// A result that would still trip the corruption detector is rejected.
    pub fn check(&self) -> Result<(), ReconstructionFault> {
        if self.snapshot.is_empty() {
            Err(ReconstructionFault::NoQuestions)
        } else if self.snapshot.is_corrupt() {
            Err(ReconstructionFault::BlankContent)
        } else {
            Ok(())
        }
    }
}

/// Rebuilds a snapshot for an attempt that lacks a usable one.
///
/// Uses the persisted selection when it has positions, otherwise the bank's
/// sequential prefix. Both backfill and repair go through here.
pub fn reconstruct_snapshot(bank: &QuestionBank, persisted: Option<&[usize]>) -> Reconstruction {
    match persisted.filter(|indices| !indices.is_empty()) {
        Some(indices) => Reconstruction {
            snapshot: capture(bank, indices),
            source: SelectionSource::Persisted,
        },
        None => {
            let indices = selection::sequential(bank.len(), bank.questions_to_show());
            Reconstruction {
                snapshot: capture(bank, &indices),
                source: SelectionSource::SequentialFallback,
            }
        }
    }
}
