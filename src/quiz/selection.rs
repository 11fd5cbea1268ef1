// src/quiz/selection.rs

use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{error::AppError, models::question_bank::QuestionBank};

/// How an attempt picks its questions from the bank.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionStrategy {
    /// First `k` questions in bank order.
    Sequential,
    /// Uniform subset of `k` questions in shuffled order.
    #[default]
    Random,
}

impl FromStr for SelectionStrategy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(SelectionStrategy::Sequential),
            "random" => Ok(SelectionStrategy::Random),
            other => Err(AppError::BadRequest(format!(
                "Unknown selection strategy '{}'",
                other
            ))),
        }
    }
}

/// Picks `k` distinct positions out of `bank_len`.
///
/// `k` is clamped to `bank_len`: the bank may have shrunk since its display
/// count was configured.
pub fn select<R: Rng + ?Sized>(
    bank_len: usize,
    k: usize,
    strategy: SelectionStrategy,
    rng: &mut R,
) -> Vec<usize> {
    let k = k.min(bank_len);
    match strategy {
        SelectionStrategy::Sequential => sequential(bank_len, k),
        SelectionStrategy::Random => rand::seq::index::sample(rng, bank_len, k).into_vec(),
    }
}

/// Selection for a new attempt against `bank`.
pub fn select_for<R: Rng + ?Sized>(
    bank: &QuestionBank,
    strategy: SelectionStrategy,
    rng: &mut R,
) -> Vec<usize> {
    select(bank.len(), bank.questions_to_show(), strategy, rng)
}

/// `0..k`, clamped to the bank size.
pub fn sequential(bank_len: usize, k: usize) -> Vec<usize> {
    (0..k.min(bank_len)).collect()
}
