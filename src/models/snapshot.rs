// src/models/snapshot.rs

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::models::question_bank::Question;

/// Reads a text field, mapping anything that is not a string to `""`.
///
/// Snapshots written by the old capture path stored storage wrapper objects
/// where text belonged. Those must load (as blank) so repair can find them.
fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => text,
        _ => String::new(),
    })
}

fn lenient_optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => Some(text),
        _ => None,
    })
}

/// Answer slot as a plain or quoted integer; anything else is `None`.
fn lenient_slot<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64().and_then(|n| u8::try_from(n).ok()),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    })
}

/// Non-negative integer, zero when the value is anything else.
fn lenient_number<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64> + Default,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_u64()
            .and_then(|n| T::try_from(n).ok())
            .unwrap_or_default(),
        _ => T::default(),
    })
}

/// A question frozen at attempt time.
///
/// Kept apart from [`Question`]; only [`CapturedQuestion::from_question`]
/// turns live bank content into one. Loading goes through [`StoredQuestion`]
/// so a damaged entry still decodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredQuestion")]
pub struct CapturedQuestion {
    pub stable_id: String,
    pub title: String,
    /// Legacy image field, kept verbatim next to `image_url`.
    pub image: Option<String>,
    pub image_url: Option<String>,
    pub answer1: String,
    pub answer2: String,
    pub answer3: String,
    pub answer4: String,
    /// Passed through from the bank as-is, even when missing or out of range.
    pub correct_answer: Option<u8>,
    /// Position of the question in the bank at capture time.
    pub original_index: usize,
}

/// Persisted shape of a captured question. Every field tolerates junk.
#[derive(Deserialize)]
struct StoredQuestion {
    #[serde(default, deserialize_with = "lenient_text")]
    stable_id: String,
    #[serde(default, deserialize_with = "lenient_text")]
    title: String,
    #[serde(default, deserialize_with = "lenient_optional_text")]
    image: Option<String>,
    #[serde(default, deserialize_with = "lenient_optional_text")]
    image_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    answer1: String,
    #[serde(default, deserialize_with = "lenient_text")]
    answer2: String,
    #[serde(default, deserialize_with = "lenient_text")]
    answer3: String,
    #[serde(default, deserialize_with = "lenient_text")]
    answer4: String,
    #[serde(default, deserialize_with = "lenient_slot")]
    correct_answer: Option<u8>,
    #[serde(default, deserialize_with = "lenient_number")]
    original_index: usize,
}

impl From<StoredQuestion> for CapturedQuestion {
    fn from(stored: StoredQuestion) -> Self {
        let stable_id = match stored.stable_id.trim() {
            "" => format!("q_{}", stored.original_index),
            id => id.to_string(),
        };

        Self {
            stable_id,
            title: stored.title,
            image: stored.image,
            image_url: stored.image_url,
            answer1: stored.answer1,
            answer2: stored.answer2,
            answer3: stored.answer3,
            answer4: stored.answer4,
            correct_answer: stored.correct_answer,
            original_index: stored.original_index,
        }
    }
}

impl CapturedQuestion {
    /// Copies `question` field by field.
    pub fn from_question(question: &Question, original_index: usize) -> Self {
        Self {
            stable_id: stable_id(question, original_index),
            title: question.title.clone(),
            image: question.image.clone(),
            image_url: question.image_url.clone(),
            answer1: question.answer1.clone(),
            answer2: question.answer2.clone(),
            answer3: question.answer3.clone().unwrap_or_default(),
            answer4: question.answer4.clone().unwrap_or_default(),
            correct_answer: question.correct_answer,
            original_index,
        }
    }

    /// Text of answer slot `slot` (1-based), `None` when blank.
    pub fn answer(&self, slot: u8) -> Option<&str> {
        let text = match slot {
            1 => self.answer1.as_str(),
            2 => self.answer2.as_str(),
            3 => self.answer3.as_str(),
            4 => self.answer4.as_str(),
            _ => return None,
        };
        (!text.trim().is_empty()).then_some(text)
    }

    /// Correct slot, if it points at a non-blank answer.
    pub fn resolved_correct_answer(&self) -> Option<u8> {
        self.correct_answer.filter(|slot| self.answer(*slot).is_some())
    }

    fn is_blank(&self) -> bool {
        self.title.trim().is_empty()
            && self.answer1.trim().is_empty()
            && self.answer2.trim().is_empty()
    }
}

/// Explicit id, then the bank-assigned uid, then `q_<index>`.
fn stable_id(question: &Question, original_index: usize) -> String {
    [question.id.as_deref(), question.uid.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("q_{}", original_index))
}

/// The questions one attempt was shown, in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptSnapshot {
    #[serde(default)]
    pub questions: Vec<CapturedQuestion>,

    /// Bank version the content was read from. Older snapshots only carry
    /// the stamp on the attempt record; those load as 0.
    #[serde(default, deserialize_with = "lenient_number")]
    pub quiz_version: i64,

    /// Selection positions that no longer existed in the bank at capture time.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_positions: Vec<usize>,
}

impl AttemptSnapshot {
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// True when every captured question has a blank title and blank first two
    /// answers, which is what a wrapper-instead-of-fields copy leaves behind.
    /// An empty snapshot is absent rather than corrupt.
    pub fn is_corrupt(&self) -> bool {
        !self.questions.is_empty() && self.questions.iter().all(CapturedQuestion::is_blank)
    }

    /// Question shown at display position `position` (1-based).
    pub fn question_at(&self, position: usize) -> Option<&CapturedQuestion> {
        position.checked_sub(1).and_then(|i| self.questions.get(i))
    }

    /// Number of questions the attempt selected, captured or not.
    pub fn selected_count(&self) -> usize {
        self.questions.len() + self.missing_positions.len()
    }
}
