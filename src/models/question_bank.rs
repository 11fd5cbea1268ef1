// src/models/question_bank.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

use crate::{error::AppError, utils::html::clean_html};

/// Number of answer slots a question can carry.
pub const ANSWER_SLOTS: u8 = 4;

/// One question as stored in the live bank.
///
/// Text fields tolerate `null` and missing keys because rows written by older
/// clients are not guaranteed to carry them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Identifier supplied by the editor, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Identity assigned by the bank when the question was added.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,

    /// Legacy image field. Older rows only carry this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub answer1: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub answer2: String,

    /// Absent on two-choice questions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer3: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer4: Option<String>,

    /// 1-based slot of the correct answer.
    #[serde(default)]
    pub correct_answer: Option<u8>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl Question {
    /// Text of answer slot `slot` (1-based), `None` when the slot is empty.
    pub fn answer(&self, slot: u8) -> Option<&str> {
        let text = match slot {
            1 => Some(self.answer1.as_str()),
            2 => Some(self.answer2.as_str()),
            3 => self.answer3.as_deref(),
            4 => self.answer4.as_deref(),
            _ => None,
        };
        text.filter(|t| !t.trim().is_empty())
    }

    /// The correct answer must point at a non-empty slot.
    pub fn check_correct_answer(&self) -> Result<(), AppError> {
        match self.correct_answer {
            Some(slot) if self.answer(slot).is_some() => Ok(()),
            Some(slot) => Err(AppError::BadRequest(format!(
                "correct_answer {} references an empty answer slot",
                slot
            ))),
            None => Err(AppError::BadRequest("correct_answer is required".to_string())),
        }
    }
}

/// What an optimistic bank update is checked against.
///
/// The display count is not versioned, so it is compared alongside the version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankRevision {
    pub version: i64,
    pub questions_to_show_override: Option<usize>,
}

/// The live, editor-owned quiz definition.
///
/// Every content edit goes through the methods below so the version counter
/// and the derived display count can never drift from the question list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionBank {
    pub id: i64,
    pub name: String,
    pub version: i64,
    pub version_updated_at: DateTime<Utc>,
    pub questions: Vec<Question>,

    /// Display count explicitly chosen by the editor.
    pub questions_to_show_override: Option<usize>,

    questions_to_show: usize,
}

impl QuestionBank {
    /// Builds a fresh bank at version 1.
    pub fn new(id: i64, name: String, questions: Vec<Question>) -> Self {
        let questions = questions.into_iter().map(with_uid).collect();
        Self::from_parts(id, name, 1, Utc::now(), questions, None)
    }

    /// Rebuilds a bank from persisted columns.
    pub fn from_parts(
        id: i64,
        name: String,
        version: i64,
        version_updated_at: DateTime<Utc>,
        questions: Vec<Question>,
        questions_to_show_override: Option<usize>,
    ) -> Self {
        let mut bank = Self {
            id,
            name,
            version,
            version_updated_at,
            questions,
            questions_to_show_override,
            questions_to_show: 0,
        };
        bank.refresh_questions_to_show();
        bank
    }

    /// Revision the next update of this bank must be checked against.
    pub fn revision(&self) -> BankRevision {
        BankRevision {
            version: self.version,
            questions_to_show_override: self.questions_to_show_override,
        }
    }

    /// Number of questions an attempt presents. Never exceeds the bank size.
    pub fn questions_to_show(&self) -> usize {
        self.questions_to_show
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn add_question(&mut self, question: Question) -> Result<(), AppError> {
        question.check_correct_answer()?;
        self.questions.push(with_uid(question));
        self.bump_version();
        Ok(())
    }

    pub fn replace_question(&mut self, index: usize, question: Question) -> Result<(), AppError> {
        question.check_correct_answer()?;
        let slot = self
            .questions
            .get_mut(index)
            .ok_or_else(|| AppError::NotFound(format!("Question {} not found", index)))?;

        let uid = question.uid.clone().or_else(|| slot.uid.clone());
        *slot = with_uid(Question { uid, ..question });
        self.bump_version();
        Ok(())
    }

    pub fn remove_question(&mut self, index: usize) -> Result<Question, AppError> {
        if index >= self.questions.len() {
            return Err(AppError::NotFound(format!("Question {} not found", index)));
        }
        let removed = self.questions.remove(index);
        self.bump_version();
        Ok(removed)
    }

    /// Display policy is not content, so the version stays put.
    pub fn set_questions_to_show(&mut self, count: Option<usize>) -> Result<(), AppError> {
        if let Some(n) = count {
            if n == 0 || n > self.questions.len() {
                return Err(AppError::BadRequest(format!(
                    "questions_to_show must be between 1 and {}",
                    self.questions.len()
                )));
            }
        }
        self.questions_to_show_override = count;
        self.refresh_questions_to_show();
        Ok(())
    }

    fn bump_version(&mut self) {
        self.version += 1;
        self.version_updated_at = Utc::now();
        self.refresh_questions_to_show();
    }

    fn refresh_questions_to_show(&mut self) {
        let len = self.questions.len();
        self.questions_to_show = self
            .questions_to_show_override
            .map(|n| n.min(len))
            .unwrap_or(len);
    }
}

fn with_uid(mut question: Question) -> Question {
    if question.uid.is_none() {
        question.uid = Some(uuid::Uuid::new_v4().to_string());
    }
    question
}

/// DTO for one question supplied by an editor.
#[derive(Debug, Deserialize, Validate)]
pub struct QuestionInput {
    #[validate(length(min = 1, max = 100))]
    pub id: Option<String>,
    #[validate(length(min = 1, max = 1000))]
    pub title: String,
    #[validate(length(max = 500))]
    pub image_url: Option<String>,
    #[validate(length(min = 1, max = 500))]
    pub answer1: String,
    #[validate(length(min = 1, max = 500))]
    pub answer2: String,
    #[validate(length(max = 500))]
    pub answer3: Option<String>,
    #[validate(length(max = 500))]
    pub answer4: Option<String>,
    #[validate(range(min = 1, max = 4))]
    pub correct_answer: u8,
}

impl QuestionInput {
    /// Sanitizes editor text and maps blank optional slots to `None`.
    ///
    /// Length checks run on the raw input, so required fields are checked
    /// again once markup is stripped.
    pub fn into_question(self) -> Result<Question, AppError> {
        let optional = |text: Option<String>| {
            text.map(|t| clean_html(&t))
                .filter(|t| !t.trim().is_empty())
        };

        Ok(Question {
            id: self.id,
            uid: None,
            title: required_text("title", &self.title)?,
            image: None,
            image_url: self.image_url.filter(|u| !u.trim().is_empty()),
            answer1: required_text("answer1", &self.answer1)?,
            answer2: required_text("answer2", &self.answer2)?,
            answer3: optional(self.answer3),
            answer4: optional(self.answer4),
            correct_answer: Some(self.correct_answer),
        })
    }
}

fn required_text(field: &str, raw: &str) -> Result<String, AppError> {
    let cleaned = clean_html(raw);
    if cleaned.is_empty() {
        return Err(AppError::BadRequest(format!(
            "{} is empty once markup is removed",
            field
        )));
    }
    Ok(cleaned)
}

/// DTO for creating a quiz.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(nested)]
    pub questions: Vec<QuestionInput>,
    pub questions_to_show: Option<usize>,
}

/// DTO for changing the display count. `null` resets it to the bank size.
#[derive(Debug, Deserialize)]
pub struct QuestionsToShowRequest {
    pub questions_to_show: Option<usize>,
}
