// src/handlers/editor.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::question_bank::{
        CreateQuizRequest, QuestionBank, QuestionInput, QuestionsToShowRequest,
    },
    state::SharedStore,
    utils::{html::clean_html, jwt::Claims},
};

/// Loads a bank, applies `edit`, and saves it against the revision it was read at.
async fn edit_bank<F>(
    store: &SharedStore,
    claims: &Claims,
    quiz_id: i64,
    edit: F,
) -> Result<QuestionBank, AppError>
where
    F: FnOnce(&mut QuestionBank) -> Result<(), AppError>,
{
    let mut bank = store
        .get_bank(quiz_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Quiz {} not found", quiz_id)))?;

    let read = bank.revision();
    edit(&mut bank)?;
    store.update_bank(&bank, read).await?;

    tracing::info!(
        quiz_id,
        editor = %claims.sub,
        from_version = read.version,
        to_version = bank.version,
        "Quiz edited"
    );
    Ok(bank)
}

/// Creates a new quiz bank at version 1.
/// Editor only.
pub async fn create_quiz(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut questions = Vec::with_capacity(payload.questions.len());
    for (index, input) in payload.questions.into_iter().enumerate() {
        let question = input
            .into_question()
            .map_err(|e| AppError::BadRequest(format!("Question {}: {}", index, e)))?;
        question
            .check_correct_answer()
            .map_err(|e| AppError::BadRequest(format!("Question {}: {}", index, e)))?;
        questions.push(question);
    }

    let mut bank = QuestionBank::new(0, clean_html(&payload.name), questions);
    if payload.questions_to_show.is_some() {
        bank.set_questions_to_show(payload.questions_to_show)?;
    }

    let bank = store.insert_bank(bank).await?;
    tracing::info!(quiz_id = bank.id, editor = %claims.sub, "Quiz created");

    Ok((StatusCode::CREATED, Json(bank)))
}

/// Returns the live bank, answer key included.
/// Editor only.
pub async fn get_quiz(
    State(store): State<SharedStore>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let bank = store
        .get_bank(quiz_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Quiz {} not found", quiz_id)))?;

    Ok(Json(bank))
}

/// Appends a question. Bumps the version.
pub async fn add_question(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
    Json(payload): Json<QuestionInput>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let question = payload.into_question()?;

    let bank = edit_bank(&store, &claims, quiz_id, |bank| bank.add_question(question)).await?;
    Ok((StatusCode::CREATED, Json(bank)))
}

/// Replaces the question at `index`. Bumps the version.
pub async fn update_question(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path((quiz_id, index)): Path<(i64, usize)>,
    Json(payload): Json<QuestionInput>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let question = payload.into_question()?;

    let bank = edit_bank(&store, &claims, quiz_id, |bank| {
        bank.replace_question(index, question)
    })
    .await?;
    Ok(Json(bank))
}

/// Removes the question at `index`. Bumps the version.
pub async fn delete_question(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path((quiz_id, index)): Path<(i64, usize)>,
) -> Result<impl IntoResponse, AppError> {
    let bank = edit_bank(&store, &claims, quiz_id, |bank| {
        bank.remove_question(index).map(|_| ())
    })
    .await?;
    Ok(Json(bank))
}

/// Sets how many questions an attempt shows. Version unchanged.
pub async fn set_questions_to_show(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
    Json(payload): Json<QuestionsToShowRequest>,
) -> Result<impl IntoResponse, AppError> {
    let bank = edit_bank(&store, &claims, quiz_id, |bank| {
        bank.set_questions_to_show(payload.questions_to_show)
    })
    .await?;
    Ok(Json(bank))
}
