// src/handlers/attempt.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};

use crate::{
    config::Config,
    error::AppError,
    models::attempt::{AttemptKey, ReviewQuery, SubmitAttemptRequest},
    quiz::attempts,
    state::SharedStore,
    utils::jwt::Claims,
};

fn attempt_key(claims: &Claims, quiz_id: i64) -> Result<AttemptKey, AppError> {
    Ok(AttemptKey {
        student_id: claims.student_id()?,
        quiz_id,
    })
}

/// Starts (or resumes) the caller's attempt at a quiz.
///
/// Returns the questions the student will answer, without correct answers.
pub async fn start_attempt(
    State(store): State<SharedStore>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let key = attempt_key(&claims, quiz_id)?;
    let record =
        attempts::start_attempt(store.as_ref(), key, config.selection_strategy, rand::random())
            .await?;

    Ok(Json(attempts::to_view(&record)))
}

/// Redisplays the caller's attempt from its snapshot.
pub async fn get_attempt(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let key = attempt_key(&claims, quiz_id)?;
    let view = attempts::view_attempt(store.as_ref(), key).await?;

    Ok(Json(view))
}

/// Submits the caller's answers and returns the score.
///
/// Answers map 1-based display positions to options 1..4.
pub async fn submit_attempt(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
    Json(req): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    let key = attempt_key(&claims, quiz_id)?;
    let (record, summary) = attempts::submit_attempt(store.as_ref(), key, req.answers).await?;

    Ok(Json(serde_json::json!({
        "quiz_id": record.quiz_id,
        "quiz_version": record.quiz_version,
        "correct": summary.correct,
        "incorrect": summary.incorrect,
        "unattempted": summary.unattempted,
        "total_questions": summary.total(),
        "ineligible_positions": summary.ineligible_positions,
        "message": "Attempt submitted successfully"
    })))
}

/// Review data for one question of a submitted attempt.
pub async fn review_attempt(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
    Query(query): Query<ReviewQuery>,
) -> Result<impl IntoResponse, AppError> {
    let key = attempt_key(&claims, quiz_id)?;
    let item = attempts::review_attempt(store.as_ref(), key, query.position).await?;

    Ok(Json(item))
}
