use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use common::{NewQuizSubmission, QuizSubmissionDto};
use validator::Validate;

use crate::error::AppError;
use crate::extractors::AuthUser;
use crate::web_server::AppState;
use crate::{enrollments, lessons, progress};

#[utoipa::path(
    get,
    path = "/api/quizzes/submissions",
    tag = "progress",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "The caller's quiz results", body = Vec<QuizSubmissionDto>),
    )
)]
pub async fn list_quiz_submissions(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<QuizSubmissionDto>>, AppError> {
    let submissions = sqlx::query_as::<_, QuizSubmissionDto>(
        "SELECT id, user_id, lesson_id, score, max_score, submitted_at
         FROM quiz_submissions WHERE user_id = $1 ORDER BY submitted_at DESC, id DESC",
    )
    .bind(user.id)
    .fetch_all(&state.db_pool)
    .await?;

    Ok(Json(submissions))
}

/// ## Record a quiz result for a lesson
/// Every attempt is kept.
#[utoipa::path(
    post,
    path = "/api/quizzes/submissions",
    tag = "progress",
    request_body = NewQuizSubmission,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Result recorded", body = QuizSubmissionDto),
        (status = 400, description = "Score out of range"),
        (status = 403, description = "Not enrolled in the lesson's course"),
        (status = 404, description = "Lesson not found"),
    )
)]
pub async fn submit_quiz(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<NewQuizSubmission>,
) -> Result<(StatusCode, Json<QuizSubmissionDto>), AppError> {
    payload.validate()?;

    let lesson = lessons::fetch_lesson(&state.db_pool, payload.lesson_id).await?;
    enrollments::require_enrollment(&state.db_pool, user.id, lesson.course_id).await?;

    let submission = sqlx::query_as::<_, QuizSubmissionDto>(
        "INSERT INTO quiz_submissions (user_id, lesson_id, score, max_score, submitted_at)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING id, user_id, lesson_id, score, max_score, submitted_at",
    )
    .bind(user.id)
    .bind(lesson.id)
    .bind(payload.score)
    .bind(payload.max_score)
    .bind(Utc::now())
    .fetch_one(&state.db_pool)
    .await?;

    progress::refresh(&state.db_pool, user.id).await?;

    Ok((StatusCode::CREATED, Json(submission)))
}
