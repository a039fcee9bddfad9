use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use common::{EnrollmentDto, LessonDto, NewLesson};
use validator::Validate;

use crate::db::DbPool;
use crate::error::AppError;
use crate::extractors::AuthUser;
use crate::web_server::AppState;
use crate::{courses, enrollments, progress};

pub(crate) async fn fetch_lesson(db_pool: &DbPool, lesson_id: i64) -> Result<LessonDto, AppError> {
    sqlx::query_as::<_, LessonDto>(
        "SELECT id, course_id, title, content, position, duration_minutes, created_at
         FROM lessons WHERE id = $1",
    )
    .bind(lesson_id)
    .fetch_optional(db_pool)
    .await?
    .ok_or(AppError::NotFound("Lesson"))
}

// --- API Handlers ---

#[utoipa::path(
    get,
    path = "/api/courses/{id}/lessons",
    tag = "lessons",
    params(("id" = i64, Path, description = "Course id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Lessons in order", body = Vec<LessonDto>),
        (status = 404, description = "Course not found"),
    )
)]
pub async fn list_lessons(
    State(state): State<AppState>,
    user: AuthUser,
    Path(course_id): Path<i64>,
) -> Result<Json<Vec<LessonDto>>, AppError> {
    let course = courses::fetch_course(&state.db_pool, course_id).await?;
    if !course.published && !user.can_manage(course.instructor_id) {
        return Err(AppError::NotFound("Course"));
    }

    Ok(Json(courses::fetch_lessons(&state.db_pool, course_id).await?))
}

#[utoipa::path(
    post,
    path = "/api/courses/{id}/lessons",
    tag = "lessons",
    request_body = NewLesson,
    params(("id" = i64, Path, description = "Course id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Lesson created", body = LessonDto),
        (status = 403, description = "Not the course owner"),
        (status = 404, description = "Course not found"),
    )
)]
pub async fn create_lesson(
    State(state): State<AppState>,
    user: AuthUser,
    Path(course_id): Path<i64>,
    Json(payload): Json<NewLesson>,
) -> Result<(StatusCode, Json<LessonDto>), AppError> {
    payload.validate()?;

    let course = courses::fetch_course(&state.db_pool, course_id).await?;
    user.require_manager(course.instructor_id)?;

    let position = match payload.position {
        Some(position) => position,
        None => {
            let last: i64 =
                sqlx::query_scalar("SELECT COALESCE(MAX(position), 0) FROM lessons WHERE course_id = $1")
                    .bind(course_id)
                    .fetch_one(&state.db_pool)
                    .await?;
            last + 1
        }
    };
    tracing::info!("Adding lesson '{}' to course {} at {}", payload.title, course_id, position);

    let lesson = sqlx::query_as::<_, LessonDto>(
        "INSERT INTO lessons (course_id, title, content, position, duration_minutes, created_at)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING id, course_id, title, content, position, duration_minutes, created_at",
    )
    .bind(course_id)
    .bind(&payload.title)
    .bind(&payload.content)
    .bind(position)
    .bind(payload.duration_minutes)
    .bind(Utc::now())
    .fetch_one(&state.db_pool)
    .await?;

    enrollments::recalculate_course(&state.db_pool, course_id).await?;

    Ok((StatusCode::CREATED, Json(lesson)))
}

/// ## Mark a lesson complete
/// Idempotent; returns the enrollment with its recomputed progress.
#[utoipa::path(
    post,
    path = "/api/lessons/{id}/complete",
    tag = "lessons",
    params(("id" = i64, Path, description = "Lesson id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Updated enrollment", body = EnrollmentDto),
        (status = 403, description = "Not enrolled in the lesson's course"),
        (status = 404, description = "Lesson not found"),
    )
)]
pub async fn complete_lesson(
    State(state): State<AppState>,
    user: AuthUser,
    Path(lesson_id): Path<i64>,
) -> Result<Json<EnrollmentDto>, AppError> {
    let lesson = fetch_lesson(&state.db_pool, lesson_id).await?;
    enrollments::require_enrollment(&state.db_pool, user.id, lesson.course_id).await?;
    tracing::info!("User {} completed lesson {}", user.id, lesson_id);

    sqlx::query(
        "INSERT INTO lesson_completions (user_id, lesson_id, completed_at) VALUES ($1, $2, $3)
         ON CONFLICT (user_id, lesson_id) DO NOTHING",
    )
    .bind(user.id)
    .bind(lesson_id)
    .bind(Utc::now())
    .execute(&state.db_pool)
    .await?;

    let enrollment =
        enrollments::recalculate_progress(&state.db_pool, user.id, lesson.course_id).await?;
    progress::refresh(&state.db_pool, user.id).await?;

    Ok(Json(enrollment))
}
