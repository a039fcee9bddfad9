use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use common::EnrollmentDto;

use crate::db::DbPool;
use crate::error::AppError;
use crate::extractors::AuthUser;
use crate::web_server::AppState;
use crate::{courses, progress, stats};

const ENROLLMENT_SELECT: &str = "SELECT e.id, e.user_id, e.course_id, c.title AS course_title, e.progress,
        e.enrolled_at, e.completed_at, e.certificate_code
     FROM course_enrollments e
     JOIN courses c ON c.id = e.course_id";

pub(crate) async fn find_enrollment(
    db_pool: &DbPool,
    user_id: i64,
    course_id: i64,
) -> Result<Option<EnrollmentDto>, AppError> {
    let enrollment = sqlx::query_as::<_, EnrollmentDto>(&format!(
        "{ENROLLMENT_SELECT} WHERE e.user_id = $1 AND e.course_id = $2"
    ))
    .bind(user_id)
    .bind(course_id)
    .fetch_optional(db_pool)
    .await?;
    Ok(enrollment)
}

pub(crate) async fn require_enrollment(
    db_pool: &DbPool,
    user_id: i64,
    course_id: i64,
) -> Result<EnrollmentDto, AppError> {
    find_enrollment(db_pool, user_id, course_id)
        .await?
        .ok_or_else(|| AppError::Forbidden("You are not enrolled in this course".to_string()))
}

/// Recomputes an enrollment's progress from lesson completions. Reaching 100%
/// for the first time marks the course completed and issues a certificate code.
pub(crate) async fn recalculate_progress(
    db_pool: &DbPool,
    user_id: i64,
    course_id: i64,
) -> Result<EnrollmentDto, AppError> {
    let enrollment = require_enrollment(db_pool, user_id, course_id).await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lessons WHERE course_id = $1")
        .bind(course_id)
        .fetch_one(db_pool)
        .await?;
    let completed: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM lesson_completions lc
         JOIN lessons l ON l.id = lc.lesson_id
         WHERE lc.user_id = $1 AND l.course_id = $2",
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_one(db_pool)
    .await?;

    let progress = stats::progress_percent(completed, total);

    if progress == 100 && enrollment.completed_at.is_none() {
        let certificate_code = uuid::Uuid::new_v4().to_string();
        tracing::info!("User {} completed course {}", user_id, course_id);
        sqlx::query(
            "UPDATE course_enrollments SET progress = $1, completed_at = $2, certificate_code = $3 WHERE id = $4",
        )
        .bind(progress)
        .bind(Utc::now())
        .bind(certificate_code)
        .bind(enrollment.id)
        .execute(db_pool)
        .await?;
    } else if progress != enrollment.progress {
        sqlx::query("UPDATE course_enrollments SET progress = $1 WHERE id = $2")
            .bind(progress)
            .bind(enrollment.id)
            .execute(db_pool)
            .await?;
    }

    require_enrollment(db_pool, user_id, course_id).await
}

/// Recomputes progress for every enrollment in a course after its lesson set
/// changes. Completion and certificates already issued are kept.
pub(crate) async fn recalculate_course(db_pool: &DbPool, course_id: i64) -> Result<(), AppError> {
    let user_ids: Vec<i64> =
        sqlx::query_scalar("SELECT user_id FROM course_enrollments WHERE course_id = $1")
            .bind(course_id)
            .fetch_all(db_pool)
            .await?;

    for user_id in user_ids {
        recalculate_progress(db_pool, user_id, course_id).await?;
    }
    Ok(())
}

// --- API Handlers ---

/// ## Enroll in a course
/// A second enrollment for the same course is rejected.
#[utoipa::path(
    post,
    path = "/api/courses/{id}/enroll",
    tag = "enrollments",
    params(("id" = i64, Path, description = "Course id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Enrolled", body = EnrollmentDto),
        (status = 400, description = "Already enrolled"),
        (status = 404, description = "Course not found"),
    )
)]
pub async fn enroll(
    State(state): State<AppState>,
    user: AuthUser,
    Path(course_id): Path<i64>,
) -> Result<(StatusCode, Json<EnrollmentDto>), AppError> {
    tracing::info!("User {} enrolling in course {}", user.id, course_id);

    let course = courses::fetch_course(&state.db_pool, course_id).await?;
    if !course.published {
        return Err(AppError::NotFound("Course"));
    }

    // The unique (user_id, course_id) constraint decides between concurrent requests.
    let inserted = sqlx::query(
        "INSERT INTO course_enrollments (user_id, course_id, progress, enrolled_at)
         VALUES ($1, $2, 0, $3)
         ON CONFLICT (user_id, course_id) DO NOTHING",
    )
    .bind(user.id)
    .bind(course_id)
    .bind(Utc::now())
    .execute(&state.db_pool)
    .await?;

    if inserted.rows_affected() == 0 {
        return Err(AppError::BadRequest(
            "Already enrolled in this course".to_string(),
        ));
    }

    // Completions survive an unenroll, so a returning student keeps their progress.
    let enrollment = recalculate_progress(&state.db_pool, user.id, course_id).await?;
    progress::refresh(&state.db_pool, user.id).await?;

    Ok((StatusCode::CREATED, Json(enrollment)))
}

#[utoipa::path(
    delete,
    path = "/api/courses/{id}/enroll",
    tag = "enrollments",
    params(("id" = i64, Path, description = "Course id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Unenrolled"),
        (status = 404, description = "Not enrolled"),
    )
)]
pub async fn unenroll(
    State(state): State<AppState>,
    user: AuthUser,
    Path(course_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    tracing::info!("User {} leaving course {}", user.id, course_id);

    let result = sqlx::query("DELETE FROM course_enrollments WHERE user_id = $1 AND course_id = $2")
        .bind(user.id)
        .bind(course_id)
        .execute(&state.db_pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Enrollment"));
    }

    progress::refresh(&state.db_pool, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/enrollments",
    tag = "enrollments",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "The caller's enrollments", body = Vec<EnrollmentDto>),
    )
)]
pub async fn list_enrollments(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<EnrollmentDto>>, AppError> {
    let enrollments = sqlx::query_as::<_, EnrollmentDto>(&format!(
        "{ENROLLMENT_SELECT} WHERE e.user_id = $1 ORDER BY e.id DESC"
    ))
    .bind(user.id)
    .fetch_all(&state.db_pool)
    .await?;

    Ok(Json(enrollments))
}
