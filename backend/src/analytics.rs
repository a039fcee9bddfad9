use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use common::{AnalyticsQuery, CourseAnalytics, UserAnalytics};

use crate::courses;
use crate::db::DbPool;
use crate::error::AppError;
use crate::extractors::AuthUser;
use crate::stats::{self, Activity, SubmissionFacts};
use crate::web_server::AppState;

type SubmissionRow = (Option<DateTime<Utc>>, Option<DateTime<Utc>>, Option<i64>, i64);

fn to_facts(rows: Vec<SubmissionRow>) -> Vec<SubmissionFacts> {
    rows.into_iter()
        .map(|(submitted_at, graded_at, grade, max_points)| SubmissionFacts {
            submitted_at,
            graded_at,
            grade,
            max_points,
        })
        .collect()
}

async fn load_activity(db_pool: &DbPool, user_id: i64) -> Result<Activity, AppError> {
    let sessions = sqlx::query_as(
        "SELECT started_at, duration_minutes FROM study_sessions WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_all(db_pool)
    .await?;

    let lesson_completions =
        sqlx::query_scalar("SELECT completed_at FROM lesson_completions WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(db_pool)
            .await?;

    let quizzes = sqlx::query_as(
        "SELECT score, max_score, submitted_at FROM quiz_submissions WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_all(db_pool)
    .await?;

    let enrollments =
        sqlx::query_scalar("SELECT completed_at FROM course_enrollments WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(db_pool)
            .await?;

    let submissions: Vec<SubmissionRow> = sqlx::query_as(
        "SELECT s.submitted_at, s.graded_at, s.grade, a.max_points
         FROM assignment_submissions s JOIN assignments a ON a.id = s.assignment_id
         WHERE s.user_id = $1",
    )
    .bind(user_id)
    .fetch_all(db_pool)
    .await?;

    Ok(Activity {
        sessions,
        lesson_completions,
        quizzes,
        enrollments,
        submissions: to_facts(submissions),
    })
}

/// ## The caller's learning analytics
/// Aggregates over the last `days` days (default 30, clamped to 1..=365).
#[utoipa::path(
    get,
    path = "/api/analytics",
    tag = "progress",
    params(AnalyticsQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Windowed aggregates", body = UserAnalytics),
    )
)]
pub async fn user_analytics(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<UserAnalytics>, AppError> {
    let days = stats::clamp_window(query.days);
    let activity = load_activity(&state.db_pool, user.id).await?;

    Ok(Json(stats::user_analytics(&activity, Utc::now(), days)))
}

#[utoipa::path(
    get,
    path = "/api/courses/{id}/analytics",
    tag = "courses",
    params(("id" = i64, Path, description = "Course id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Course aggregates", body = CourseAnalytics),
        (status = 403, description = "Not the course owner"),
        (status = 404, description = "Course not found"),
    )
)]
pub async fn course_analytics(
    State(state): State<AppState>,
    user: AuthUser,
    Path(course_id): Path<i64>,
) -> Result<Json<CourseAnalytics>, AppError> {
    let course = courses::fetch_course(&state.db_pool, course_id).await?;
    user.require_manager(course.instructor_id)?;

    let enrollments: Vec<(i64, Option<DateTime<Utc>>)> = sqlx::query_as(
        "SELECT progress, completed_at FROM course_enrollments WHERE course_id = $1",
    )
    .bind(course_id)
    .fetch_all(&state.db_pool)
    .await?;

    let ratings: Vec<i64> = sqlx::query_scalar("SELECT rating FROM course_ratings WHERE course_id = $1")
        .bind(course_id)
        .fetch_all(&state.db_pool)
        .await?;

    let submissions: Vec<SubmissionRow> = sqlx::query_as(
        "SELECT s.submitted_at, s.graded_at, s.grade, a.max_points
         FROM assignment_submissions s JOIN assignments a ON a.id = s.assignment_id
         WHERE a.course_id = $1",
    )
    .bind(course_id)
    .fetch_all(&state.db_pool)
    .await?;

    Ok(Json(stats::course_analytics(
        course_id,
        &enrollments,
        &ratings,
        &to_facts(submissions),
    )))
}
