use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use common::ProgressSummaryDto;

use crate::achievements::{self, AchievementFacts};
use crate::db::DbPool;
use crate::error::AppError;
use crate::extractors::AuthUser;
use crate::stats;
use crate::web_server::AppState;

const SUMMARY_COLUMNS: &str = "user_id, total_study_minutes, lessons_completed, courses_completed,
    assignments_submitted, average_grade, current_streak, longest_streak, updated_at";

async fn count(db_pool: &DbPool, sql: &str, user_id: i64) -> Result<i64, AppError> {
    let n: i64 = sqlx::query_scalar(sql)
        .bind(user_id)
        .fetch_one(db_pool)
        .await?;
    Ok(n)
}

/// Rebuilds the user's progress summary from the source tables and awards any
/// achievements that became due. Called after every learning action.
pub async fn refresh(db_pool: &DbPool, user_id: i64) -> Result<ProgressSummaryDto, AppError> {
    let sessions: Vec<(DateTime<Utc>, i64)> = sqlx::query_as(
        "SELECT started_at, duration_minutes FROM study_sessions WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_all(db_pool)
    .await?;

    let grades: Vec<(i64, i64)> = sqlx::query_as(
        "SELECT s.grade, a.max_points FROM assignment_submissions s
         JOIN assignments a ON a.id = s.assignment_id
         WHERE s.user_id = $1 AND s.grade IS NOT NULL",
    )
    .bind(user_id)
    .fetch_all(db_pool)
    .await?;

    let lessons_completed = count(
        db_pool,
        "SELECT COUNT(*) FROM lesson_completions WHERE user_id = $1",
        user_id,
    )
    .await?;
    let enrollments = count(
        db_pool,
        "SELECT COUNT(*) FROM course_enrollments WHERE user_id = $1",
        user_id,
    )
    .await?;
    let courses_completed = count(
        db_pool,
        "SELECT COUNT(*) FROM course_enrollments WHERE user_id = $1 AND completed_at IS NOT NULL",
        user_id,
    )
    .await?;
    let assignments_submitted = count(
        db_pool,
        "SELECT COUNT(*) FROM assignment_submissions WHERE user_id = $1 AND submitted_at IS NOT NULL",
        user_id,
    )
    .await?;

    let total_study_minutes: i64 = sessions.iter().map(|(_, minutes)| minutes).sum();
    let streaks = stats::streaks(
        sessions.iter().map(|(at, _)| at.date_naive()),
        Utc::now().date_naive(),
    );
    let average_grade = (!grades.is_empty()).then(|| {
        stats::round2(stats::mean(
            grades.iter().map(|(grade, max)| stats::percent(*grade, *max)),
        ))
    });
    let perfect_scores = grades.iter().filter(|(grade, max)| grade >= max).count() as i64;

    let summary = sqlx::query_as::<_, ProgressSummaryDto>(&format!(
        "INSERT INTO progress_summaries (user_id, total_study_minutes, lessons_completed, courses_completed,
             assignments_submitted, average_grade, current_streak, longest_streak, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         ON CONFLICT (user_id) DO UPDATE SET
             total_study_minutes = excluded.total_study_minutes,
             lessons_completed = excluded.lessons_completed,
             courses_completed = excluded.courses_completed,
             assignments_submitted = excluded.assignments_submitted,
             average_grade = excluded.average_grade,
             current_streak = excluded.current_streak,
             longest_streak = excluded.longest_streak,
             updated_at = excluded.updated_at
         RETURNING {SUMMARY_COLUMNS}"
    ))
    .bind(user_id)
    .bind(total_study_minutes)
    .bind(lessons_completed)
    .bind(courses_completed)
    .bind(assignments_submitted)
    .bind(average_grade)
    .bind(streaks.current)
    .bind(streaks.longest)
    .bind(Utc::now())
    .fetch_one(db_pool)
    .await?;

    let facts = AchievementFacts {
        enrollments,
        lessons_completed,
        courses_completed,
        assignments_submitted,
        perfect_scores,
        current_streak: streaks.current,
        total_study_minutes,
    };
    achievements::award(db_pool, user_id, &achievements::earned(&facts)).await?;

    Ok(summary)
}

// --- API Handlers ---

/// ## The caller's progress summary
/// Built on first request if no learning action has produced one yet.
#[utoipa::path(
    get,
    path = "/api/progress",
    tag = "progress",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Progress summary", body = ProgressSummaryDto),
    )
)]
pub async fn get_progress(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ProgressSummaryDto>, AppError> {
    let existing = sqlx::query_as::<_, ProgressSummaryDto>(&format!(
        "SELECT {SUMMARY_COLUMNS} FROM progress_summaries WHERE user_id = $1"
    ))
    .bind(user.id)
    .fetch_optional(&state.db_pool)
    .await?;

    let summary = match existing {
        Some(summary) => summary,
        None => refresh(&state.db_pool, user.id).await?,
    };

    Ok(Json(summary))
}
