use axum::{extract::State, Json};
use chrono::Utc;
use common::{AchievementDto, AchievementKind};

use crate::db::DbPool;
use crate::error::AppError;
use crate::extractors::AuthUser;
use crate::web_server::AppState;

const WEEK_STREAK_DAYS: i64 = 7;
const MARATHON_MINUTES: i64 = 600;

/// Totals the achievement rules are evaluated against.
#[derive(Debug, Clone, Default)]
pub struct AchievementFacts {
    pub enrollments: i64,
    pub lessons_completed: i64,
    pub courses_completed: i64,
    pub assignments_submitted: i64,
    pub perfect_scores: i64,
    pub current_streak: i64,
    pub total_study_minutes: i64,
}

/// Every achievement the facts qualify for, already-earned ones included.
pub fn earned(facts: &AchievementFacts) -> Vec<AchievementKind> {
    AchievementKind::ALL
        .iter()
        .copied()
        .filter(|kind| match kind {
            AchievementKind::FirstEnrollment => facts.enrollments > 0,
            AchievementKind::FirstLesson => facts.lessons_completed > 0,
            AchievementKind::CourseCompleted => facts.courses_completed > 0,
            AchievementKind::FirstSubmission => facts.assignments_submitted > 0,
            AchievementKind::PerfectScore => facts.perfect_scores > 0,
            AchievementKind::WeekStreak => facts.current_streak >= WEEK_STREAK_DAYS,
            AchievementKind::StudyMarathon => facts.total_study_minutes >= MARATHON_MINUTES,
        })
        .collect()
}

/// Records achievements; each kind is stored at most once per user.
pub async fn award(
    db_pool: &DbPool,
    user_id: i64,
    kinds: &[AchievementKind],
) -> Result<(), AppError> {
    for kind in kinds {
        let result = sqlx::query(
            "INSERT INTO achievements (user_id, kind, title, description, earned_at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (user_id, kind) DO NOTHING",
        )
        .bind(user_id)
        .bind(kind.as_str())
        .bind(kind.title())
        .bind(kind.description())
        .bind(Utc::now())
        .execute(db_pool)
        .await?;

        if result.rows_affected() > 0 {
            tracing::info!("User {} earned achievement {}", user_id, kind);
        }
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/achievements",
    tag = "progress",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "The caller's achievements", body = Vec<AchievementDto>),
    )
)]
pub async fn list_achievements(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<AchievementDto>>, AppError> {
    let achievements = sqlx::query_as::<_, AchievementDto>(
        "SELECT id, user_id, kind, title, description, earned_at
         FROM achievements WHERE user_id = $1 ORDER BY id",
    )
    .bind(user.id)
    .fetch_all(&state.db_pool)
    .await?;

    Ok(Json(achievements))
}
