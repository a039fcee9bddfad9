use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use common::{NewStudySession, StudySessionDto};
use validator::Validate;

use crate::error::AppError;
use crate::extractors::AuthUser;
use crate::web_server::AppState;
use crate::{courses, progress};

#[utoipa::path(
    get,
    path = "/api/study-sessions",
    tag = "progress",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "The caller's study sessions, newest first", body = Vec<StudySessionDto>),
    )
)]
pub async fn list_study_sessions(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<StudySessionDto>>, AppError> {
    let sessions = sqlx::query_as::<_, StudySessionDto>(
        "SELECT id, user_id, course_id, started_at, duration_minutes, notes
         FROM study_sessions WHERE user_id = $1 ORDER BY started_at DESC, id DESC",
    )
    .bind(user.id)
    .fetch_all(&state.db_pool)
    .await?;

    Ok(Json(sessions))
}

/// ## Log a study session
#[utoipa::path(
    post,
    path = "/api/study-sessions",
    tag = "progress",
    request_body = NewStudySession,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Session recorded", body = StudySessionDto),
        (status = 400, description = "Invalid duration"),
        (status = 404, description = "Course not found"),
    )
)]
pub async fn create_study_session(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<NewStudySession>,
) -> Result<(StatusCode, Json<StudySessionDto>), AppError> {
    payload.validate()?;

    if let Some(course_id) = payload.course_id {
        courses::fetch_course(&state.db_pool, course_id).await?;
    }
    let started_at = payload.started_at.unwrap_or_else(Utc::now);
    tracing::debug!("User {} logged {} minutes", user.id, payload.duration_minutes);

    let session = sqlx::query_as::<_, StudySessionDto>(
        "INSERT INTO study_sessions (user_id, course_id, started_at, duration_minutes, notes)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING id, user_id, course_id, started_at, duration_minutes, notes",
    )
    .bind(user.id)
    .bind(payload.course_id)
    .bind(started_at)
    .bind(payload.duration_minutes)
    .bind(&payload.notes)
    .fetch_one(&state.db_pool)
    .await?;

    progress::refresh(&state.db_pool, user.id).await?;

    Ok((StatusCode::CREATED, Json(session)))
}
