use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use common::{RatingDto, RatingRequest};
use validator::Validate;

use crate::error::AppError;
use crate::extractors::AuthUser;
use crate::web_server::AppState;
use crate::{courses, enrollments};

/// ## Rate a course
/// One rating per student and course; rating again replaces the previous one.
#[utoipa::path(
    post,
    path = "/api/courses/{id}/rating",
    tag = "courses",
    request_body = RatingRequest,
    params(("id" = i64, Path, description = "Course id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Stored rating", body = RatingDto),
        (status = 400, description = "Rating out of range"),
        (status = 403, description = "Not enrolled"),
        (status = 404, description = "Course not found"),
    )
)]
pub async fn rate_course(
    State(state): State<AppState>,
    user: AuthUser,
    Path(course_id): Path<i64>,
    Json(payload): Json<RatingRequest>,
) -> Result<Json<RatingDto>, AppError> {
    payload.validate()?;

    courses::fetch_course(&state.db_pool, course_id).await?;
    enrollments::require_enrollment(&state.db_pool, user.id, course_id).await?;
    tracing::info!("User {} rating course {}: {}", user.id, course_id, payload.rating);

    let rating = sqlx::query_as::<_, RatingDto>(
        "INSERT INTO course_ratings (user_id, course_id, rating, review, created_at)
         VALUES ($1, $2, $3, $4, $5)
         ON CONFLICT (user_id, course_id) DO UPDATE SET
             rating = excluded.rating,
             review = excluded.review,
             created_at = excluded.created_at
         RETURNING id, user_id, course_id, rating, review, created_at",
    )
    .bind(user.id)
    .bind(course_id)
    .bind(payload.rating)
    .bind(&payload.review)
    .bind(Utc::now())
    .fetch_one(&state.db_pool)
    .await?;

    Ok(Json(rating))
}

#[utoipa::path(
    get,
    path = "/api/courses/{id}/ratings",
    tag = "courses",
    params(("id" = i64, Path, description = "Course id")),
    responses(
        (status = 200, description = "Ratings for a published course", body = Vec<RatingDto>),
        (status = 404, description = "Course not found"),
    )
)]
pub async fn list_ratings(
    State(state): State<AppState>,
    Path(course_id): Path<i64>,
) -> Result<Json<Vec<RatingDto>>, AppError> {
    let course = courses::fetch_course(&state.db_pool, course_id).await?;
    if !course.published {
        return Err(AppError::NotFound("Course"));
    }

    let ratings = sqlx::query_as::<_, RatingDto>(
        "SELECT id, user_id, course_id, rating, review, created_at
         FROM course_ratings WHERE course_id = $1 ORDER BY id DESC",
    )
    .bind(course_id)
    .fetch_all(&state.db_pool)
    .await?;

    Ok(Json(ratings))
}
