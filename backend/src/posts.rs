use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use common::{NewPost, PostDto, Role};
use validator::Validate;

use crate::courses;
use crate::error::AppError;
use crate::extractors::AuthUser;
use crate::web_server::AppState;

const POST_SELECT: &str = "SELECT p.id, p.course_id, p.author_id, u.name AS author_name,
        p.title, p.body, p.created_at
    FROM posts p JOIN users u ON u.id = p.author_id";

#[utoipa::path(
    get,
    path = "/api/courses/{id}/posts",
    tag = "posts",
    params(("id" = i64, Path, description = "Course id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Discussion posts, newest first", body = Vec<PostDto>),
        (status = 403, description = "Not a participant"),
        (status = 404, description = "Course not found"),
    )
)]
pub async fn list_posts(
    State(state): State<AppState>,
    user: AuthUser,
    Path(course_id): Path<i64>,
) -> Result<Json<Vec<PostDto>>, AppError> {
    courses::fetch_participating_course(&state.db_pool, &user, course_id).await?;

    let posts = sqlx::query_as::<_, PostDto>(&format!(
        "{POST_SELECT} WHERE p.course_id = $1 ORDER BY p.created_at DESC, p.id DESC"
    ))
    .bind(course_id)
    .fetch_all(&state.db_pool)
    .await?;

    Ok(Json(posts))
}

#[utoipa::path(
    post,
    path = "/api/courses/{id}/posts",
    tag = "posts",
    request_body = NewPost,
    params(("id" = i64, Path, description = "Course id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Post created", body = PostDto),
        (status = 403, description = "Not a participant"),
        (status = 404, description = "Course not found"),
    )
)]
pub async fn create_post(
    State(state): State<AppState>,
    user: AuthUser,
    Path(course_id): Path<i64>,
    Json(payload): Json<NewPost>,
) -> Result<(StatusCode, Json<PostDto>), AppError> {
    payload.validate()?;
    courses::fetch_participating_course(&state.db_pool, &user, course_id).await?;

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO posts (course_id, author_id, title, body, created_at)
         VALUES ($1, $2, $3, $4, $5) RETURNING id",
    )
    .bind(course_id)
    .bind(user.id)
    .bind(&payload.title)
    .bind(&payload.body)
    .bind(Utc::now())
    .fetch_one(&state.db_pool)
    .await?;

    let post = sqlx::query_as::<_, PostDto>(&format!("{POST_SELECT} WHERE p.id = $1"))
        .bind(id)
        .fetch_one(&state.db_pool)
        .await?;

    Ok((StatusCode::CREATED, Json(post)))
}

/// ## Delete a post
/// Only the author or an admin may delete.
#[utoipa::path(
    delete,
    path = "/api/posts/{id}",
    tag = "posts",
    params(("id" = i64, Path, description = "Post id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Post deleted"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Post not found"),
    )
)]
pub async fn delete_post(
    State(state): State<AppState>,
    user: AuthUser,
    Path(post_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let author_id: i64 = sqlx::query_scalar("SELECT author_id FROM posts WHERE id = $1")
        .bind(post_id)
        .fetch_optional(&state.db_pool)
        .await?
        .ok_or(AppError::NotFound("Post"))?;

    if author_id != user.id && user.role != Role::Admin {
        return Err(AppError::Forbidden(
            "You can only delete your own posts".to_string(),
        ));
    }

    sqlx::query("DELETE FROM posts WHERE id = $1")
        .bind(post_id)
        .execute(&state.db_pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
