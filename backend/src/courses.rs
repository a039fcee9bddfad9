use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use common::{CourseDetail, CourseDto, CourseQuery, CourseSummary, LessonDto, NewCourse, Paginated, Pagination};
use sqlx::QueryBuilder;
use validator::Validate;

use crate::db::{Db, DbPool};
use crate::enrollments;
use crate::error::AppError;
use crate::extractors::AuthUser;
use crate::web_server::AppState;

const COURSE_COLUMNS: &str =
    "id, instructor_id, title, description, category, level, published, created_at, updated_at";

const SUMMARY_SELECT: &str = r#"
    SELECT c.id, c.title, c.description, c.category, c.level, c.instructor_id,
           u.name AS instructor_name,
           (SELECT COUNT(*) FROM lessons l WHERE l.course_id = c.id) AS lesson_count,
           (SELECT COUNT(*) FROM course_enrollments e WHERE e.course_id = c.id) AS enrollment_count,
           (SELECT CAST(AVG(r.rating) AS DOUBLE PRECISION) FROM course_ratings r WHERE r.course_id = c.id) AS average_rating,
           (SELECT COUNT(*) FROM course_ratings r WHERE r.course_id = c.id) AS rating_count,
           c.created_at
    FROM courses c
    JOIN users u ON u.id = c.instructor_id
"#;

// --- Shared lookups ---

pub(crate) async fn fetch_course(db_pool: &DbPool, course_id: i64) -> Result<CourseDto, AppError> {
    sqlx::query_as::<_, CourseDto>(&format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1"))
        .bind(course_id)
        .fetch_optional(db_pool)
        .await?
        .ok_or(AppError::NotFound("Course"))
}

/// Loads a course the caller may participate in: its manager, an admin, or an
/// enrolled student.
pub(crate) async fn fetch_participating_course(
    db_pool: &DbPool,
    user: &AuthUser,
    course_id: i64,
) -> Result<CourseDto, AppError> {
    let course = fetch_course(db_pool, course_id).await?;
    if !user.can_manage(course.instructor_id) {
        enrollments::require_enrollment(db_pool, user.id, course_id).await?;
    }
    Ok(course)
}

pub(crate) async fn fetch_lessons(db_pool: &DbPool, course_id: i64) -> Result<Vec<LessonDto>, AppError> {
    let lessons = sqlx::query_as::<_, LessonDto>(
        "SELECT id, course_id, title, content, position, duration_minutes, created_at
         FROM lessons WHERE course_id = $1 ORDER BY position, id",
    )
    .bind(course_id)
    .fetch_all(db_pool)
    .await?;
    Ok(lessons)
}

fn push_catalog_filters(builder: &mut QueryBuilder<'_, Db>, query: &CourseQuery) {
    builder.push(" WHERE c.published = ").push_bind(true);
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        builder
            .push(" AND LOWER(c.title) LIKE ")
            .push_bind(format!("%{}%", search.to_lowercase()));
    }
    if let Some(category) = query.category.as_deref().filter(|c| !c.is_empty()) {
        builder.push(" AND c.category = ").push_bind(category.to_string());
    }
    if let Some(level) = query.level {
        builder.push(" AND c.level = ").push_bind(level.as_str());
    }
}

// --- API Handlers ---

/// ## Browse the published catalog
#[utoipa::path(
    get,
    path = "/api/courses",
    tag = "courses",
    params(CourseQuery),
    responses(
        (status = 200, description = "A page of published courses", body = Paginated<CourseSummary>),
    )
)]
pub async fn list_courses(
    State(state): State<AppState>,
    Query(query): Query<CourseQuery>,
) -> Result<Json<Paginated<CourseSummary>>, AppError> {
    let page = Pagination::new(query.page, query.per_page);
    tracing::info!("Listing courses: {:?} page {}", query, page.page);

    let mut count = QueryBuilder::<Db>::new("SELECT COUNT(*) FROM courses c");
    push_catalog_filters(&mut count, &query);
    let total = count.build_query_scalar::<i64>().fetch_one(&state.db_pool).await?;

    let mut select = QueryBuilder::<Db>::new(SUMMARY_SELECT);
    push_catalog_filters(&mut select, &query);
    select
        .push(" ORDER BY c.id DESC LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());
    let items = select
        .build_query_as::<CourseSummary>()
        .fetch_all(&state.db_pool)
        .await?;

    Ok(Json(Paginated::new(items, total, page)))
}

/// ## Course detail with its lessons
/// Drafts are visible only to their instructor and admins.
#[utoipa::path(
    get,
    path = "/api/courses/{id}",
    tag = "courses",
    params(("id" = i64, Path, description = "Course id")),
    responses(
        (status = 200, description = "The course", body = CourseDetail),
        (status = 404, description = "Course not found"),
    )
)]
pub async fn get_course(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<CourseDetail>, AppError> {
    tracing::info!("Fetching course with id: {}", id);

    let course = fetch_course(&state.db_pool, id).await?;
    let is_manager = user.is_some_and(|u| u.can_manage(course.instructor_id));
    if !course.published && !is_manager {
        return Err(AppError::NotFound("Course"));
    }

    let instructor_name: String = sqlx::query_scalar("SELECT name FROM users WHERE id = $1")
        .bind(course.instructor_id)
        .fetch_one(&state.db_pool)
        .await?;
    let lessons = fetch_lessons(&state.db_pool, id).await?;
    let enrollment_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM course_enrollments WHERE course_id = $1")
            .bind(id)
            .fetch_one(&state.db_pool)
            .await?;
    let (average_rating, rating_count): (Option<f64>, i64) = sqlx::query_as(
        "SELECT CAST(AVG(rating) AS DOUBLE PRECISION), COUNT(*) FROM course_ratings WHERE course_id = $1",
    )
    .bind(id)
    .fetch_one(&state.db_pool)
    .await?;

    Ok(Json(CourseDetail {
        course,
        instructor_name,
        lessons,
        enrollment_count,
        average_rating,
        rating_count,
    }))
}

/// ## Create a course
#[utoipa::path(
    post,
    path = "/api/courses",
    tag = "courses",
    request_body = NewCourse,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Course created", body = CourseDto),
        (status = 400, description = "Invalid data provided"),
        (status = 403, description = "Only instructors can create courses"),
    )
)]
pub async fn create_course(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<NewCourse>,
) -> Result<(StatusCode, Json<CourseDto>), AppError> {
    user.require_instructor()?;
    payload.validate()?;
    tracing::info!("User {} creating course: {}", user.id, payload.title);

    let now = Utc::now();
    let course = sqlx::query_as::<_, CourseDto>(&format!(
        "INSERT INTO courses (instructor_id, title, description, category, level, published, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING {COURSE_COLUMNS}"
    ))
    .bind(user.id)
    .bind(&payload.title)
    .bind(&payload.description)
    .bind(&payload.category)
    .bind(payload.level.as_str())
    .bind(payload.published)
    .bind(now)
    .bind(now)
    .fetch_one(&state.db_pool)
    .await?;

    Ok((StatusCode::CREATED, Json(course)))
}

#[utoipa::path(
    put,
    path = "/api/courses/{id}",
    tag = "courses",
    request_body = NewCourse,
    params(("id" = i64, Path, description = "Course id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Course updated", body = CourseDto),
        (status = 403, description = "Not the course owner"),
        (status = 404, description = "Course not found"),
    )
)]
pub async fn update_course(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<NewCourse>,
) -> Result<Json<CourseDto>, AppError> {
    payload.validate()?;
    tracing::info!("Updating course with id: {}", id);

    let course = fetch_course(&state.db_pool, id).await?;
    user.require_manager(course.instructor_id)?;

    let updated = sqlx::query_as::<_, CourseDto>(&format!(
        "UPDATE courses
         SET title = $1, description = $2, category = $3, level = $4, published = $5, updated_at = $6
         WHERE id = $7
         RETURNING {COURSE_COLUMNS}"
    ))
    .bind(&payload.title)
    .bind(&payload.description)
    .bind(&payload.category)
    .bind(payload.level.as_str())
    .bind(payload.published)
    .bind(Utc::now())
    .bind(id)
    .fetch_one(&state.db_pool)
    .await?;

    Ok(Json(updated))
}

#[utoipa::path(
    delete,
    path = "/api/courses/{id}",
    tag = "courses",
    params(("id" = i64, Path, description = "Course id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Course deleted"),
        (status = 403, description = "Not the course owner"),
        (status = 404, description = "Course not found"),
    )
)]
pub async fn delete_course(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    tracing::info!("Deleting course with id: {}", id);

    let course = fetch_course(&state.db_pool, id).await?;
    user.require_manager(course.instructor_id)?;

    sqlx::query("DELETE FROM courses WHERE id = $1")
        .bind(id)
        .execute(&state.db_pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// ## Courses authored by the caller, drafts included
#[utoipa::path(
    get,
    path = "/api/instructor/courses",
    tag = "courses",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "The caller's courses", body = Vec<CourseDto>),
        (status = 403, description = "Only instructors author courses"),
    )
)]
pub async fn instructor_courses(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<CourseDto>>, AppError> {
    user.require_instructor()?;

    let courses = sqlx::query_as::<_, CourseDto>(&format!(
        "SELECT {COURSE_COLUMNS} FROM courses WHERE instructor_id = $1 ORDER BY id DESC"
    ))
    .bind(user.id)
    .fetch_all(&state.db_pool)
    .await?;

    Ok(Json(courses))
}
