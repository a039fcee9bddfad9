use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use common::status::{due_window, status_for};
use common::{
    AssignmentDto, AssignmentQuery, AssignmentStatus, AssignmentView, GradeSubmission, NewAssignment,
    SubmissionDto, SubmitAssignment,
};
use validator::Validate;

use crate::db::DbPool;
use crate::error::AppError;
use crate::extractors::AuthUser;
use crate::web_server::AppState;
use crate::{courses, enrollments, progress};

const ASSIGNMENT_COLUMNS: &str = "id, course_id, title, description, due_date, max_points, created_at";
const SUBMISSION_COLUMNS: &str =
    "id, assignment_id, user_id, content, started_at, submitted_at, graded_at, grade, feedback";

#[derive(sqlx::FromRow)]
struct BoardRow {
    #[sqlx(flatten)]
    assignment: AssignmentDto,
    course_title: String,
}

async fn fetch_assignment(db_pool: &DbPool, assignment_id: i64) -> Result<AssignmentDto, AppError> {
    sqlx::query_as::<_, AssignmentDto>(&format!(
        "SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE id = $1"
    ))
    .bind(assignment_id)
    .fetch_optional(db_pool)
    .await?
    .ok_or(AppError::NotFound("Assignment"))
}

/// Joins assignments with the student's submissions and classifies each one.
/// Pending work is ordered by due date, undated work last.
fn build_board(
    rows: Vec<BoardRow>,
    submissions: Vec<SubmissionDto>,
    now: DateTime<Utc>,
    filter: Option<AssignmentStatus>,
) -> Vec<AssignmentView> {
    let mut by_assignment: HashMap<i64, SubmissionDto> = submissions
        .into_iter()
        .map(|s| (s.assignment_id, s))
        .collect();

    let mut board: Vec<AssignmentView> = rows
        .into_iter()
        .map(|row| {
            let submission = by_assignment.remove(&row.assignment.id);
            let status = status_for(row.assignment.due_date, submission.as_ref(), now);
            let pending = matches!(
                status,
                AssignmentStatus::NotStarted | AssignmentStatus::InProgress | AssignmentStatus::Overdue
            );
            AssignmentView {
                due_window: if pending {
                    due_window(row.assignment.due_date, now)
                } else {
                    None
                },
                assignment: row.assignment,
                course_title: row.course_title,
                submission,
                status,
            }
        })
        .filter(|view| filter.is_none_or(|wanted| view.status == wanted))
        .collect();

    board.sort_by_key(|view| (view.assignment.due_date.is_none(), view.assignment.due_date));
    board
}

// --- API Handlers ---

#[utoipa::path(
    get,
    path = "/api/courses/{id}/assignments",
    tag = "assignments",
    params(("id" = i64, Path, description = "Course id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Assignments of the course", body = Vec<AssignmentDto>),
        (status = 403, description = "Not enrolled"),
        (status = 404, description = "Course not found"),
    )
)]
pub async fn list_course_assignments(
    State(state): State<AppState>,
    user: AuthUser,
    Path(course_id): Path<i64>,
) -> Result<Json<Vec<AssignmentDto>>, AppError> {
    courses::fetch_participating_course(&state.db_pool, &user, course_id).await?;

    let assignments = sqlx::query_as::<_, AssignmentDto>(&format!(
        "SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE course_id = $1 ORDER BY id"
    ))
    .bind(course_id)
    .fetch_all(&state.db_pool)
    .await?;

    Ok(Json(assignments))
}

#[utoipa::path(
    post,
    path = "/api/courses/{id}/assignments",
    tag = "assignments",
    request_body = NewAssignment,
    params(("id" = i64, Path, description = "Course id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Assignment created", body = AssignmentDto),
        (status = 403, description = "Not the course owner"),
        (status = 404, description = "Course not found"),
    )
)]
pub async fn create_assignment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(course_id): Path<i64>,
    Json(payload): Json<NewAssignment>,
) -> Result<(StatusCode, Json<AssignmentDto>), AppError> {
    payload.validate()?;

    let course = courses::fetch_course(&state.db_pool, course_id).await?;
    user.require_manager(course.instructor_id)?;
    tracing::info!("Creating assignment '{}' in course {}", payload.title, course_id);

    let assignment = sqlx::query_as::<_, AssignmentDto>(&format!(
        "INSERT INTO assignments (course_id, title, description, due_date, max_points, created_at)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {ASSIGNMENT_COLUMNS}"
    ))
    .bind(course_id)
    .bind(&payload.title)
    .bind(&payload.description)
    .bind(payload.due_date)
    .bind(payload.max_points)
    .bind(Utc::now())
    .fetch_one(&state.db_pool)
    .await?;

    Ok((StatusCode::CREATED, Json(assignment)))
}

/// ## The caller's assignment board
/// Every assignment of every enrolled course with its derived status.
#[utoipa::path(
    get,
    path = "/api/assignments",
    tag = "assignments",
    params(AssignmentQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Assignment board", body = Vec<AssignmentView>),
    )
)]
pub async fn assignment_board(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<AssignmentQuery>,
) -> Result<Json<Vec<AssignmentView>>, AppError> {
    let rows = sqlx::query_as::<_, BoardRow>(
        "SELECT a.id, a.course_id, a.title, a.description, a.due_date, a.max_points, a.created_at,
                c.title AS course_title
         FROM assignments a
         JOIN courses c ON c.id = a.course_id
         JOIN course_enrollments e ON e.course_id = a.course_id
         WHERE e.user_id = $1
         ORDER BY a.id",
    )
    .bind(user.id)
    .fetch_all(&state.db_pool)
    .await?;

    let submissions = sqlx::query_as::<_, SubmissionDto>(&format!(
        "SELECT {SUBMISSION_COLUMNS} FROM assignment_submissions WHERE user_id = $1"
    ))
    .bind(user.id)
    .fetch_all(&state.db_pool)
    .await?;

    Ok(Json(build_board(rows, submissions, Utc::now(), query.status)))
}

/// ## Start working on an assignment
#[utoipa::path(
    post,
    path = "/api/assignments/{id}/start",
    tag = "assignments",
    params(("id" = i64, Path, description = "Assignment id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "The caller's submission", body = SubmissionDto),
        (status = 403, description = "Not enrolled"),
        (status = 404, description = "Assignment not found"),
    )
)]
pub async fn start_assignment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(assignment_id): Path<i64>,
) -> Result<Json<SubmissionDto>, AppError> {
    let assignment = fetch_assignment(&state.db_pool, assignment_id).await?;
    enrollments::require_enrollment(&state.db_pool, user.id, assignment.course_id).await?;

    let submission = sqlx::query_as::<_, SubmissionDto>(&format!(
        "INSERT INTO assignment_submissions (assignment_id, user_id, started_at) VALUES ($1, $2, $3)
         ON CONFLICT (assignment_id, user_id) DO UPDATE SET
             started_at = COALESCE(assignment_submissions.started_at, excluded.started_at)
         RETURNING {SUBMISSION_COLUMNS}"
    ))
    .bind(assignment_id)
    .bind(user.id)
    .bind(Utc::now())
    .fetch_one(&state.db_pool)
    .await?;

    Ok(Json(submission))
}

/// ## Submit an assignment
/// Creates the submission or updates the existing one; graded work is final.
#[utoipa::path(
    post,
    path = "/api/assignments/submit",
    tag = "assignments",
    request_body = SubmitAssignment,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Submission created", body = SubmissionDto),
        (status = 200, description = "Submission updated", body = SubmissionDto),
        (status = 400, description = "Invalid data or already graded"),
        (status = 403, description = "Not enrolled"),
        (status = 404, description = "Assignment not found"),
    )
)]
pub async fn submit_assignment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<SubmitAssignment>,
) -> Result<(StatusCode, Json<SubmissionDto>), AppError> {
    payload.validate()?;

    let assignment = fetch_assignment(&state.db_pool, payload.assignment_id).await?;
    enrollments::require_enrollment(&state.db_pool, user.id, assignment.course_id).await?;

    tracing::info!("User {} submitting assignment {}", user.id, assignment.id);

    let now = Utc::now();
    let created = sqlx::query_as::<_, SubmissionDto>(&format!(
        "INSERT INTO assignment_submissions (assignment_id, user_id, content, started_at, submitted_at)
         VALUES ($1, $2, $3, $4, $5)
         ON CONFLICT (assignment_id, user_id) DO NOTHING
         RETURNING {SUBMISSION_COLUMNS}"
    ))
    .bind(assignment.id)
    .bind(user.id)
    .bind(&payload.content)
    .bind(now)
    .bind(now)
    .fetch_optional(&state.db_pool)
    .await?;

    let (status, submission) = match created {
        Some(submission) => (StatusCode::CREATED, submission),
        None => {
            // Graded rows are final.
            let updated = sqlx::query_as::<_, SubmissionDto>(&format!(
                "UPDATE assignment_submissions SET
                     content = $1,
                     started_at = COALESCE(started_at, $2),
                     submitted_at = $2
                 WHERE assignment_id = $3 AND user_id = $4 AND graded_at IS NULL
                 RETURNING {SUBMISSION_COLUMNS}"
            ))
            .bind(&payload.content)
            .bind(now)
            .bind(assignment.id)
            .bind(user.id)
            .fetch_optional(&state.db_pool)
            .await?
            .ok_or_else(|| {
                AppError::BadRequest("This assignment has already been graded".to_string())
            })?;
            (StatusCode::OK, updated)
        }
    };

    progress::refresh(&state.db_pool, user.id).await?;

    Ok((status, Json(submission)))
}

#[utoipa::path(
    get,
    path = "/api/assignments/{id}/submissions",
    tag = "assignments",
    params(("id" = i64, Path, description = "Assignment id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All submissions", body = Vec<SubmissionDto>),
        (status = 403, description = "Not the course owner"),
        (status = 404, description = "Assignment not found"),
    )
)]
pub async fn list_submissions(
    State(state): State<AppState>,
    user: AuthUser,
    Path(assignment_id): Path<i64>,
) -> Result<Json<Vec<SubmissionDto>>, AppError> {
    let assignment = fetch_assignment(&state.db_pool, assignment_id).await?;
    let course = courses::fetch_course(&state.db_pool, assignment.course_id).await?;
    user.require_manager(course.instructor_id)?;

    let submissions = sqlx::query_as::<_, SubmissionDto>(&format!(
        "SELECT {SUBMISSION_COLUMNS} FROM assignment_submissions WHERE assignment_id = $1 ORDER BY id"
    ))
    .bind(assignment_id)
    .fetch_all(&state.db_pool)
    .await?;

    Ok(Json(submissions))
}

/// ## Grade a submission
#[utoipa::path(
    post,
    path = "/api/submissions/{id}/grade",
    tag = "assignments",
    request_body = GradeSubmission,
    params(("id" = i64, Path, description = "Submission id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Graded submission", body = SubmissionDto),
        (status = 400, description = "Not submitted yet or grade out of range"),
        (status = 403, description = "Not the course owner"),
        (status = 404, description = "Submission not found"),
    )
)]
pub async fn grade_submission(
    State(state): State<AppState>,
    user: AuthUser,
    Path(submission_id): Path<i64>,
    Json(payload): Json<GradeSubmission>,
) -> Result<Json<SubmissionDto>, AppError> {
    payload.validate()?;

    let submission = sqlx::query_as::<_, SubmissionDto>(&format!(
        "SELECT {SUBMISSION_COLUMNS} FROM assignment_submissions WHERE id = $1"
    ))
    .bind(submission_id)
    .fetch_optional(&state.db_pool)
    .await?
    .ok_or(AppError::NotFound("Submission"))?;

    let assignment = fetch_assignment(&state.db_pool, submission.assignment_id).await?;
    let course = courses::fetch_course(&state.db_pool, assignment.course_id).await?;
    user.require_manager(course.instructor_id)?;

    if submission.submitted_at.is_none() {
        return Err(AppError::BadRequest(
            "Cannot grade an assignment that has not been submitted".to_string(),
        ));
    }
    if payload.grade > assignment.max_points {
        return Err(AppError::BadRequest(format!(
            "Grade cannot exceed {} points",
            assignment.max_points
        )));
    }
    tracing::info!("Grading submission {} with {}", submission_id, payload.grade);

    let graded = sqlx::query_as::<_, SubmissionDto>(&format!(
        "UPDATE assignment_submissions SET grade = $1, feedback = $2, graded_at = $3
         WHERE id = $4
         RETURNING {SUBMISSION_COLUMNS}"
    ))
    .bind(payload.grade)
    .bind(&payload.feedback)
    .bind(Utc::now())
    .bind(submission_id)
    .fetch_one(&state.db_pool)
    .await?;

    progress::refresh(&state.db_pool, graded.user_id).await?;

    Ok(Json(graded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use common::DueWindow;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap()
    }

    fn row(id: i64, due: Option<DateTime<Utc>>) -> BoardRow {
        BoardRow {
            assignment: AssignmentDto {
                id,
                course_id: 1,
                title: format!("Assignment {id}"),
                description: String::new(),
                due_date: due,
                max_points: 100,
                created_at: now() - Duration::days(30),
            },
            course_title: "Rust 101".to_string(),
        }
    }

    fn submitted(assignment_id: i64) -> SubmissionDto {
        SubmissionDto {
            id: assignment_id * 10,
            assignment_id,
            user_id: 1,
            content: Some("done".into()),
            started_at: Some(now() - Duration::days(2)),
            submitted_at: Some(now() - Duration::days(1)),
            graded_at: None,
            grade: None,
            feedback: None,
        }
    }

    #[test]
    fn board_classifies_and_orders_by_due_date() {
        let rows = vec![
            row(1, None),
            row(2, Some(now() + Duration::days(3))),
            row(3, Some(now() - Duration::hours(1))),
            row(4, Some(now() + Duration::hours(2))),
        ];
        let board = build_board(rows, vec![submitted(2)], now(), None);

        let ids: Vec<i64> = board.iter().map(|v| v.assignment.id).collect();
        assert_eq!(ids, vec![3, 4, 2, 1]);

        assert_eq!(board[0].status, AssignmentStatus::Overdue);
        assert_eq!(board[0].due_window, Some(DueWindow::Overdue));
        assert_eq!(board[1].status, AssignmentStatus::NotStarted);
        assert_eq!(board[1].due_window, Some(DueWindow::DueToday));
        assert_eq!(board[2].status, AssignmentStatus::Completed);
        assert_eq!(board[2].due_window, None);
        assert_eq!(board[3].due_window, None);
    }

    #[test]
    fn board_filters_by_status() {
        let rows = vec![row(1, None), row(2, None)];
        let board = build_board(rows, vec![submitted(2)], now(), Some(AssignmentStatus::Completed));
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].assignment.id, 2);
    }
}
