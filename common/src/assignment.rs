use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(not(target_arch = "wasm32"))]
use sqlx::FromRow;
#[cfg(feature = "ts_export")]
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

text_enum!(
    /// Display status of a student's assignment, derived on read.
    AssignmentStatus, "assignment status" {
        NotStarted => "not_started",
        InProgress => "in_progress",
        Completed => "completed",
        Graded => "graded",
        Overdue => "overdue",
    }
);

text_enum!(
    /// How close the due date of pending work is.
    DueWindow, "due window" {
        Overdue => "overdue",
        DueToday => "due_today",
        DueThisWeek => "due_this_week",
        Upcoming => "upcoming",
    }
);

#[cfg_attr(not(target_arch = "wasm32"), derive(FromRow))]
#[derive(Serialize, Deserialize, ToSchema, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "ts_export", derive(TS), ts(export))]
pub struct AssignmentDto {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub description: String,
    pub due_date: Option<DateTime<Utc>>,
    pub max_points: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, ToSchema, Validate, Clone, Debug)]
#[cfg_attr(feature = "ts_export", derive(TS), ts(export))]
pub struct NewAssignment {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,
    #[validate(length(max = 10000))]
    #[serde(default)]
    pub description: String,
    pub due_date: Option<DateTime<Utc>>,
    #[validate(range(min = 1, max = 1000, message = "Max points must be between 1 and 1000"))]
    pub max_points: i64,
}

/// A student's instance of an assignment ("given assignment").
#[cfg_attr(not(target_arch = "wasm32"), derive(FromRow))]
#[derive(Serialize, Deserialize, ToSchema, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "ts_export", derive(TS), ts(export))]
pub struct SubmissionDto {
    pub id: i64,
    pub assignment_id: i64,
    pub user_id: i64,
    pub content: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub graded_at: Option<DateTime<Utc>>,
    pub grade: Option<i64>,
    pub feedback: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema, Validate, Clone, Debug)]
#[cfg_attr(feature = "ts_export", derive(TS), ts(export))]
pub struct SubmitAssignment {
    pub assignment_id: i64,
    #[validate(length(min = 1, max = 50000, message = "Submission content must not be empty"))]
    pub content: String,
}

#[derive(Serialize, Deserialize, ToSchema, Validate, Clone, Debug)]
#[cfg_attr(feature = "ts_export", derive(TS), ts(export))]
pub struct GradeSubmission {
    #[validate(range(min = 0, message = "Grade must not be negative"))]
    pub grade: i64,
    #[validate(length(max = 5000))]
    pub feedback: Option<String>,
}

/// One row of a student's assignment board.
#[derive(Serialize, Deserialize, ToSchema, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "ts_export", derive(TS), ts(export))]
pub struct AssignmentView {
    pub assignment: AssignmentDto,
    pub course_title: String,
    pub submission: Option<SubmissionDto>,
    pub status: AssignmentStatus,
    pub due_window: Option<DueWindow>,
}

#[derive(Serialize, Deserialize, IntoParams, Default, Clone, Debug)]
#[into_params(parameter_in = Query)]
pub struct AssignmentQuery {
    pub status: Option<AssignmentStatus>,
}
