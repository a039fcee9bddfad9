use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(not(target_arch = "wasm32"))]
use sqlx::FromRow;
#[cfg(feature = "ts_export")]
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

text_enum!(
    CourseLevel, "course level" {
        Beginner => "beginner",
        Intermediate => "intermediate",
        Advanced => "advanced",
    }
);

#[cfg_attr(not(target_arch = "wasm32"), derive(FromRow))]
#[derive(Serialize, Deserialize, ToSchema, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "ts_export", derive(TS), ts(export))]
pub struct CourseDto {
    pub id: i64,
    pub instructor_id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    #[cfg_attr(not(target_arch = "wasm32"), sqlx(try_from = "String"))]
    pub level: CourseLevel,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating a course, and for replacing one on update.
#[derive(Serialize, Deserialize, ToSchema, Validate, Clone, Debug)]
#[cfg_attr(feature = "ts_export", derive(TS), ts(export))]
pub struct NewCourse {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,
    #[validate(length(max = 5000))]
    #[serde(default)]
    pub description: String,
    #[validate(length(min = 1, max = 100, message = "Category is required"))]
    pub category: String,
    pub level: CourseLevel,
    #[serde(default)]
    pub published: bool,
}

/// Catalog row: a course plus the counts shown on its card.
#[cfg_attr(not(target_arch = "wasm32"), derive(FromRow))]
#[derive(Serialize, Deserialize, ToSchema, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "ts_export", derive(TS), ts(export))]
pub struct CourseSummary {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    #[cfg_attr(not(target_arch = "wasm32"), sqlx(try_from = "String"))]
    pub level: CourseLevel,
    pub instructor_id: i64,
    pub instructor_name: String,
    pub lesson_count: i64,
    pub enrollment_count: i64,
    pub average_rating: Option<f64>,
    pub rating_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, ToSchema, Clone, Debug)]
#[cfg_attr(feature = "ts_export", derive(TS), ts(export))]
pub struct CourseDetail {
    pub course: CourseDto,
    pub instructor_name: String,
    pub lessons: Vec<LessonDto>,
    pub enrollment_count: i64,
    pub average_rating: Option<f64>,
    pub rating_count: i64,
}

/// Catalog filters. All are optional and combine with AND.
#[derive(Serialize, Deserialize, IntoParams, Default, Clone, Debug)]
#[into_params(parameter_in = Query)]
pub struct CourseQuery {
    /// Case-insensitive substring match on the title.
    pub search: Option<String>,
    pub category: Option<String>,
    pub level: Option<CourseLevel>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[cfg_attr(not(target_arch = "wasm32"), derive(FromRow))]
#[derive(Serialize, Deserialize, ToSchema, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "ts_export", derive(TS), ts(export))]
pub struct LessonDto {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub content: String,
    pub position: i64,
    pub duration_minutes: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, ToSchema, Validate, Clone, Debug)]
#[cfg_attr(feature = "ts_export", derive(TS), ts(export))]
pub struct NewLesson {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,
    #[validate(length(max = 100000))]
    #[serde(default)]
    pub content: String,
    /// Appended after the last lesson when omitted.
    pub position: Option<i64>,
    #[validate(range(min = 0, max = 1440))]
    #[serde(default)]
    pub duration_minutes: i64,
}

#[cfg_attr(not(target_arch = "wasm32"), derive(FromRow))]
#[derive(Serialize, Deserialize, ToSchema, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "ts_export", derive(TS), ts(export))]
pub struct EnrollmentDto {
    pub id: i64,
    pub user_id: i64,
    pub course_id: i64,
    pub course_title: String,
    /// Whole percent of the course's lessons completed.
    pub progress: i64,
    pub enrolled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub certificate_code: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema, Validate, Clone, Debug)]
#[cfg_attr(feature = "ts_export", derive(TS), ts(export))]
pub struct RatingRequest {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i64,
    #[validate(length(max = 2000))]
    pub review: Option<String>,
}

#[cfg_attr(not(target_arch = "wasm32"), derive(FromRow))]
#[derive(Serialize, Deserialize, ToSchema, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "ts_export", derive(TS), ts(export))]
pub struct RatingDto {
    pub id: i64,
    pub user_id: i64,
    pub course_id: i64,
    pub rating: i64,
    pub review: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg_attr(not(target_arch = "wasm32"), derive(FromRow))]
#[derive(Serialize, Deserialize, ToSchema, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "ts_export", derive(TS), ts(export))]
pub struct PostDto {
    pub id: i64,
    pub course_id: i64,
    pub author_id: i64,
    pub author_name: String,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, ToSchema, Validate, Clone, Debug)]
#[cfg_attr(feature = "ts_export", derive(TS), ts(export))]
pub struct NewPost {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 10000, message = "Body must not be empty"))]
    pub body: String,
}

#[derive(Serialize, Deserialize, ToSchema, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "ts_export", derive(TS), ts(export))]
pub struct CourseAnalytics {
    pub course_id: i64,
    pub enrollment_count: i64,
    pub completed_count: i64,
    /// Percent of enrollments that reached 100% progress.
    pub completion_rate: f64,
    pub average_progress: f64,
    pub average_rating: f64,
    pub rating_count: i64,
    pub submission_count: i64,
    pub graded_count: i64,
    pub average_grade_percent: f64,
}
