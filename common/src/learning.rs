use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(not(target_arch = "wasm32"))]
use sqlx::FromRow;
#[cfg(feature = "ts_export")]
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

// --- Study sessions ---

#[cfg_attr(not(target_arch = "wasm32"), derive(FromRow))]
#[derive(Serialize, Deserialize, ToSchema, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "ts_export", derive(TS), ts(export))]
pub struct StudySessionDto {
    pub id: i64,
    pub user_id: i64,
    pub course_id: Option<i64>,
    pub started_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub notes: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema, Validate, Clone, Debug)]
#[cfg_attr(feature = "ts_export", derive(TS), ts(export))]
pub struct NewStudySession {
    pub course_id: Option<i64>,
    /// Defaults to the time the request is received.
    pub started_at: Option<DateTime<Utc>>,
    #[validate(range(min = 1, max = 1440, message = "Duration must be between 1 and 1440 minutes"))]
    pub duration_minutes: i64,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

// --- Quizzes ---

#[cfg_attr(not(target_arch = "wasm32"), derive(FromRow))]
#[derive(Serialize, Deserialize, ToSchema, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "ts_export", derive(TS), ts(export))]
pub struct QuizSubmissionDto {
    pub id: i64,
    pub user_id: i64,
    pub lesson_id: i64,
    pub score: i64,
    pub max_score: i64,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, ToSchema, Validate, Clone, Debug)]
#[cfg_attr(feature = "ts_export", derive(TS), ts(export))]
#[validate(schema(function = "validate_quiz_score"))]
pub struct NewQuizSubmission {
    pub lesson_id: i64,
    #[validate(range(min = 0))]
    pub score: i64,
    #[validate(range(min = 1, max = 10000))]
    pub max_score: i64,
}

fn validate_quiz_score(quiz: &NewQuizSubmission) -> Result<(), ValidationError> {
    if quiz.score > quiz.max_score {
        let mut error = ValidationError::new("score_exceeds_max");
        error.message = Some("Score cannot exceed the maximum score".into());
        return Err(error);
    }
    Ok(())
}

// --- Achievements ---

text_enum!(
    AchievementKind, "achievement kind" {
        FirstEnrollment => "first_enrollment",
        FirstLesson => "first_lesson",
        CourseCompleted => "course_completed",
        FirstSubmission => "first_submission",
        PerfectScore => "perfect_score",
        WeekStreak => "week_streak",
        StudyMarathon => "study_marathon",
    }
);

impl AchievementKind {
    pub fn title(&self) -> &'static str {
        match self {
            AchievementKind::FirstEnrollment => "First Steps",
            AchievementKind::FirstLesson => "Lesson Learned",
            AchievementKind::CourseCompleted => "Graduate",
            AchievementKind::FirstSubmission => "Hand It In",
            AchievementKind::PerfectScore => "Perfectionist",
            AchievementKind::WeekStreak => "On a Roll",
            AchievementKind::StudyMarathon => "Marathon",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AchievementKind::FirstEnrollment => "Enrolled in your first course",
            AchievementKind::FirstLesson => "Completed your first lesson",
            AchievementKind::CourseCompleted => "Completed every lesson of a course",
            AchievementKind::FirstSubmission => "Submitted your first assignment",
            AchievementKind::PerfectScore => "Received full marks on an assignment",
            AchievementKind::WeekStreak => "Studied seven days in a row",
            AchievementKind::StudyMarathon => "Logged ten hours of study",
        }
    }
}

#[cfg_attr(not(target_arch = "wasm32"), derive(FromRow))]
#[derive(Serialize, Deserialize, ToSchema, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "ts_export", derive(TS), ts(export))]
pub struct AchievementDto {
    pub id: i64,
    pub user_id: i64,
    #[cfg_attr(not(target_arch = "wasm32"), sqlx(try_from = "String"))]
    pub kind: AchievementKind,
    pub title: String,
    pub description: String,
    pub earned_at: DateTime<Utc>,
}

// --- Progress and analytics ---

/// Denormalized per-user rollup, rewritten after every learning action.
#[cfg_attr(not(target_arch = "wasm32"), derive(FromRow))]
#[derive(Serialize, Deserialize, ToSchema, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "ts_export", derive(TS), ts(export))]
pub struct ProgressSummaryDto {
    pub user_id: i64,
    pub total_study_minutes: i64,
    pub lessons_completed: i64,
    pub courses_completed: i64,
    pub assignments_submitted: i64,
    pub average_grade: Option<f64>,
    pub current_streak: i64,
    pub longest_streak: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, IntoParams, Default, Clone, Debug)]
#[into_params(parameter_in = Query)]
pub struct AnalyticsQuery {
    /// Window length in days, 1..=365. Defaults to 30.
    pub days: Option<u32>,
}

#[derive(Serialize, Deserialize, ToSchema, Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "ts_export", derive(TS), ts(export))]
pub struct UserAnalytics {
    pub window_days: i64,
    pub study_sessions: i64,
    pub study_minutes: i64,
    pub average_session_minutes: f64,
    pub lessons_completed: i64,
    pub quizzes_taken: i64,
    pub average_quiz_percent: f64,
    pub courses_enrolled: i64,
    pub courses_completed: i64,
    pub assignments_submitted: i64,
    pub assignments_graded: i64,
    pub average_grade_percent: f64,
    pub current_streak: i64,
    pub longest_streak: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiz_score_cannot_exceed_max() {
        let quiz = NewQuizSubmission {
            lesson_id: 1,
            score: 11,
            max_score: 10,
        };
        assert!(quiz.validate().is_err());

        let quiz = NewQuizSubmission {
            lesson_id: 1,
            score: 10,
            max_score: 10,
        };
        assert!(quiz.validate().is_ok());
    }

    #[test]
    fn every_achievement_has_copy() {
        for kind in AchievementKind::ALL {
            assert!(!kind.title().is_empty());
            assert!(!kind.description().is_empty());
        }
    }
}
