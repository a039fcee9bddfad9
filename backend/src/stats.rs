//! Aggregation arithmetic over already-fetched rows.
//!
//! Everything here is pure so handlers stay thin and the numbers are the same
//! on every database backend.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use common::{CourseAnalytics, UserAnalytics};

pub const DEFAULT_WINDOW_DAYS: u32 = 30;
pub const MAX_WINDOW_DAYS: u32 = 365;

/// Clamps a requested analytics window to 1..=365 days.
pub fn clamp_window(days: Option<u32>) -> u32 {
    days.unwrap_or(DEFAULT_WINDOW_DAYS).clamp(1, MAX_WINDOW_DAYS)
}

/// Arithmetic mean, `0.0` for no values.
pub fn mean<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// `part / whole` as a percentage, `0.0` when `whole` is zero.
pub fn percent(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

/// Whole percent of lessons completed, rounded down and capped at 100.
pub fn progress_percent(completed: i64, total: i64) -> i64 {
    if total <= 0 {
        return 0;
    }
    (completed.max(0) * 100 / total).min(100)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Streaks {
    pub current: i64,
    pub longest: i64,
}

/// Computes study streaks from the days on which any session happened.
///
/// The current streak is the run of consecutive days ending today, or ending
/// yesterday if nothing has been logged today yet.
pub fn streaks<I: IntoIterator<Item = NaiveDate>>(days: I, today: NaiveDate) -> Streaks {
    let days: BTreeSet<NaiveDate> = days.into_iter().filter(|d| *d <= today).collect();

    let mut longest = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;
    for day in &days {
        run = match previous {
            Some(prev) if *day - prev == Duration::days(1) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(*day);
    }

    let anchor = if days.contains(&today) {
        Some(today)
    } else {
        today.pred_opt().filter(|yesterday| days.contains(yesterday))
    };

    let mut current = 0;
    let mut cursor = anchor;
    while let Some(day) = cursor {
        if !days.contains(&day) {
            break;
        }
        current += 1;
        cursor = day.pred_opt();
    }

    Streaks { current, longest }
}

/// Raw rows a user's analytics are computed from.
#[derive(Debug, Clone, Default)]
pub struct Activity {
    /// `(started_at, duration_minutes)` for every study session.
    pub sessions: Vec<(DateTime<Utc>, i64)>,
    pub lesson_completions: Vec<DateTime<Utc>>,
    /// `(score, max_score, submitted_at)`.
    pub quizzes: Vec<(i64, i64, DateTime<Utc>)>,
    /// `completed_at` for every enrollment.
    pub enrollments: Vec<Option<DateTime<Utc>>>,
    pub submissions: Vec<SubmissionFacts>,
}

#[derive(Debug, Clone, Default)]
pub struct SubmissionFacts {
    pub submitted_at: Option<DateTime<Utc>>,
    pub graded_at: Option<DateTime<Utc>>,
    pub grade: Option<i64>,
    pub max_points: i64,
}

/// Aggregates a user's activity over `[now - days, now]`. Enrollment counts
/// and streaks are all-time.
pub fn user_analytics(activity: &Activity, now: DateTime<Utc>, days: u32) -> UserAnalytics {
    let since = now - Duration::days(days as i64);
    let in_window = |at: DateTime<Utc>| at >= since && at <= now;

    let window_sessions: Vec<i64> = activity
        .sessions
        .iter()
        .filter(|(at, _)| in_window(*at))
        .map(|(_, minutes)| *minutes)
        .collect();
    let study_minutes: i64 = window_sessions.iter().sum();

    let window_quizzes: Vec<f64> = activity
        .quizzes
        .iter()
        .filter(|(_, _, at)| in_window(*at))
        .map(|(score, max, _)| percent(*score, *max))
        .collect();

    let submitted = activity
        .submissions
        .iter()
        .filter(|s| s.submitted_at.is_some_and(in_window))
        .count() as i64;
    let graded_percents: Vec<f64> = activity
        .submissions
        .iter()
        .filter(|s| s.graded_at.is_some_and(in_window))
        .filter_map(|s| s.grade.map(|grade| percent(grade, s.max_points)))
        .collect();

    let streaks = streaks(
        activity.sessions.iter().map(|(at, _)| at.date_naive()),
        now.date_naive(),
    );

    UserAnalytics {
        window_days: days as i64,
        study_sessions: window_sessions.len() as i64,
        study_minutes,
        average_session_minutes: round2(mean(window_sessions.iter().map(|m| *m as f64))),
        lessons_completed: activity
            .lesson_completions
            .iter()
            .filter(|at| in_window(**at))
            .count() as i64,
        quizzes_taken: window_quizzes.len() as i64,
        average_quiz_percent: round2(mean(window_quizzes)),
        courses_enrolled: activity.enrollments.len() as i64,
        courses_completed: activity.enrollments.iter().filter(|c| c.is_some()).count() as i64,
        assignments_submitted: submitted,
        assignments_graded: graded_percents.len() as i64,
        average_grade_percent: round2(mean(graded_percents)),
        current_streak: streaks.current,
        longest_streak: streaks.longest,
    }
}

/// Aggregates per-course numbers for the instructor view.
///
/// `enrollments` is `(progress, completed_at)`, `submissions` uses the same
/// facts as the per-user view.
pub fn course_analytics(
    course_id: i64,
    enrollments: &[(i64, Option<DateTime<Utc>>)],
    ratings: &[i64],
    submissions: &[SubmissionFacts],
) -> CourseAnalytics {
    let enrollment_count = enrollments.len() as i64;
    let completed_count = enrollments.iter().filter(|(_, done)| done.is_some()).count() as i64;
    let graded: Vec<f64> = submissions
        .iter()
        .filter(|s| s.graded_at.is_some())
        .filter_map(|s| s.grade.map(|grade| percent(grade, s.max_points)))
        .collect();

    CourseAnalytics {
        course_id,
        enrollment_count,
        completed_count,
        completion_rate: round2(percent(completed_count, enrollment_count)),
        average_progress: round2(mean(enrollments.iter().map(|(p, _)| *p as f64))),
        average_rating: round2(mean(ratings.iter().map(|r| *r as f64))),
        rating_count: ratings.len() as i64,
        submission_count: submissions.iter().filter(|s| s.submitted_at.is_some()).count() as i64,
        graded_count: graded.len() as i64,
        average_grade_percent: round2(mean(graded)),
    }
}
