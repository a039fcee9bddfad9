//! Pure classification of assignment state relative to the current time.

use chrono::{DateTime, Duration, Utc};

use crate::{AssignmentStatus, DueWindow, SubmissionDto};

/// Derives the display status of an assignment for one student.
///
/// Grading wins over submission, submission wins over the due date, and a
/// started but unsubmitted assignment past its due date is overdue.
pub fn derive_status(
    due_date: Option<DateTime<Utc>>,
    started_at: Option<DateTime<Utc>>,
    submitted_at: Option<DateTime<Utc>>,
    graded_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> AssignmentStatus {
    if graded_at.is_some() {
        AssignmentStatus::Graded
    } else if submitted_at.is_some() {
        AssignmentStatus::Completed
    } else if due_date.is_some_and(|due| due < now) {
        AssignmentStatus::Overdue
    } else if started_at.is_some() {
        AssignmentStatus::InProgress
    } else {
        AssignmentStatus::NotStarted
    }
}

/// Convenience wrapper over [`derive_status`] for an optional submission row.
pub fn status_for(
    due_date: Option<DateTime<Utc>>,
    submission: Option<&SubmissionDto>,
    now: DateTime<Utc>,
) -> AssignmentStatus {
    match submission {
        Some(s) => derive_status(due_date, s.started_at, s.submitted_at, s.graded_at, now),
        None => derive_status(due_date, None, None, None, now),
    }
}

/// Buckets a due date relative to `now`. `None` when there is no due date.
pub fn due_window(due_date: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<DueWindow> {
    let due = due_date?;
    let window = if due < now {
        DueWindow::Overdue
    } else if due.date_naive() == now.date_naive() {
        DueWindow::DueToday
    } else if due - now <= Duration::days(7) {
        DueWindow::DueThisWeek
    } else {
        DueWindow::Upcoming
    };
    Some(window)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn untouched_assignment_is_not_started() {
        let now = at(10, 12);
        assert_eq!(
            derive_status(Some(at(12, 0)), None, None, None, now),
            AssignmentStatus::NotStarted
        );
        assert_eq!(derive_status(None, None, None, None, now), AssignmentStatus::NotStarted);
    }

    #[test]
    fn started_before_due_is_in_progress() {
        let now = at(10, 12);
        assert_eq!(
            derive_status(Some(at(12, 0)), Some(at(9, 8)), None, None, now),
            AssignmentStatus::InProgress
        );
    }

    #[test]
    fn past_due_without_submission_is_overdue() {
        let now = at(10, 12);
        assert_eq!(
            derive_status(Some(at(10, 11)), None, None, None, now),
            AssignmentStatus::Overdue
        );
        assert_eq!(
            derive_status(Some(at(9, 0)), Some(at(8, 0)), None, None, now),
            AssignmentStatus::Overdue
        );
    }

    #[test]
    fn submission_and_grade_take_precedence_over_due_date() {
        let now = at(20, 0);
        let due = Some(at(10, 0));
        assert_eq!(
            derive_status(due, None, Some(at(9, 0)), None, now),
            AssignmentStatus::Completed
        );
        assert_eq!(
            derive_status(due, Some(at(8, 0)), Some(at(9, 0)), Some(at(11, 0)), now),
            AssignmentStatus::Graded
        );
    }

    #[test]
    fn status_for_missing_submission() {
        let now = at(10, 12);
        assert_eq!(status_for(Some(at(1, 0)), None, now), AssignmentStatus::Overdue);
    }

    #[test]
    fn due_window_buckets() {
        let now = at(10, 12);
        assert_eq!(due_window(None, now), None);
        assert_eq!(due_window(Some(at(10, 8)), now), Some(DueWindow::Overdue));
        assert_eq!(due_window(Some(at(10, 23)), now), Some(DueWindow::DueToday));
        assert_eq!(due_window(Some(at(11, 1)), now), Some(DueWindow::DueThisWeek));
        assert_eq!(due_window(Some(at(17, 12)), now), Some(DueWindow::DueThisWeek));
        assert_eq!(due_window(Some(at(17, 13)), now), Some(DueWindow::Upcoming));
    }
}
