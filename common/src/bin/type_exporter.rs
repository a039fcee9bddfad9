use common::*;
use std::fs;
use std::path::Path;
use ts_rs::TS;

fn main() {
    // Collect all exported types
    let exported = [
        Role::export_to_string(),
        RegisterRequest::export_to_string(),
        Credentials::export_to_string(),
        LoginResponse::export_to_string(),
        UserDto::export_to_string(),
        CourseLevel::export_to_string(),
        CourseDto::export_to_string(),
        NewCourse::export_to_string(),
        CourseSummary::export_to_string(),
        CourseDetail::export_to_string(),
        LessonDto::export_to_string(),
        NewLesson::export_to_string(),
        EnrollmentDto::export_to_string(),
        RatingRequest::export_to_string(),
        RatingDto::export_to_string(),
        PostDto::export_to_string(),
        NewPost::export_to_string(),
        CourseAnalytics::export_to_string(),
        AssignmentStatus::export_to_string(),
        DueWindow::export_to_string(),
        AssignmentDto::export_to_string(),
        NewAssignment::export_to_string(),
        SubmissionDto::export_to_string(),
        SubmitAssignment::export_to_string(),
        GradeSubmission::export_to_string(),
        AssignmentView::export_to_string(),
        StudySessionDto::export_to_string(),
        NewStudySession::export_to_string(),
        QuizSubmissionDto::export_to_string(),
        NewQuizSubmission::export_to_string(),
        AchievementKind::export_to_string(),
        AchievementDto::export_to_string(),
        ProgressSummaryDto::export_to_string(),
        UserAnalytics::export_to_string(),
    ];

    let mut all_types = String::new();
    for ts in exported {
        all_types.push_str(&ts.unwrap());
    }
    let cleaned_types = remove_duplicate_comments(&all_types);

    // Define the output path relative to the workspace root
    let out_path = Path::new("frontend/src/lib/types.ts");

    // Create the directory if it doesn't exist
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent).unwrap();
    }

    fs::write(out_path, cleaned_types).unwrap();
    println!("TypeScript definitions generated at: {}", out_path.display());
}

// ts-rs prefixes every export with the same generated-file banner; keep only the first.
fn remove_duplicate_comments(content: &str) -> String {
    let mut result = Vec::new();
    let mut found_first_comment = false;

    for line in content.lines() {
        if line.trim_start().starts_with("//") {
            if !found_first_comment {
                result.push(line);
                found_first_comment = true;
            }
        } else {
            result.push(line);
        }
    }

    result.join("\n") + "\n"
}
