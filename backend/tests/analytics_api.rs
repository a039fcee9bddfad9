use chrono::{Duration, Utc};
use common::{
    AchievementDto, AchievementKind, QuizSubmissionDto, Role, StudySessionDto, UserAnalytics,
};
use reqwest::StatusCode;
use serde_json::json;

mod helpers;

async fn analytics(
    addr: &std::net::SocketAddr,
    client: &reqwest::Client,
    token: &str,
    query: &str,
) -> UserAnalytics {
    let response = client
        .get(format!("http://{addr}/api/analytics{query}"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    response.json().await.unwrap()
}

#[tokio::test]
async fn test_new_user_gets_zero_aggregates() {
    let (addr, client, _db_pool) = helpers::spawn_app().await;
    let student = helpers::sign_up(&addr, &client, "student@example.com", Role::Student).await;

    let result = analytics(&addr, &client, &student, "").await;
    assert_eq!(
        result,
        UserAnalytics {
            window_days: 30,
            ..UserAnalytics::default()
        }
    );
}

#[tokio::test]
async fn test_window_is_clamped() {
    let (addr, client, _db_pool) = helpers::spawn_app().await;
    let student = helpers::sign_up(&addr, &client, "student@example.com", Role::Student).await;

    assert_eq!(analytics(&addr, &client, &student, "?days=0").await.window_days, 1);
    assert_eq!(analytics(&addr, &client, &student, "?days=7").await.window_days, 7);
    assert_eq!(analytics(&addr, &client, &student, "?days=5000").await.window_days, 365);
}

#[tokio::test]
async fn test_study_sessions_feed_windows_and_streaks() {
    let (addr, client, _db_pool) = helpers::spawn_app().await;
    let student = helpers::sign_up(&addr, &client, "student@example.com", Role::Student).await;
    let sessions_url = format!("http://{addr}/api/study-sessions");
    let now = Utc::now();

    let response = client
        .post(&sessions_url)
        .bearer_auth(&student)
        .json(&json!({ "duration_minutes": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client
        .post(&sessions_url)
        .bearer_auth(&student)
        .json(&json!({ "course_id": 9999, "duration_minutes": 30 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Today, yesterday, the day before, and one session long ago
    let logged = [
        (now, 30),
        (now - Duration::days(1), 60),
        (now - Duration::days(2), 90),
        (now - Duration::days(60), 120),
    ];
    for (started_at, minutes) in logged {
        let response = client
            .post(&sessions_url)
            .bearer_auth(&student)
            .json(&json!({ "started_at": started_at, "duration_minutes": minutes, "notes": "reading" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = client.get(&sessions_url).bearer_auth(&student).send().await.unwrap();
    let sessions: Vec<StudySessionDto> = response.json().await.unwrap();
    assert_eq!(sessions.len(), 4);
    assert_eq!(sessions[0].duration_minutes, 30, "Newest session first");

    let month = analytics(&addr, &client, &student, "").await;
    assert_eq!(month.study_sessions, 3);
    assert_eq!(month.study_minutes, 180);
    assert_eq!(month.average_session_minutes, 60.0);
    assert_eq!(month.current_streak, 3);
    assert_eq!(month.longest_streak, 3);

    let quarter = analytics(&addr, &client, &student, "?days=90").await;
    assert_eq!(quarter.study_sessions, 4);
    assert_eq!(quarter.study_minutes, 300);
    assert_eq!(quarter.current_streak, 3);
}

#[tokio::test]
async fn test_long_study_earns_marathon() {
    let (addr, client, _db_pool) = helpers::spawn_app().await;
    let student = helpers::sign_up(&addr, &client, "student@example.com", Role::Student).await;

    for _ in 0..2 {
        let response = client
            .post(format!("http://{addr}/api/study-sessions"))
            .bearer_auth(&student)
            .json(&json!({ "duration_minutes": 300 }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = client
        .get(format!("http://{addr}/api/achievements"))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap();
    let achievements: Vec<AchievementDto> = response.json().await.unwrap();
    assert_eq!(achievements.len(), 1);
    assert_eq!(achievements[0].kind, AchievementKind::StudyMarathon);
}

#[tokio::test]
async fn test_quiz_results() {
    let (addr, client, _db_pool) = helpers::spawn_app().await;
    let instructor = helpers::sign_up(&addr, &client, "instructor@example.com", Role::Instructor).await;
    let student = helpers::sign_up(&addr, &client, "student@example.com", Role::Student).await;
    let course = helpers::create_course(&addr, &client, &instructor, "Rust", true).await;
    let lesson = helpers::add_lesson(&addr, &client, &instructor, course.id, "Traits").await;
    let quiz_url = format!("http://{addr}/api/quizzes/submissions");

    let response = client
        .post(&quiz_url)
        .bearer_auth(&student)
        .json(&json!({ "lesson_id": lesson.id, "score": 5, "max_score": 10 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    helpers::enroll(&addr, &client, &student, course.id).await;

    let response = client
        .post(&quiz_url)
        .bearer_auth(&student)
        .json(&json!({ "lesson_id": lesson.id, "score": 11, "max_score": 10 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    for score in [5, 10] {
        let response = client
            .post(&quiz_url)
            .bearer_auth(&student)
            .json(&json!({ "lesson_id": lesson.id, "score": score, "max_score": 10 }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = client.get(&quiz_url).bearer_auth(&student).send().await.unwrap();
    let quizzes: Vec<QuizSubmissionDto> = response.json().await.unwrap();
    assert_eq!(quizzes.len(), 2);

    let result = analytics(&addr, &client, &student, "").await;
    assert_eq!(result.quizzes_taken, 2);
    assert_eq!(result.average_quiz_percent, 75.0);
    assert_eq!(result.courses_enrolled, 1);
    assert_eq!(result.courses_completed, 0);
}
