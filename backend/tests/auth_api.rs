use backend::auth::Claims;
use chrono::{Duration, Utc};
use common::{LoginResponse, Role, UserDto};
use jsonwebtoken::{encode, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::json;

mod helpers;
use crate::helpers::{TEST_JWT_SECRET, TEST_PASSWORD};

#[tokio::test]
async fn test_register_login_logout_flow() {
    let (addr, client, _db_pool) = helpers::spawn_app().await;

    let register_url = format!("http://{addr}/api/auth/register");
    let login_url = format!("http://{addr}/api/auth/login");

    let payload = json!({
        "name": "Ada",
        "email": "ada@example.com",
        "password": TEST_PASSWORD,
    });

    // 1. Register; the role defaults to student
    let response = client.post(&register_url).json(&payload).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let user: UserDto = response.json().await.unwrap();
    assert_eq!(user.email, "ada@example.com");
    assert_eq!(user.role, Role::Student);

    // 2. Same email again
    let response = client.post(&register_url).json(&payload).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // 3. Wrong password
    let response = client
        .post(&login_url)
        .json(&json!({ "email": "ada@example.com", "password": "wrongpassword" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // 4. Unknown email gets the same answer
    let response = client
        .post(&login_url)
        .json(&json!({ "email": "nobody@example.com", "password": TEST_PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // 5. Correct login
    let tokens = helpers::login(&addr, &client, "ada@example.com").await;
    assert!(!tokens.access_token.is_empty());
    assert!(!tokens.refresh_token.is_empty());

    let response = client
        .get(format!("http://{addr}/api/auth/me"))
        .bearer_auth(&tokens.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let me: UserDto = response.json().await.unwrap();
    assert_eq!(me.id, user.id);
    assert_eq!(me.name, "Ada");

    // 6. Logout drops the refresh token
    let response = client
        .post(format!("http://{addr}/api/auth/logout"))
        .bearer_auth(&tokens.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = client
        .post(format!("http://{addr}/api/auth/refresh"))
        .json(&json!({ "refresh_token": tokens.refresh_token }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_token_is_single_use() {
    let (addr, client, _db_pool) = helpers::spawn_app().await;
    helpers::register(&addr, &client, "rotate@example.com", Role::Student).await;
    let tokens = helpers::login(&addr, &client, "rotate@example.com").await;
    let refresh_url = format!("http://{addr}/api/auth/refresh");

    let response = client
        .post(&refresh_url)
        .json(&json!({ "refresh_token": tokens.refresh_token }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let rotated: LoginResponse = response.json().await.unwrap();
    assert_ne!(rotated.refresh_token, tokens.refresh_token);
    assert_ne!(rotated.access_token, tokens.access_token);

    // The old token was consumed by the rotation
    let response = client
        .post(&refresh_url)
        .json(&json!({ "refresh_token": tokens.refresh_token }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // The new access token works
    let response = client
        .get(format!("http://{addr}/api/auth/me"))
        .bearer_auth(&rotated.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_session_cookie_authenticates_browser_requests() {
    let (addr, _client, _db_pool) = helpers::spawn_app().await;
    let browser = reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .unwrap();

    helpers::register(&addr, &browser, "cookie@example.com", Role::Student).await;
    helpers::login(&addr, &browser, "cookie@example.com").await;

    // No Authorization header: the session cookie set at login is enough
    let response = browser
        .get(format!("http://{addr}/api/auth/me"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let me: UserDto = response.json().await.unwrap();
    assert_eq!(me.email, "cookie@example.com");

    let response = browser
        .post(format!("http://{addr}/api/auth/logout"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = browser
        .get(format!("http://{addr}/api/auth/me"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_validation() {
    let (addr, client, _db_pool) = helpers::spawn_app().await;
    let register_url = format!("http://{addr}/api/auth/register");

    let cases = [
        json!({ "name": "A", "email": "not-an-email", "password": TEST_PASSWORD }),
        json!({ "name": "A", "email": "short@example.com", "password": "short" }),
        json!({ "name": "", "email": "noname@example.com", "password": TEST_PASSWORD }),
        json!({ "name": "A", "email": "boss@example.com", "password": TEST_PASSWORD, "role": "admin" }),
    ];

    for payload in cases {
        let response = client.post(&register_url).json(&payload).send().await.unwrap();
        assert_eq!(
            response.status(),
            StatusCode::BAD_REQUEST,
            "Registration should be rejected: {payload}"
        );
        let body: serde_json::Value = response.json().await.unwrap();
        assert!(body["error"].is_string());
    }
}

#[tokio::test]
async fn test_protected_routes_require_auth() {
    let (addr, client, _db_pool) = helpers::spawn_app().await;

    let routes = [
        (reqwest::Method::POST, "/api/auth/logout"),
        (reqwest::Method::GET, "/api/auth/me"),
        (reqwest::Method::POST, "/api/courses"),
        (reqwest::Method::PUT, "/api/courses/1"),
        (reqwest::Method::DELETE, "/api/courses/1"),
        (reqwest::Method::GET, "/api/courses/1/lessons"),
        (reqwest::Method::POST, "/api/courses/1/enroll"),
        (reqwest::Method::GET, "/api/enrollments"),
        (reqwest::Method::GET, "/api/assignments"),
        (reqwest::Method::POST, "/api/assignments/submit"),
        (reqwest::Method::POST, "/api/submissions/1/grade"),
        (reqwest::Method::GET, "/api/study-sessions"),
        (reqwest::Method::GET, "/api/quizzes/submissions"),
        (reqwest::Method::GET, "/api/achievements"),
        (reqwest::Method::GET, "/api/progress"),
        (reqwest::Method::GET, "/api/analytics"),
        (reqwest::Method::GET, "/api/courses/1/analytics"),
        (reqwest::Method::GET, "/api/courses/1/posts"),
        (reqwest::Method::DELETE, "/api/posts/1"),
    ];

    for (method, path) in routes {
        let url = format!("http://{addr}{path}");
        let response = client.request(method.clone(), &url).send().await.unwrap();
        assert_eq!(
            response.status(),
            StatusCode::UNAUTHORIZED,
            "{method} {path} should require authentication"
        );
    }
}

#[tokio::test]
async fn test_invalid_and_expired_tokens() {
    let (addr, client, _db_pool) = helpers::spawn_app().await;
    let protected_url = format!("http://{addr}/api/auth/me");

    let response = client
        .get(&protected_url)
        .bearer_auth("this-is-not-a-valid-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let user = helpers::register(&addr, &client, "expired@example.com", Role::Student).await;
    let token_for = |exp: chrono::DateTime<Utc>, secret: &str| {
        let claims = Claims {
            sub: user.id.to_string(),
            exp: exp.timestamp() as usize,
            nonce: "test-nonce".to_string(),
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_ref())).unwrap()
    };

    let expired = token_for(Utc::now() - Duration::seconds(30), TEST_JWT_SECRET);
    let response = client.get(&protected_url).bearer_auth(expired).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "Expired token accepted");

    let forged = token_for(Utc::now() + Duration::minutes(5), "some-other-secret");
    let response = client.get(&protected_url).bearer_auth(forged).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "Forged token accepted");

    let valid = token_for(Utc::now() + Duration::minutes(5), TEST_JWT_SECRET);
    let response = client.get(&protected_url).bearer_auth(valid).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_auth_routes_are_rate_limited() {
    let (addr, client, _db_pool) = helpers::spawn_app_with(|config| {
        config.rate_limit.per_second = 60;
        config.rate_limit.burst_size = 2;
    })
    .await;
    let login_url = format!("http://{addr}/api/auth/login");
    let attempt = json!({ "email": "guess@example.com", "password": "guessing" });

    let mut statuses = Vec::new();
    for _ in 0..3 {
        let response = client.post(&login_url).json(&attempt).send().await.unwrap();
        statuses.push(response.status());
    }
    assert_eq!(
        statuses,
        vec![StatusCode::UNAUTHORIZED, StatusCode::UNAUTHORIZED, StatusCode::TOO_MANY_REQUESTS]
    );

    // Catalog reads are not throttled
    for _ in 0..5 {
        let response = client.get(format!("http://{addr}/api/courses")).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
