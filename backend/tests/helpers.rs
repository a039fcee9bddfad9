#![allow(dead_code)]

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use backend::config::{AppConfig, DatabaseConfig, JwtConfig, RateLimitConfig, WebConfig};
use backend::db::{DbPool, DbPoolOptions, MIGRATOR};
use backend::web_server::{create_router, AppState};
use common::{CourseDto, CourseLevel, LessonDto, LoginResponse, Role, UserDto};
use once_cell::sync::Lazy;
use reqwest::StatusCode;
use serde_json::json;
use tokio::net::TcpListener;

pub const TEST_JWT_SECRET: &str = "test-secret";
pub const TEST_PASSWORD: &str = "password123";

static TRACING: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init();
});

pub fn test_config(port: u16) -> AppConfig {
    AppConfig {
        web: WebConfig {
            addr: "127.0.0.1".to_string(),
            port,
            cors_origin: "http://localhost:5173".to_string(),
            static_dir: "static".to_string(),
        },
        database: DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        },
        jwt: JwtConfig {
            secret: TEST_JWT_SECRET.to_string(),
            access_token_expires_minutes: 15,
            refresh_token_expires_days: 7,
        },
        rate_limit: RateLimitConfig {
            per_second: 1,
            burst_size: 10_000,
        },
    }
}

/// In-memory database with the schema applied. A single connection that is
/// never recycled, since every connection would get its own empty database.
pub async fn test_pool() -> DbPool {
    let db_pool = DbPoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database pool.");

    MIGRATOR
        .run(&db_pool)
        .await
        .expect("Failed to run migrations on test database.");

    db_pool
}

/// Spawn a test server and return the address and a reqwest client.
pub async fn spawn_app() -> (SocketAddr, reqwest::Client, DbPool) {
    spawn_app_with(|_| {}).await
}

pub async fn spawn_app_with(
    customize: impl FnOnce(&mut AppConfig),
) -> (SocketAddr, reqwest::Client, DbPool) {
    Lazy::force(&TRACING);

    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut config = test_config(addr.port());
    customize(&mut config);

    let db_pool = test_pool().await;
    let app_state = AppState {
        db_pool: db_pool.clone(),
        app_config: Arc::new(config),
    };
    let app = create_router(app_state);

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    (addr, client, db_pool)
}

pub async fn register(
    addr: &SocketAddr,
    client: &reqwest::Client,
    email: &str,
    role: Role,
) -> UserDto {
    let name = email.split('@').next().unwrap_or(email);
    let response = client
        .post(format!("http://{addr}/api/auth/register"))
        .json(&json!({
            "name": name,
            "email": email,
            "password": TEST_PASSWORD,
            "role": role,
        }))
        .send()
        .await
        .expect("Failed to register user");
    assert_eq!(response.status(), StatusCode::CREATED, "Registration failed");
    response.json().await.unwrap()
}

pub async fn login(addr: &SocketAddr, client: &reqwest::Client, email: &str) -> LoginResponse {
    let response = client
        .post(format!("http://{addr}/api/auth/login"))
        .json(&json!({ "email": email, "password": TEST_PASSWORD }))
        .send()
        .await
        .expect("Failed to login user");
    assert_eq!(response.status(), StatusCode::OK, "Login failed");
    response.json().await.unwrap()
}

/// Registers a user with the given role and returns their access token.
pub async fn sign_up(
    addr: &SocketAddr,
    client: &reqwest::Client,
    email: &str,
    role: Role,
) -> String {
    register(addr, client, email, role).await;
    login(addr, client, email).await.access_token
}

/// Admins cannot self-register; tests promote a registered user directly.
pub async fn sign_up_admin(
    addr: &SocketAddr,
    client: &reqwest::Client,
    db_pool: &DbPool,
    email: &str,
) -> String {
    register(addr, client, email, Role::Student).await;
    sqlx::query("UPDATE users SET role = 'admin' WHERE email = $1")
        .bind(email)
        .execute(db_pool)
        .await
        .unwrap();
    login(addr, client, email).await.access_token
}

pub async fn create_course(
    addr: &SocketAddr,
    client: &reqwest::Client,
    token: &str,
    title: &str,
    published: bool,
) -> CourseDto {
    create_course_in(addr, client, token, title, "programming", CourseLevel::Beginner, published).await
}

pub async fn create_course_in(
    addr: &SocketAddr,
    client: &reqwest::Client,
    token: &str,
    title: &str,
    category: &str,
    level: CourseLevel,
    published: bool,
) -> CourseDto {
    let response = client
        .post(format!("http://{addr}/api/courses"))
        .bearer_auth(token)
        .json(&json!({
            "title": title,
            "description": format!("All about {title}"),
            "category": category,
            "level": level,
            "published": published,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED, "Course creation failed");
    response.json().await.unwrap()
}

pub async fn add_lesson(
    addr: &SocketAddr,
    client: &reqwest::Client,
    token: &str,
    course_id: i64,
    title: &str,
) -> LessonDto {
    let response = client
        .post(format!("http://{addr}/api/courses/{course_id}/lessons"))
        .bearer_auth(token)
        .json(&json!({ "title": title, "content": "Read this.", "duration_minutes": 10 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED, "Lesson creation failed");
    response.json().await.unwrap()
}

pub async fn enroll(addr: &SocketAddr, client: &reqwest::Client, token: &str, course_id: i64) {
    let response = client
        .post(format!("http://{addr}/api/courses/{course_id}/enroll"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED, "Enrollment failed");
}
