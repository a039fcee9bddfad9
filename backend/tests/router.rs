use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    http::{Request, StatusCode},
    Router,
};
use backend::web_server::{create_router, AppState};
use common::{CourseSummary, Paginated};
use http_body_util::BodyExt; // for .collect()
use tower::ServiceExt; // for .oneshot()

mod helpers;

async fn test_router() -> Router {
    let app_state = AppState {
        db_pool: helpers::test_pool().await,
        app_config: Arc::new(helpers::test_config(0)),
    };
    create_router(app_state)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Bytes) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body)
}

#[tokio::test]
async fn test_health_reports_database() {
    let (status, body) = get(test_router().await, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "ok");
}

#[tokio::test]
async fn test_empty_catalog() {
    let (status, body) = get(test_router().await, "/api/courses").await;
    assert_eq!(status, StatusCode::OK);
    let page: Paginated<CourseSummary> = serde_json::from_slice(&body).unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total, 0);
    assert_eq!(page.page, 1);
    assert_eq!(page.per_page, 20);
}

#[tokio::test]
async fn test_openapi_document_lists_routes() {
    let (status, body) = get(test_router().await, "/api-docs/openapi.json").await;
    assert_eq!(status, StatusCode::OK);
    let doc: serde_json::Value = serde_json::from_slice(&body).unwrap();
    for path in ["/api/courses", "/api/assignments/submit", "/api/analytics"] {
        assert!(doc["paths"][path].is_object(), "{path} missing from the API document");
    }
    assert!(doc["components"]["securitySchemes"]["bearer_auth"].is_object());
}

#[tokio::test]
async fn test_unknown_paths_fall_back_to_the_page_shell() {
    let (status, body) = get(test_router().await, "/courses/42").await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8_lossy(&body).contains("<html"));
}

#[tokio::test]
async fn test_protected_route_without_token() {
    let (status, body) = get(test_router().await, "/api/enrollments").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["error"], "Unauthorized");
}
