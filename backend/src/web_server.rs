use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    middleware,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Serialize;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi, ToSchema,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::{
    achievements, analytics, assignments, auth, courses, enrollments, lessons, posts, progress,
    quizzes, ratings, study_sessions,
};

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub app_config: Arc<AppConfig>,
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Coursework API",
        description = "Course catalog, enrollment, assignments and learning analytics."
    ),
    paths(
        health,
        auth::register,
        auth::login,
        auth::refresh,
        auth::logout,
        auth::me,
        courses::list_courses,
        courses::get_course,
        courses::create_course,
        courses::update_course,
        courses::delete_course,
        courses::instructor_courses,
        lessons::list_lessons,
        lessons::create_lesson,
        lessons::complete_lesson,
        enrollments::enroll,
        enrollments::unenroll,
        enrollments::list_enrollments,
        ratings::rate_course,
        ratings::list_ratings,
        assignments::list_course_assignments,
        assignments::create_assignment,
        assignments::assignment_board,
        assignments::start_assignment,
        assignments::submit_assignment,
        assignments::list_submissions,
        assignments::grade_submission,
        study_sessions::list_study_sessions,
        study_sessions::create_study_session,
        quizzes::list_quiz_submissions,
        quizzes::submit_quiz,
        achievements::list_achievements,
        progress::get_progress,
        analytics::user_analytics,
        analytics::course_analytics,
        posts::list_posts,
        posts::create_post,
        posts::delete_post,
    ),
    tags(
        (name = "auth", description = "Registration, login and token rotation"),
        (name = "courses", description = "Catalog and course management"),
        (name = "lessons", description = "Lessons and completion"),
        (name = "enrollments", description = "Course enrollment"),
        (name = "assignments", description = "Assignments, submissions and grading"),
        (name = "progress", description = "Study log, quizzes, achievements and analytics"),
        (name = "posts", description = "Course discussion"),
        (name = "system", description = "Health"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
}

#[utoipa::path(
    get,
    path = "/api/health",
    tag = "system",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse),
    )
)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    match sqlx::query("SELECT 1").execute(&state.db_pool).await {
        Ok(_) => (
            StatusCode::OK,
            Json(HealthResponse { status: "healthy", database: "ok" }),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse { status: "unhealthy", database: "error" }),
            )
        }
    }
}

pub async fn run_server(app_state: AppState) -> anyhow::Result<()> {
    let web = &app_state.app_config.web;
    let addr: SocketAddr = format!("{}:{}", web.addr, web.port).parse()?;
    let app = create_router(app_state);

    tracing::info!("Serving frontend and API at http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600));

    match origin.parse::<HeaderValue>() {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
            layer
        }
    }
}

pub fn create_router(app_state: AppState) -> Router {
    let config = &app_state.app_config;

    let static_dir = &config.web.static_dir;
    let static_files = ServeDir::new(static_dir)
        .fallback(ServeFile::new(format!("{static_dir}/index.html")));

    // Per-IP throttling on the credential endpoints. Keys on the peer address,
    // so the server must be started with connect info.
    let governor = GovernorConfigBuilder::default()
        .per_second(config.rate_limit.per_second)
        .burst_size(config.rate_limit.burst_size)
        .finish()
        .map(|conf| GovernorLayer { config: Arc::new(conf) });

    let mut auth_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh));
    match governor {
        Some(layer) => auth_routes = auth_routes.layer(layer),
        None => tracing::warn!("Invalid rate limit settings, auth routes are not throttled"),
    }

    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/courses", get(courses::list_courses))
        .route("/courses/{id}", get(courses::get_course))
        .route("/courses/{id}/ratings", get(ratings::list_ratings))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            auth::optional_auth_middleware,
        ));

    let protected_routes = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/courses", post(courses::create_course))
        .route(
            "/courses/{id}",
            put(courses::update_course).delete(courses::delete_course),
        )
        .route("/instructor/courses", get(courses::instructor_courses))
        .route(
            "/courses/{id}/lessons",
            get(lessons::list_lessons).post(lessons::create_lesson),
        )
        .route("/lessons/{id}/complete", post(lessons::complete_lesson))
        .route(
            "/courses/{id}/enroll",
            post(enrollments::enroll).delete(enrollments::unenroll),
        )
        .route("/enrollments", get(enrollments::list_enrollments))
        .route("/courses/{id}/rating", post(ratings::rate_course))
        .route(
            "/courses/{id}/assignments",
            get(assignments::list_course_assignments).post(assignments::create_assignment),
        )
        .route("/assignments", get(assignments::assignment_board))
        .route("/assignments/submit", post(assignments::submit_assignment))
        .route("/assignments/{id}/start", post(assignments::start_assignment))
        .route("/assignments/{id}/submissions", get(assignments::list_submissions))
        .route("/submissions/{id}/grade", post(assignments::grade_submission))
        .route(
            "/study-sessions",
            get(study_sessions::list_study_sessions).post(study_sessions::create_study_session),
        )
        .route(
            "/quizzes/submissions",
            get(quizzes::list_quiz_submissions).post(quizzes::submit_quiz),
        )
        .route("/achievements", get(achievements::list_achievements))
        .route("/progress", get(progress::get_progress))
        .route("/analytics", get(analytics::user_analytics))
        .route("/courses/{id}/analytics", get(analytics::course_analytics))
        .route(
            "/courses/{id}/posts",
            get(posts::list_posts).post(posts::create_post),
        )
        .route("/posts/{id}", delete(posts::delete_post))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            auth::auth_middleware,
        ));

    let cors = cors_layer(&config.web.cors_origin);

    Router::new()
        .nest(
            "/api",
            auth_routes.merge(public_routes).merge(protected_routes),
        )
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .fallback_service(static_files)
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}
