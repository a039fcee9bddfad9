use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use bcrypt::{hash, verify, DEFAULT_COST};
use common::{Credentials, LoginResponse, RegisterRequest, Role, UserDto};
use serde::{Deserialize, Serialize};

use base64::engine::{general_purpose, Engine as _};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;

use axum::{extract::Request, middleware::Next, response::Response};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};

use crate::config::JwtConfig;
use crate::error::AppError;
use crate::web_server::AppState;
use crate::{db::DbPool, extractors::AuthUser};
use rand::Rng;
use sha2::{Digest, Sha256};
use utoipa::ToSchema;
use validator::Validate;

/// Name of the cookie carrying the access token for browser sessions.
pub const SESSION_COOKIE: &str = "session";

// --- User & Payload Structs ---

#[derive(sqlx::FromRow, Debug)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub role: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,   // Subject (user id)
    pub exp: usize,    // Expiration time
    pub nonce: String, // Nonce for access token uniqueness
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshPayload {
    pub refresh_token: String,
}

#[derive(sqlx::FromRow)]
struct RefreshTokenRecord {
    user_id: i64,
    expires_at: DateTime<Utc>,
}

// --- Token Helpers ---

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn session_cookie(access_token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, access_token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// Creates a new access token and a new refresh token for a user.
///
/// The hashed refresh token replaces any existing one for the user. When
/// `old_token_hash` is given it is deleted in the same transaction, so a
/// refresh token can only be used once.
async fn issue_tokens(
    user_id: i64,
    db_pool: &DbPool,
    jwt_config: &JwtConfig,
    old_token_hash: Option<&str>,
) -> Result<LoginResponse, AppError> {
    let nonce: String = rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(16)
        .map(char::from)
        .collect();

    let access_token_exp = (Utc::now() + Duration::minutes(jwt_config.access_token_expires_minutes))
        .timestamp() as usize;
    let access_claims = Claims {
        sub: user_id.to_string(),
        exp: access_token_exp,
        nonce,
    };
    let access_token = encode(
        &Header::default(),
        &access_claims,
        &EncodingKey::from_secret(jwt_config.secret.as_ref()),
    )?;

    let mut refresh_token_bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut refresh_token_bytes);
    let new_refresh_token = general_purpose::URL_SAFE_NO_PAD.encode(refresh_token_bytes);
    let new_refresh_token_hash = hash_token(&new_refresh_token);
    let new_refresh_token_exp = Utc::now() + Duration::days(jwt_config.refresh_token_expires_days);

    let mut tx = db_pool.begin().await?;

    if let Some(old_hash) = old_token_hash {
        sqlx::query("DELETE FROM refresh_tokens WHERE token_hash = $1")
            .bind(old_hash)
            .execute(&mut *tx)
            .await?;
    }

    // One refresh token per user: logging in again ends other sessions.
    sqlx::query(
        "INSERT INTO refresh_tokens (user_id, token_hash, expires_at) VALUES ($1, $2, $3)
         ON CONFLICT(user_id) DO UPDATE SET token_hash = excluded.token_hash, expires_at = excluded.expires_at",
    )
    .bind(user_id)
    .bind(&new_refresh_token_hash)
    .bind(new_refresh_token_exp)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(LoginResponse {
        access_token,
        refresh_token: new_refresh_token,
    })
}

pub(crate) async fn fetch_user(db_pool: &DbPool, user_id: i64) -> Result<UserDto, AppError> {
    sqlx::query_as::<_, UserDto>(
        "SELECT id, name, email, role, created_at FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(db_pool)
    .await?
    .ok_or(AppError::NotFound("User"))
}

// --- API Handlers ---

/// ## Register a new user
/// Hashes the password and stores the account. Students are the default role.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created successfully", body = UserDto),
        (status = 400, description = "Invalid data provided"),
        (status = 409, description = "User with this email already exists"),
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserDto>), AppError> {
    payload.validate()?;

    let role = payload.role.unwrap_or(Role::Student);
    if role == Role::Admin {
        return Err(AppError::BadRequest(
            "Cannot self-register as an admin".to_string(),
        ));
    }

    tracing::info!("Registering user with email: {}", &payload.email);
    let existing_user: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
        .bind(&payload.email)
        .fetch_optional(&state.db_pool)
        .await?;

    if existing_user.is_some() {
        return Err(AppError::Conflict(
            "User with this email already exists".to_string(),
        ));
    }

    let password_hash = hash(&payload.password, DEFAULT_COST)?;

    let user = sqlx::query_as::<_, UserDto>(
        "INSERT INTO users (name, email, password_hash, role, created_at) VALUES ($1, $2, $3, $4, $5)
         RETURNING id, name, email, role, created_at",
    )
    .bind(payload.name.trim())
    .bind(&payload.email)
    .bind(password_hash)
    .bind(role.as_str())
    .bind(Utc::now())
    .fetch_one(&state.db_pool)
    .await
    .map_err(|e| match &e {
        // Lost a race with a concurrent registration for the same email.
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict("User with this email already exists".to_string())
        }
        _ => AppError::DatabaseError(e),
    })?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// ## Login an existing user
/// Verifies the credentials, returns a token pair and sets the session cookie.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = Credentials,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<Credentials>,
) -> Result<(CookieJar, Json<LoginResponse>), AppError> {
    payload.validate()?;

    tracing::info!("Logging in user with email: {}", &payload.email);
    let user: User = sqlx::query_as::<_, User>(
        "SELECT id, email, password_hash, role FROM users WHERE email = $1",
    )
    .bind(&payload.email)
    .fetch_optional(&state.db_pool)
    .await?
    .ok_or(AppError::Unauthorized)?;

    if !verify(&payload.password, &user.password_hash)? {
        tracing::warn!("Rejected login for {}", &payload.email);
        return Err(AppError::Unauthorized);
    }

    let tokens = issue_tokens(user.id, &state.db_pool, &state.app_config.jwt, None).await?;
    let jar = jar.add(session_cookie(tokens.access_token.clone()));

    Ok((jar, Json(tokens)))
}

#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    tag = "auth",
    request_body = RefreshPayload,
    responses(
        (status = 200, description = "Token refreshed successfully", body = LoginResponse),
        (status = 401, description = "Invalid or expired refresh token")
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<RefreshPayload>,
) -> Result<(CookieJar, Json<LoginResponse>), AppError> {
    let incoming_token_hash = hash_token(&payload.refresh_token);

    let record: RefreshTokenRecord = sqlx::query_as::<_, RefreshTokenRecord>(
        "SELECT user_id, expires_at FROM refresh_tokens WHERE token_hash = $1",
    )
    .bind(&incoming_token_hash)
    .fetch_optional(&state.db_pool)
    .await?
    .ok_or(AppError::Unauthorized)?;

    if record.expires_at < Utc::now() {
        // Cleanup only; the caller is rejected either way.
        sqlx::query("DELETE FROM refresh_tokens WHERE token_hash = $1")
            .bind(&incoming_token_hash)
            .execute(&state.db_pool)
            .await
            .ok();
        return Err(AppError::Unauthorized);
    }

    let tokens = issue_tokens(
        record.user_id,
        &state.db_pool,
        &state.app_config.jwt,
        Some(&incoming_token_hash),
    )
    .await?;
    let jar = jar.add(session_cookie(tokens.access_token.clone()));

    Ok((jar, Json(tokens)))
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "auth",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 204, description = "Logout successful"),
        (status = 401, description = "Authentication required")
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    user: AuthUser,
    jar: CookieJar,
) -> Result<(CookieJar, StatusCode), AppError> {
    sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
        .bind(user.id)
        .execute(&state.db_pool)
        .await?;

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    Ok((jar, StatusCode::NO_CONTENT))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "auth",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "The authenticated user", body = UserDto),
        (status = 401, description = "Authentication required")
    )
)]
pub async fn me(State(state): State<AppState>, user: AuthUser) -> Result<Json<UserDto>, AppError> {
    Ok(Json(fetch_user(&state.db_pool, user.id).await?))
}

// --- Middleware for JWT Authentication ---

type BearerHeader = Option<TypedHeader<Authorization<Bearer>>>;

/// Resolves the caller from the `Authorization: Bearer` header or, failing
/// that, from the session cookie.
async fn authenticate(
    state: &AppState,
    auth_header: BearerHeader,
    jar: &CookieJar,
) -> Result<AuthUser, AppError> {
    let token = match auth_header {
        Some(TypedHeader(Authorization(bearer))) => bearer.token().to_owned(),
        None => jar
            .get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_owned())
            .ok_or(AppError::Unauthorized)?,
    };

    let mut validation = Validation::default();
    validation.validate_exp = true;
    validation.leeway = 0;

    let token_data = decode::<Claims>(
        &token,
        &DecodingKey::from_secret(state.app_config.jwt.secret.as_ref()),
        &validation,
    )
    .map_err(|e| {
        tracing::warn!("Rejected access token: {}", e);
        AppError::Unauthorized
    })?;

    let user_id: i64 = token_data
        .claims
        .sub
        .parse()
        .map_err(|_| AppError::Unauthorized)?;

    let user = sqlx::query_as::<_, User>(
        "SELECT id, email, password_hash, role FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(&state.db_pool)
    .await?
    .ok_or(AppError::Unauthorized)?; // Token for a deleted user

    let role: Role = user
        .role
        .parse()
        .map_err(|e| AppError::InternalServerError(format!("Corrupt user role: {e}")))?;

    Ok(AuthUser {
        id: user.id,
        email: user.email,
        role,
    })
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    auth_header: BearerHeader,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate(&state, auth_header, &jar).await?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Like [`auth_middleware`] but lets anonymous and invalid credentials through
/// without a user.
pub async fn optional_auth_middleware(
    State(state): State<AppState>,
    auth_header: BearerHeader,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    match authenticate(&state, auth_header, &jar).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
        }
        Err(AppError::Unauthorized) => {}
        Err(e) => return Err(e),
    }
    Ok(next.run(request).await)
}
