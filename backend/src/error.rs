use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Internal Server Error: {0}")]
    InternalServerError(String),

    #[error("Database error")]
    DatabaseError(sqlx::Error),

    #[error("Authentication error")]
    JwtError(jsonwebtoken::errors::Error),

    #[error("Authentication error")]
    PasswordError(bcrypt::BcryptError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Validation error: {0}")]
    ValidationError(ValidationErrors),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal server error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::DatabaseError(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
            AppError::JwtError(e) => {
                tracing::warn!("JWT error: {}", e);
                (StatusCode::UNAUTHORIZED, "Invalid token".to_string())
            }
            AppError::PasswordError(e) => {
                tracing::error!("Password hashing error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(resource) => (StatusCode::NOT_FOUND, format!("{resource} not found")),
            AppError::ValidationError(errors) => {
                let message = format!("Input validation failed: {errors}").replace('\n', ", ");
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": message, "details": errors })),
                )
                    .into_response();
            }
        };

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::DatabaseError(e)
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::ValidationError(errors)
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        AppError::JwtError(e)
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(e: bcrypt::BcryptError) -> Self {
        AppError::PasswordError(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use validator::Validate;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn status_mapping() {
        let cases = [
            (AppError::BadRequest("nope".into()), StatusCode::BAD_REQUEST),
            (AppError::Conflict("taken".into()), StatusCode::CONFLICT),
            (AppError::Unauthorized, StatusCode::UNAUTHORIZED),
            (AppError::Forbidden("no".into()), StatusCode::FORBIDDEN),
            (AppError::NotFound("Course"), StatusCode::NOT_FOUND),
            (
                AppError::DatabaseError(sqlx::Error::RowNotFound),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[tokio::test]
    async fn not_found_names_the_resource() {
        let body = body_json(AppError::NotFound("Course").into_response()).await;
        assert_eq!(body["error"], "Course not found");
    }

    #[tokio::test]
    async fn internal_errors_do_not_leak_details() {
        let body =
            body_json(AppError::InternalServerError("secret detail".into()).into_response()).await;
        assert_eq!(body["error"], "Internal server error");
    }

    #[tokio::test]
    async fn validation_errors_carry_details() {
        let request = common::Credentials {
            email: "bad".into(),
            password: String::new(),
        };
        let errors = request.validate().unwrap_err();
        let response = AppError::from(errors).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["details"]["email"].is_array());
    }
}
