use std::convert::Infallible;

use crate::{error::AppError, web_server::AppState};
use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::request::Parts,
};
use common::Role;

/// The caller, as resolved by the auth middleware.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    /// Rejects students from instructor-only endpoints.
    pub fn require_instructor(&self) -> Result<(), AppError> {
        if self.role.can_teach() {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "Only instructors can perform this action".to_string(),
            ))
        }
    }

    /// Owners and admins may manage a course.
    pub fn can_manage(&self, instructor_id: i64) -> bool {
        self.role == Role::Admin || self.id == instructor_id
    }

    pub fn require_manager(&self, instructor_id: i64) -> Result<(), AppError> {
        if self.can_manage(instructor_id) {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "You do not manage this course".to_string(),
            ))
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // The middleware puts AuthUser in extensions; its absence means the
        // route was mounted without it.
        let user = parts.extensions.get::<AuthUser>().ok_or_else(|| {
            AppError::InternalServerError(
                "AuthUser not found in request extensions. Is the auth middleware missing?".into(),
            )
        })?;

        Ok(user.clone())
    }
}

/// Public routes run the optional auth middleware, which leaves the
/// extension empty for anonymous callers.
impl OptionalFromRequestParts<AppState> for AuthUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<AuthUser>().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, role: Role) -> AuthUser {
        AuthUser {
            id,
            email: format!("user{id}@example.com"),
            role,
        }
    }

    #[test]
    fn students_cannot_teach() {
        assert!(user(1, Role::Student).require_instructor().is_err());
        assert!(user(1, Role::Instructor).require_instructor().is_ok());
        assert!(user(1, Role::Admin).require_instructor().is_ok());
    }

    #[test]
    fn only_owner_or_admin_manages() {
        assert!(user(1, Role::Instructor).can_manage(1));
        assert!(!user(2, Role::Instructor).can_manage(1));
        assert!(user(3, Role::Admin).can_manage(1));
    }
}
