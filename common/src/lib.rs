use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(not(target_arch = "wasm32"))]
use sqlx::FromRow;
#[cfg(feature = "ts_export")]
use ts_rs::TS;
use utoipa::ToSchema;
use validator::Validate;

/// Error returned when a stored text value does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

// Enums are persisted as lowercase snake_case text and serialized the same way.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(::serde::Serialize, ::serde::Deserialize, ::utoipa::ToSchema, Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "ts_export", derive(::ts_rs::TS), ts(export))]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err($crate::UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = $crate::UnknownVariant;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

pub mod assignment;
pub mod course;
pub mod learning;
pub mod pagination;
pub mod status;

pub use assignment::*;
pub use course::*;
pub use learning::*;
pub use pagination::{Paginated, Pagination};

text_enum!(
    /// Account role. Instructors own courses, admins may act on any course.
    Role, "role" {
        Student => "student",
        Instructor => "instructor",
        Admin => "admin",
    }
);

impl Role {
    /// Whether this role is allowed to author courses at all.
    pub fn can_teach(&self) -> bool {
        matches!(self, Role::Instructor | Role::Admin)
    }
}

// --- Auth payloads ---

#[derive(Serialize, Deserialize, ToSchema, Validate, Clone, Debug)]
#[cfg_attr(feature = "ts_export", derive(TS), ts(export))]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: String,
    #[validate(email(message = "Email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters long"))]
    pub password: String,
    /// Defaults to `student`. Self-registration as `admin` is rejected.
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Serialize, Deserialize, ToSchema, Validate, Clone, Debug)]
#[cfg_attr(feature = "ts_export", derive(TS), ts(export))]
pub struct Credentials {
    #[validate(email(message = "Email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Serialize, Deserialize, ToSchema, Clone, Debug)]
#[cfg_attr(feature = "ts_export", derive(TS), ts(export))]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
}

#[cfg_attr(not(target_arch = "wasm32"), derive(FromRow))]
#[derive(Serialize, Deserialize, ToSchema, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "ts_export", derive(TS), ts(export))]
pub struct UserDto {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[cfg_attr(not(target_arch = "wasm32"), sqlx(try_from = "String"))]
    pub role: Role,
    pub created_at: DateTime<Utc>,
}
