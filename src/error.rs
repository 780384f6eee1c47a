use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::{error, warn};

use crate::db::DbError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    /// Wrong login credentials. Only the two fixed login messages are used.
    #[error("{0}")]
    Authentication(&'static str),

    #[error("{0}")]
    Unauthorized(String),

    #[error("internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }
}

/// Client-facing text for a constraint violation. Constraint names stay in
/// the server log.
fn violation_message(err: &DbError) -> &'static str {
    match err {
        DbError::UniqueViolation(constraint) => match constraint.as_str() {
            "users_email_key" => "email must be unique",
            "votes_pkey" => "you have already voted for this post",
            _ => "duplicate value",
        },
        DbError::ForeignKeyViolation(constraint) => match constraint.as_str() {
            "posts_user_id_fkey" | "comments_user_id_fkey" | "votes_user_id_fkey" => {
                "user does not exist"
            }
            "comments_post_id_fkey" | "votes_post_id_fkey" => "post does not exist",
            _ => "referenced record does not exist",
        },
        DbError::Other(_) => "Internal server error",
    }
}

impl From<DbError> for AppError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Other(e) => AppError::Internal(e),
            violation => {
                warn!(error = %violation, "constraint violation");
                AppError::Validation(violation_message(&violation).into())
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        warn!(status = %rejection.status(), "rejected request body");
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        warn!(status = %rejection.status(), "rejected path parameter");
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::Authentication(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match self {
            AppError::Internal(e) => {
                error!(error = ?e, "internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(serde_json::json!({ "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_hide_the_cause() {
        let res = AppError::Internal(anyhow::anyhow!("connection refused to 10.0.0.3")).into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn db_errors_map_to_taxonomy() {
        let dup = AppError::from(DbError::UniqueViolation("users_email_key".into()));
        assert!(matches!(dup, AppError::Validation(ref m) if m == "email must be unique"));

        let fk = AppError::from(DbError::ForeignKeyViolation("comments_post_id_fkey".into()));
        assert!(matches!(fk, AppError::Validation(ref m) if m == "post does not exist"));

        let unknown = AppError::from(DbError::UniqueViolation("some_internal_idx".into()));
        assert!(!unknown.to_string().contains("some_internal_idx"));
        let unknown = AppError::from(DbError::ForeignKeyViolation("some_internal_fkey".into()));
        assert!(!unknown.to_string().contains("some_internal_fkey"));

        let other = AppError::from(DbError::Other(anyhow::anyhow!("boom")));
        assert!(matches!(other, AppError::Internal(_)));
    }

    #[test]
    fn status_codes() {
        assert_eq!(
            AppError::not_found("x").into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Authentication("Incorrect password!").into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Unauthorized("Please log in".into()).into_response().status(),
            StatusCode::UNAUTHORIZED
        );
    }
}
