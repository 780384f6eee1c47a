use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use super::{
    dto::{CreateUserRequest, UpdateUserRequest},
    repo_types::{User, UserInsert, UserUpdate},
};
use crate::{auth::password, error::AppError};

pub const MIN_PASSWORD_LEN: usize = 4;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn validate_username(username: &str) -> Result<(), AppError> {
    if username.trim().is_empty() {
        return Err(AppError::validation("username is required"));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), AppError> {
    if !is_valid_email(email) {
        return Err(AppError::validation("email must be a valid email address"));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Pre-save hook: validate every column, then hash the password.
pub fn before_create(req: CreateUserRequest) -> Result<UserInsert, AppError> {
    let email = req.email.trim().to_string();
    validate_username(&req.username)?;
    validate_email(&email)?;
    validate_password(&req.password)?;

    let hash = password::hash_password(&req.password)?;
    debug!(email = %email, "user passed pre-save hook");
    Ok(UserInsert::new(req.username, email, hash))
}

/// Per-row update hook: validate only the supplied columns and re-hash a new
/// password.
pub fn before_update(req: UpdateUserRequest) -> Result<UserUpdate, AppError> {
    if req.username.is_none() && req.email.is_none() && req.password.is_none() {
        return Err(AppError::validation("no updatable fields supplied"));
    }

    if let Some(username) = &req.username {
        validate_username(username)?;
    }
    let email = req.email.map(|e| e.trim().to_string());
    if let Some(email) = &email {
        validate_email(email)?;
    }
    let password_hash = match &req.password {
        Some(plain) => {
            validate_password(plain)?;
            Some(password::hash_password(plain)?)
        }
        None => None,
    };

    Ok(UserUpdate::new(req.username, email, password_hash))
}

impl User {
    pub fn check_password(&self, plain: &str) -> Result<bool, AppError> {
        Ok(password::verify_password(plain, &self.password)?)
    }
}
