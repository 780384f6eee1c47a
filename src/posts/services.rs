use lazy_static::lazy_static;
use regex::Regex;

use super::{dto::CreatePostRequest, repo_types::PostInsert};
use crate::error::AppError;

pub(crate) fn is_valid_url(url: &str) -> bool {
    lazy_static! {
        static ref URL_RE: Regex = Regex::new(r"^https?://[^\s/?#.][^\s/?#]*\.[^\s/?#]+(?:[/?#]\S*)?$").unwrap();
    }
    URL_RE.is_match(url)
}

pub fn validate_title(title: &str) -> Result<(), AppError> {
    if title.trim().is_empty() {
        return Err(AppError::validation("title is required"));
    }
    Ok(())
}

pub fn before_create(req: CreatePostRequest, user_id: i32) -> Result<PostInsert, AppError> {
    validate_title(&req.title)?;
    let post_url = req.post_url.trim().to_string();
    if !is_valid_url(&post_url) {
        return Err(AppError::validation("post_url must be a valid URL"));
    }
    Ok(PostInsert {
        title: req.title,
        post_url,
        user_id,
    })
}
