use axum::{
    extract::State,
    routing::{delete, get},
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::{
    dto::CreateCommentRequest,
    repo_types::{Comment, CommentInsert},
};
use crate::{
    auth::extractors::LoggedIn,
    db::RowsAffected,
    error::AppError,
    extract::{JsonBody, PathParam},
    state::AppState,
};

pub fn comment_routes() -> Router<AppState> {
    Router::new()
        .route("/comments", get(list_comments).post(create_comment))
        .route("/comments/:id", delete(delete_comment))
}

#[instrument(skip(state))]
pub async fn list_comments(State(state): State<AppState>) -> Result<Json<Vec<Comment>>, AppError> {
    Ok(Json(state.comments.find_all().await?))
}

#[instrument(skip(state, user, payload))]
pub async fn create_comment(
    State(state): State<AppState>,
    user: LoggedIn,
    JsonBody(payload): JsonBody<CreateCommentRequest>,
) -> Result<Json<Comment>, AppError> {
    if payload.comment_text.trim().is_empty() {
        return Err(AppError::validation("comment_text is required"));
    }
    let comment = state
        .comments
        .create(CommentInsert {
            comment_text: payload.comment_text,
            user_id: user.user_id,
            post_id: payload.post_id,
        })
        .await?;
    info!(comment_id = %comment.id, post_id = %comment.post_id, "comment created");
    Ok(Json(comment))
}

#[instrument(skip(state, user))]
pub async fn delete_comment(
    State(state): State<AppState>,
    user: LoggedIn,
    PathParam(id): PathParam<i32>,
) -> Result<Json<RowsAffected>, AppError> {
    let rows_affected = state.comments.destroy(id, user.user_id).await?;
    if rows_affected == 0 {
        warn!(%id, user_id = %user.user_id, "delete matched no comment");
        return Err(AppError::not_found("No comment found with this id"));
    }
    Ok(Json(RowsAffected { rows_affected }))
}
