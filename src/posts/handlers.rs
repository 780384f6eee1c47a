use axum::{
    extract::State,
    routing::{get, put},
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::{
    dto::{CreatePostRequest, UpdatePostRequest, UpvoteRequest},
    repo_types::{Post, PostView},
    services::{before_create, validate_title},
};
use crate::{
    auth::extractors::LoggedIn,
    db::RowsAffected,
    error::AppError,
    extract::{JsonBody, PathParam},
    state::AppState,
};

const NO_POST: &str = "No post found with this id";

pub fn post_routes() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route("/posts/upvote", put(upvote))
        .route(
            "/posts/:id",
            get(get_post).put(update_post).delete(delete_post),
        )
}

#[instrument(skip(state))]
pub async fn list_posts(State(state): State<AppState>) -> Result<Json<Vec<PostView>>, AppError> {
    Ok(Json(state.posts.find_all().await?))
}

#[instrument(skip(state))]
pub async fn get_post(
    State(state): State<AppState>,
    PathParam(id): PathParam<i32>,
) -> Result<Json<PostView>, AppError> {
    state
        .posts
        .find_view(id)
        .await?
        .map(Json)
        .ok_or_else(|| {
            warn!(%id, "post not found");
            AppError::not_found(NO_POST)
        })
}

#[instrument(skip(state, user, payload))]
pub async fn create_post(
    State(state): State<AppState>,
    user: LoggedIn,
    JsonBody(payload): JsonBody<CreatePostRequest>,
) -> Result<Json<Post>, AppError> {
    let insert = before_create(payload, user.user_id)?;
    let post = state.posts.create(insert).await?;
    info!(post_id = %post.id, user_id = %user.user_id, username = %user.username, "post created");
    Ok(Json(post))
}

#[instrument(skip(state, user))]
pub async fn upvote(
    State(state): State<AppState>,
    user: LoggedIn,
    JsonBody(payload): JsonBody<UpvoteRequest>,
) -> Result<Json<PostView>, AppError> {
    state
        .posts
        .upvote(user.user_id, payload.post_id)
        .await
        .map_err(|e| {
            warn!(error = %e, post_id = %payload.post_id, user_id = %user.user_id, "upvote rejected");
            AppError::from(e)
        })?;
    info!(post_id = %payload.post_id, user_id = %user.user_id, "post upvoted");

    let view = state
        .posts
        .find_view(payload.post_id)
        .await?
        .ok_or_else(|| AppError::not_found(NO_POST))?;
    Ok(Json(view))
}

#[instrument(skip(state, user, payload))]
pub async fn update_post(
    State(state): State<AppState>,
    user: LoggedIn,
    PathParam(id): PathParam<i32>,
    JsonBody(payload): JsonBody<UpdatePostRequest>,
) -> Result<Json<RowsAffected>, AppError> {
    validate_title(&payload.title)?;
    let rows_affected = state
        .posts
        .update_title(id, user.user_id, &payload.title)
        .await?;
    if rows_affected == 0 {
        warn!(%id, user_id = %user.user_id, "update matched no post");
        return Err(AppError::not_found(NO_POST));
    }
    Ok(Json(RowsAffected { rows_affected }))
}

#[instrument(skip(state, user))]
pub async fn delete_post(
    State(state): State<AppState>,
    user: LoggedIn,
    PathParam(id): PathParam<i32>,
) -> Result<Json<RowsAffected>, AppError> {
    let rows_affected = state.posts.destroy(id, user.user_id).await?;
    if rows_affected == 0 {
        warn!(%id, user_id = %user.user_id, "delete matched no post");
        return Err(AppError::not_found(NO_POST));
    }
    info!(%id, "post deleted");
    Ok(Json(RowsAffected { rows_affected }))
}
