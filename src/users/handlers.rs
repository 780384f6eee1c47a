use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::{
    dto::{CreateUserRequest, LoginRequest, LoginResponse, UpdateUserRequest},
    repo_types::{User, UserDetails},
    services::{before_create, before_update},
};
use crate::{
    auth::extractors::{SetCookie, Session},
    db::RowsAffected,
    error::AppError,
    extract::{JsonBody, PathParam},
    state::AppState,
};

const NO_USER: &str = "No user found with this id";

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/login", post(login))
        .route("/users/logout", post(logout))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, AppError> {
    let users = state.users.find_all().await?;
    Ok(Json(users))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    PathParam(id): PathParam<i32>,
) -> Result<Json<UserDetails>, AppError> {
    match state.users.find_details(id).await? {
        Some(details) => Ok(Json(details)),
        None => {
            warn!(%id, "user not found");
            Err(AppError::not_found(NO_USER))
        }
    }
}

#[instrument(skip(state, session, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    session: Session,
    JsonBody(payload): JsonBody<CreateUserRequest>,
) -> Result<(SetCookie, Json<User>), AppError> {
    let insert = before_create(payload).map_err(|e| {
        warn!(error = %e, "signup rejected");
        e
    })?;
    let user = state.users.create(insert).await.map_err(|e| {
        warn!(error = %e, "create user failed");
        AppError::from(e)
    })?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    let cookie = session.login(user.id, &user.username);
    Ok((cookie, Json(user)))
}

#[instrument(skip(state, session, payload))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<(SetCookie, Json<LoginResponse>), AppError> {
    let email = payload.email.trim();
    let user = match state.users.find_by_email(email).await? {
        Some(user) => user,
        None => {
            warn!(%email, "login unknown email");
            return Err(AppError::Authentication("No user with that email address!"));
        }
    };

    if !user.check_password(&payload.password)? {
        warn!(%email, user_id = %user.id, "login invalid password");
        return Err(AppError::Authentication("Incorrect password!"));
    }

    info!(user_id = %user.id, %email, "user logged in");
    let cookie = session.login(user.id, &user.username);
    Ok((
        cookie,
        Json(LoginResponse {
            user,
            message: "You are now logged in!",
        }),
    ))
}

#[instrument(skip(session))]
pub async fn logout(session: Session) -> Response {
    match session.logout() {
        Some(cookie) => (StatusCode::NO_CONTENT, cookie).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    PathParam(id): PathParam<i32>,
    JsonBody(payload): JsonBody<UpdateUserRequest>,
) -> Result<Json<RowsAffected>, AppError> {
    let changes = before_update(payload)?;
    let rows_affected = state.users.update(id, changes).await?;
    if rows_affected == 0 {
        warn!(%id, "update matched no user");
        return Err(AppError::not_found(NO_USER));
    }
    info!(%id, "user updated");
    Ok(Json(RowsAffected { rows_affected }))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    PathParam(id): PathParam<i32>,
) -> Result<Json<RowsAffected>, AppError> {
    let rows_affected = state.users.destroy(id).await?;
    if rows_affected == 0 {
        warn!(%id, "delete matched no user");
        return Err(AppError::not_found(NO_USER));
    }
    let sessions = state.sessions.destroy_user(id);
    info!(%id, sessions, "user deleted");
    Ok(Json(RowsAffected { rows_affected }))
}

#[cfg(test)]
mod tests {
    use axum::{http::Method, Router};
    use serde_json::{json, Value};

    use crate::app::{
        build_app,
        testing::{call, Reply},
    };
    use crate::state::AppState;

    fn app() -> (AppState, Router) {
        let state = AppState::fake();
        (state.clone(), build_app(state))
    }

    async fn signup(app: &Router, name: &str) -> Reply {
        call(
            app,
            Method::POST,
            "/api/users",
            None,
            Some(json!({
                "username": name,
                "email": format!("{name}@example.com"),
                "password": "secret1",
            })),
        )
        .await
    }

    #[tokio::test]
    async fn signup_returns_user_without_password_and_logs_in() {
        let (state, app) = app();
        let reply = signup(&app, "alice").await;

        assert_eq!(reply.status, 200);
        assert_eq!(reply.body["username"], "alice");
        assert_eq!(reply.body["email"], "alice@example.com");
        assert!(reply.body.get("password").is_none());
        assert!(reply.cookie.is_some());

        let stored = state
            .users
            .find_by_email("alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_ne!(stored.password, "secret1");
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let (state, app) = app();
        signup(&app, "alice").await;
        let reply = signup(&app, "alice").await;

        assert_eq!(reply.status, 400);
        assert_eq!(reply.body["message"], "email must be unique");
        assert!(reply.cookie.is_none());
        assert_eq!(state.users.find_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn short_password_is_rejected() {
        let (state, app) = app();
        let reply = call(
            &app,
            Method::POST,
            "/api/users",
            None,
            Some(json!({ "username": "bob", "email": "bob@example.com", "password": "abc" })),
        )
        .await;

        assert_eq!(reply.status, 400);
        assert!(state.users.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn login_checks_credentials() {
        let (_, app) = app();
        signup(&app, "alice").await;

        let ok = call(
            &app,
            Method::POST,
            "/api/users/login",
            None,
            Some(json!({ "email": "alice@example.com", "password": "secret1" })),
        )
        .await;
        assert_eq!(ok.status, 200);
        assert_eq!(ok.body["message"], "You are now logged in!");
        assert_eq!(ok.body["user"]["username"], "alice");
        assert!(ok.cookie.is_some());

        let wrong = call(
            &app,
            Method::POST,
            "/api/users/login",
            None,
            Some(json!({ "email": "alice@example.com", "password": "nope" })),
        )
        .await;
        assert_eq!(wrong.status, 400);
        assert_eq!(wrong.body["message"], "Incorrect password!");
        assert!(wrong.cookie.is_none());

        let unknown = call(
            &app,
            Method::POST,
            "/api/users/login",
            None,
            Some(json!({ "email": "ghost@example.com", "password": "secret1" })),
        )
        .await;
        assert_eq!(unknown.status, 400);
        assert_eq!(unknown.body["message"], "No user with that email address!");
    }

    #[tokio::test]
    async fn logout_needs_a_session() {
        let (_, app) = app();
        let anonymous = call(&app, Method::POST, "/api/users/logout", None, None).await;
        assert_eq!(anonymous.status, 404);

        let cookie = signup(&app, "alice").await.cookie.unwrap();
        let first = call(&app, Method::POST, "/api/users/logout", Some(&cookie), None).await;
        assert_eq!(first.status, 204);
        assert!(first.cookie.is_some());

        let second = call(&app, Method::POST, "/api/users/logout", Some(&cookie), None).await;
        assert_eq!(second.status, 404);
    }

    #[tokio::test]
    async fn missing_user_is_404() {
        let (_, app) = app();
        let get = call(&app, Method::GET, "/api/users/999", None, None).await;
        assert_eq!(get.status, 404);

        let delete = call(&app, Method::DELETE, "/api/users/999", None, None).await;
        assert_eq!(delete.status, 404);
        assert_eq!(delete.body, json!({ "message": "No user found with this id" }));

        let update = call(
            &app,
            Method::PUT,
            "/api/users/999",
            None,
            Some(json!({ "username": "x" })),
        )
        .await;
        assert_eq!(update.status, 404);
    }

    #[tokio::test]
    async fn details_include_associations() {
        let (_, app) = app();
        let alice = signup(&app, "alice").await;
        let cookie = alice.cookie.unwrap();
        let id = alice.body["id"].as_i64().unwrap();

        let post = call(
            &app,
            Method::POST,
            "/api/posts",
            Some(&cookie),
            Some(json!({ "title": "Rust 2.0", "post_url": "https://example.com/rust" })),
        )
        .await;
        let post_id = post.body["id"].clone();
        call(
            &app,
            Method::POST,
            "/api/comments",
            Some(&cookie),
            Some(json!({ "comment_text": "first", "post_id": post_id })),
        )
        .await;
        call(
            &app,
            Method::PUT,
            "/api/posts/upvote",
            Some(&cookie),
            Some(json!({ "post_id": post_id })),
        )
        .await;

        let details = call(&app, Method::GET, &format!("/api/users/{id}"), None, None).await;
        assert_eq!(details.status, 200);
        assert_eq!(details.body["username"], "alice");
        assert!(details.body.get("password").is_none());
        assert_eq!(details.body["posts"][0]["title"], "Rust 2.0");
        assert_eq!(details.body["comments"][0]["comment_text"], "first");
        assert_eq!(details.body["comments"][0]["post"]["title"], "Rust 2.0");
        assert_eq!(details.body["voted_posts"][0]["title"], "Rust 2.0");
    }

    #[tokio::test]
    async fn update_rehashes_password_and_validates() {
        let (state, app) = app();
        let id = signup(&app, "alice").await.body["id"].as_i64().unwrap();
        let before = state
            .users
            .find_by_email("alice@example.com")
            .await
            .unwrap()
            .unwrap()
            .password;

        let ok = call(
            &app,
            Method::PUT,
            &format!("/api/users/{id}"),
            None,
            Some(json!({ "password": "another1" })),
        )
        .await;
        assert_eq!(ok.status, 200);
        assert_eq!(ok.body["rows_affected"], 1);

        let after = state
            .users
            .find_by_email("alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_ne!(after.password, before);
        assert_ne!(after.password, "another1");
        assert!(after.check_password("another1").unwrap());

        let bad_email = call(
            &app,
            Method::PUT,
            &format!("/api/users/{id}"),
            None,
            Some(json!({ "email": "not-an-email" })),
        )
        .await;
        assert_eq!(bad_email.status, 400);

        let empty = call(&app, Method::PUT, &format!("/api/users/{id}"), None, Some(json!({}))).await;
        assert_eq!(empty.status, 400);
    }

    #[tokio::test]
    async fn list_never_exposes_passwords() {
        let (_, app) = app();
        signup(&app, "alice").await;
        signup(&app, "bob").await;

        let reply = call(&app, Method::GET, "/api/users", None, None).await;
        assert_eq!(reply.status, 200);
        let users = reply.body.as_array().unwrap();
        assert_eq!(users.len(), 2);
        assert!(users.iter().all(|u: &Value| u.get("password").is_none()));
    }

    #[tokio::test]
    async fn non_numeric_id_is_a_json_400() {
        let (_, app) = app();
        let reply = call(&app, Method::GET, "/api/users/abc", None, None).await;
        assert_eq!(reply.status, 400);
        assert!(reply.body["message"].is_string());
    }

    #[tokio::test]
    async fn malformed_signup_body_is_a_json_400() {
        let (_, app) = app();
        let reply = call(
            &app,
            Method::POST,
            "/api/users",
            None,
            Some(json!({ "username": 7, "email": "a@example.com", "password": "secret1" })),
        )
        .await;
        assert_eq!(reply.status, 400);
        assert!(reply.body["message"].is_string());
    }

    #[tokio::test]
    async fn deleting_a_user_ends_their_sessions() {
        let (_, app) = app();
        let alice = signup(&app, "alice").await;
        let cookie = alice.cookie.unwrap();
        let id = alice.body["id"].as_i64().unwrap();

        let deleted = call(&app, Method::DELETE, &format!("/api/users/{id}"), None, None).await;
        assert_eq!(deleted.status, 200);

        let reply = call(
            &app,
            Method::POST,
            "/api/posts",
            Some(&cookie),
            Some(json!({ "title": "ghost", "post_url": "https://example.com" })),
        )
        .await;
        assert_eq!(reply.status, 401);
        assert_eq!(reply.body["message"], "Please log in");
    }
}
