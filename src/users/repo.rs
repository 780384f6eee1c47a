use async_trait::async_trait;

use super::repo_types::{PostTitle, User, UserComment, UserCommentRow, UserDetails, UserInsert, UserPost, UserUpdate};
use crate::db::{DbResult, PgStore};

#[async_trait]
pub trait UserRepo: Send + Sync {
    /// All users ordered by id.
    async fn find_all(&self) -> DbResult<Vec<User>>;

    async fn find_by_email(&self, email: &str) -> DbResult<Option<User>>;

    /// The user plus authored posts, comments (with their post title) and
    /// voted posts.
    async fn find_details(&self, id: i32) -> DbResult<Option<UserDetails>>;

    async fn create(&self, user: UserInsert) -> DbResult<User>;

    /// Rows affected, 0 when no user has this id.
    async fn update(&self, id: i32, changes: UserUpdate) -> DbResult<u64>;

    async fn destroy(&self, id: i32) -> DbResult<u64>;
}

#[async_trait]
impl UserRepo for PgStore {
    async fn find_all(&self) -> DbResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password
            FROM users
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn find_by_email(&self, email: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_details(&self, id: i32) -> DbResult<Option<UserDetails>> {
        let Some(user) = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let posts = sqlx::query_as::<_, UserPost>(
            r#"
            SELECT id, title, post_url, created_at
            FROM posts
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let comments = sqlx::query_as::<_, UserCommentRow>(
            r#"
            SELECT c.id, c.comment_text, c.created_at, p.title AS post_title
            FROM comments c
            JOIN posts p ON p.id = c.post_id
            WHERE c.user_id = $1
            ORDER BY c.created_at DESC, c.id DESC
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(UserComment::from)
        .collect();

        let voted_posts = sqlx::query_scalar::<_, String>(
            r#"
            SELECT p.title
            FROM votes v
            JOIN posts p ON p.id = v.post_id
            WHERE v.user_id = $1
            ORDER BY p.id
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|title| PostTitle { title })
        .collect();

        Ok(Some(UserDetails {
            user,
            posts,
            comments,
            voted_posts,
        }))
    }

    async fn create(&self, user: UserInsert) -> DbResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password)
            VALUES ($1, $2, $3)
            RETURNING id, username, email, password
            "#,
        )
        .bind(user.username())
        .bind(user.email())
        .bind(user.password_hash())
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn update(&self, id: i32, changes: UserUpdate) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET username = COALESCE($2, username),
                email    = COALESCE($3, email),
                password = COALESCE($4, password)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(changes.username())
        .bind(changes.email())
        .bind(changes.password_hash())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn destroy(&self, id: i32) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
