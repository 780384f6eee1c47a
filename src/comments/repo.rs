use async_trait::async_trait;

use super::repo_types::{Comment, CommentInsert};
use crate::db::{DbResult, PgStore};

#[async_trait]
pub trait CommentRepo: Send + Sync {
    async fn find_all(&self) -> DbResult<Vec<Comment>>;

    /// Fails with a foreign key violation when the post or user is gone.
    async fn create(&self, comment: CommentInsert) -> DbResult<Comment>;

    /// Deletes a comment written by `user_id`. Rows affected.
    async fn destroy(&self, id: i32, user_id: i32) -> DbResult<u64>;
}

#[async_trait]
impl CommentRepo for PgStore {
    async fn find_all(&self) -> DbResult<Vec<Comment>> {
        let comments = sqlx::query_as::<_, Comment>(
            r#"
            SELECT id, comment_text, user_id, post_id, created_at, updated_at
            FROM comments
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }

    async fn create(&self, comment: CommentInsert) -> DbResult<Comment> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO comments (comment_text, user_id, post_id)
            VALUES ($1, $2, $3)
            RETURNING id, comment_text, user_id, post_id, created_at, updated_at
            "#,
        )
        .bind(&comment.comment_text)
        .bind(comment.user_id)
        .bind(comment.post_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(comment)
    }

    async fn destroy(&self, id: i32, user_id: i32) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
