use std::collections::HashMap;

use async_trait::async_trait;

use super::repo_types::{Post, PostComment, PostCommentRow, PostInsert, PostView, PostViewRow};
use crate::db::{DbResult, PgStore};

#[async_trait]
pub trait PostRepo: Send + Sync {
    /// Every post, newest first, with author, vote count and comments.
    async fn find_all(&self) -> DbResult<Vec<PostView>>;

    async fn find_view(&self, id: i32) -> DbResult<Option<PostView>>;

    async fn create(&self, post: PostInsert) -> DbResult<Post>;

    /// Renames a post owned by `user_id`. Rows affected.
    async fn update_title(&self, id: i32, user_id: i32, title: &str) -> DbResult<u64>;

    /// Deletes a post owned by `user_id`; its comments and votes go with it.
    async fn destroy(&self, id: i32, user_id: i32) -> DbResult<u64>;

    /// Records a vote. A second vote for the same pair is a unique violation.
    async fn upvote(&self, user_id: i32, post_id: i32) -> DbResult<()>;
}

const POST_VIEW_SELECT: &str = r#"
    SELECT p.id, p.title, p.post_url, p.created_at, u.username,
           (SELECT COUNT(*) FROM votes v WHERE v.post_id = p.id) AS vote_count
    FROM posts p
    JOIN users u ON u.id = p.user_id
"#;

impl PgStore {
    async fn comments_for_posts(&self, post_ids: &[i32]) -> DbResult<HashMap<i32, Vec<PostComment>>> {
        let rows = sqlx::query_as::<_, PostCommentRow>(
            r#"
            SELECT c.id, c.comment_text, c.post_id, c.user_id, c.created_at, u.username
            FROM comments c
            JOIN users u ON u.id = c.user_id
            WHERE c.post_id = ANY($1)
            ORDER BY c.created_at, c.id
            "#,
        )
        .bind(post_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_post: HashMap<i32, Vec<PostComment>> = HashMap::new();
        for row in rows {
            by_post.entry(row.post_id).or_default().push(row.into());
        }
        Ok(by_post)
    }
}

#[async_trait]
impl PostRepo for PgStore {
    async fn find_all(&self) -> DbResult<Vec<PostView>> {
        let rows = sqlx::query_as::<_, PostViewRow>(&format!(
            "{POST_VIEW_SELECT} ORDER BY p.created_at DESC, p.id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();
        let mut comments = self.comments_for_posts(&ids).await?;
        Ok(rows
            .into_iter()
            .map(|r| {
                let c = comments.remove(&r.id).unwrap_or_default();
                r.into_view(c)
            })
            .collect())
    }

    async fn find_view(&self, id: i32) -> DbResult<Option<PostView>> {
        let Some(row) = sqlx::query_as::<_, PostViewRow>(&format!("{POST_VIEW_SELECT} WHERE p.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let comments = self
            .comments_for_posts(&[id])
            .await?
            .remove(&id)
            .unwrap_or_default();
        Ok(Some(row.into_view(comments)))
    }

    async fn create(&self, post: PostInsert) -> DbResult<Post> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (title, post_url, user_id)
            VALUES ($1, $2, $3)
            RETURNING id, title, post_url, user_id, created_at, updated_at
            "#,
        )
        .bind(post.title())
        .bind(post.post_url())
        .bind(post.user_id())
        .fetch_one(&self.pool)
        .await?;
        Ok(post)
    }

    async fn update_title(&self, id: i32, user_id: i32, title: &str) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET title = $3, updated_at = now()
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(title)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn destroy(&self, id: i32, user_id: i32) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn upvote(&self, user_id: i32, post_id: i32) -> DbResult<()> {
        sqlx::query("INSERT INTO votes (user_id, post_id) VALUES ($1, $2)")
            .bind(user_id)
            .bind(post_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
