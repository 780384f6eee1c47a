use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Post {
    pub id: i32,
    pub title: String,
    pub post_url: String,
    pub user_id: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Validated post ready for insertion; built by `posts::services::before_create`.
#[derive(Debug, Clone)]
pub struct PostInsert {
    pub(super) title: String,
    pub(super) post_url: String,
    pub(super) user_id: i32,
}

impl PostInsert {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn post_url(&self) -> &str {
        &self.post_url
    }

    pub fn user_id(&self) -> i32 {
        self.user_id
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Author {
    pub username: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostComment {
    pub id: i32,
    pub comment_text: String,
    pub post_id: i32,
    pub user_id: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub user: Author,
}

/// A post as the API returns it: author, vote count and comments included.
#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    pub id: i32,
    pub title: String,
    pub post_url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub vote_count: i64,
    pub user: Author,
    pub comments: Vec<PostComment>,
}

#[derive(Debug, FromRow)]
pub struct PostViewRow {
    pub id: i32,
    pub title: String,
    pub post_url: String,
    pub created_at: OffsetDateTime,
    pub vote_count: i64,
    pub username: String,
}

#[derive(Debug, FromRow)]
pub struct PostCommentRow {
    pub id: i32,
    pub comment_text: String,
    pub post_id: i32,
    pub user_id: i32,
    pub created_at: OffsetDateTime,
    pub username: String,
}

impl From<PostCommentRow> for PostComment {
    fn from(r: PostCommentRow) -> Self {
        Self {
            id: r.id,
            comment_text: r.comment_text,
            post_id: r.post_id,
            user_id: r.user_id,
            created_at: r.created_at,
            user: Author {
                username: r.username,
            },
        }
    }
}

impl PostViewRow {
    pub fn into_view(self, comments: Vec<PostComment>) -> PostView {
        PostView {
            id: self.id,
            title: self.title,
            post_url: self.post_url,
            created_at: self.created_at,
            vote_count: self.vote_count,
            user: Author {
                username: self.username,
            },
            comments,
        }
    }
}
