use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

/// User record in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String, // Argon2 hash, not exposed in JSON
}

/// A row ready for insertion. Only the pre-save hook in `users::services`
/// can build one, so plaintext passwords never reach storage.
#[derive(Debug, Clone)]
pub struct UserInsert {
    username: String,
    email: String,
    password_hash: String,
}

impl UserInsert {
    pub(super) fn new(username: String, email: String, password_hash: String) -> Self {
        Self {
            username,
            email,
            password_hash,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    #[cfg(test)]
    pub(crate) fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }
}

/// Validated column changes for a single row, password already re-hashed.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    username: Option<String>,
    email: Option<String>,
    password_hash: Option<String>,
}

impl UserUpdate {
    pub(super) fn new(
        username: Option<String>,
        email: Option<String>,
        password_hash: Option<String>,
    ) -> Self {
        Self {
            username,
            email,
            password_hash,
        }
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn password_hash(&self) -> Option<&str> {
        self.password_hash.as_deref()
    }
}

#[derive(Debug, Clone, Serialize, FromRow, PartialEq)]
pub struct UserPost {
    pub id: i32,
    pub title: String,
    pub post_url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PostTitle {
    pub title: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserComment {
    pub id: i32,
    pub comment_text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub post: PostTitle,
}

/// Flat join row behind `UserComment`.
#[derive(Debug, FromRow)]
pub struct UserCommentRow {
    pub id: i32,
    pub comment_text: String,
    pub created_at: OffsetDateTime,
    pub post_title: String,
}

impl From<UserCommentRow> for UserComment {
    fn from(r: UserCommentRow) -> Self {
        Self {
            id: r.id,
            comment_text: r.comment_text,
            created_at: r.created_at,
            post: PostTitle { title: r.post_title },
        }
    }
}

/// A user together with everything they wrote or voted for.
#[derive(Debug, Clone, Serialize)]
pub struct UserDetails {
    #[serde(flatten)]
    pub user: User,
    pub posts: Vec<UserPost>,
    pub comments: Vec<UserComment>,
    pub voted_posts: Vec<PostTitle>,
}
