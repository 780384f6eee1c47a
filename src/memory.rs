//! In-process storage backend.
//!
//! Mirrors the Postgres schema closely enough that handlers cannot tell the
//! difference: ids are sequential, `users.email` and `(user_id, post_id)` in
//! `votes` are unique, inserts check their foreign keys, and deletes cascade
//! the same way the `ON DELETE CASCADE` clauses in `migrations/` do.
//!
//! Lock order is `email_index`, then `users`, then `posts`, then `comments`
//! and `votes`. No guard on a later map is held while taking an earlier one.
//! Foreign key checks keep the parent's guard until the child is inserted, so
//! a concurrent delete either sees the child and cascades it or wins first.

use std::sync::atomic::{AtomicI32, Ordering};

use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap, DashSet};
use time::OffsetDateTime;

use crate::{
    comments::{
        repo::CommentRepo,
        repo_types::{Comment, CommentInsert},
    },
    db::{DbError, DbResult},
    posts::{
        repo::PostRepo,
        repo_types::{Author, Post, PostComment, PostInsert, PostView},
    },
    users::{
        repo::UserRepo,
        repo_types::{PostTitle, User, UserComment, UserDetails, UserInsert, UserPost, UserUpdate},
    },
};

#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<i32, User>,
    email_index: DashMap<String, i32>, // users_email_key
    posts: DashMap<i32, Post>,
    comments: DashMap<i32, Comment>,
    votes: DashSet<(i32, i32)>, // (user_id, post_id)
    user_seq: AtomicI32,
    post_seq: AtomicI32,
    comment_seq: AtomicI32,
}

fn next_id(seq: &AtomicI32) -> i32 {
    seq.fetch_add(1, Ordering::Relaxed) + 1
}

fn fk(constraint: &str) -> DbError {
    DbError::ForeignKeyViolation(constraint.to_string())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn username_of(&self, user_id: i32) -> String {
        self.users
            .get(&user_id)
            .map(|u| u.username.clone())
            .unwrap_or_default()
    }

    /// Claims `email` in the unique index. The entry guard is released
    /// before returning, so callers never hold it while touching `users`.
    fn reserve_email(&self, email: &str, id: impl FnOnce() -> i32) -> DbResult<i32> {
        match self.email_index.entry(email.to_string()) {
            Entry::Occupied(_) => Err(DbError::UniqueViolation("users_email_key".into())),
            Entry::Vacant(slot) => {
                let id = id();
                slot.insert(id);
                Ok(id)
            }
        }
    }

    fn cascade_post(&self, post_id: i32) {
        self.comments.retain(|_, c| c.post_id != post_id);
        self.votes.retain(|(_, p)| *p != post_id);
    }

    fn view_of(&self, post: &Post) -> PostView {
        let mut comments: Vec<Comment> = self
            .comments
            .iter()
            .filter(|c| c.post_id == post.id)
            .map(|c| c.value().clone())
            .collect();
        comments.sort_by_key(|c| (c.created_at, c.id));

        PostView {
            id: post.id,
            title: post.title.clone(),
            post_url: post.post_url.clone(),
            created_at: post.created_at,
            vote_count: self.votes.iter().filter(|v| v.1 == post.id).count() as i64,
            user: Author {
                username: self.username_of(post.user_id),
            },
            comments: comments
                .into_iter()
                .map(|c| PostComment {
                    user: Author {
                        username: self.username_of(c.user_id),
                    },
                    id: c.id,
                    comment_text: c.comment_text,
                    post_id: c.post_id,
                    user_id: c.user_id,
                    created_at: c.created_at,
                })
                .collect(),
        }
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn find_all(&self) -> DbResult<Vec<User>> {
        let mut users: Vec<User> = self.users.iter().map(|u| u.value().clone()).collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn find_by_email(&self, email: &str) -> DbResult<Option<User>> {
        let Some(id) = self.email_index.get(email).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|u| u.value().clone()))
    }

    async fn find_details(&self, id: i32) -> DbResult<Option<UserDetails>> {
        let Some(user) = self.users.get(&id).map(|u| u.value().clone()) else {
            return Ok(None);
        };

        let mut posts: Vec<UserPost> = self
            .posts
            .iter()
            .filter(|p| p.user_id == id)
            .map(|p| UserPost {
                id: p.id,
                title: p.title.clone(),
                post_url: p.post_url.clone(),
                created_at: p.created_at,
            })
            .collect();
        posts.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        let authored: Vec<Comment> = self
            .comments
            .iter()
            .filter(|c| c.user_id == id)
            .map(|c| c.value().clone())
            .collect();
        let mut comments: Vec<(i32, UserComment)> = authored
            .into_iter()
            .filter_map(|c| {
                let title = self.posts.get(&c.post_id)?.title.clone();
                Some((
                    c.id,
                    UserComment {
                        id: c.id,
                        comment_text: c.comment_text,
                        created_at: c.created_at,
                        post: PostTitle { title },
                    },
                ))
            })
            .collect();
        comments.sort_by(|(a_id, a), (b_id, b)| (b.created_at, b_id).cmp(&(a.created_at, a_id)));

        let mut voted: Vec<i32> = self
            .votes
            .iter()
            .filter(|v| v.0 == id)
            .map(|v| v.1)
            .collect();
        voted.sort_unstable();
        let voted_posts = voted
            .into_iter()
            .filter_map(|pid| {
                self.posts.get(&pid).map(|p| PostTitle {
                    title: p.title.clone(),
                })
            })
            .collect();

        Ok(Some(UserDetails {
            user,
            posts,
            comments: comments.into_iter().map(|(_, c)| c).collect(),
            voted_posts,
        }))
    }

    async fn create(&self, user: UserInsert) -> DbResult<User> {
        let id = self.reserve_email(user.email(), || next_id(&self.user_seq))?;
        let record = User {
            id,
            username: user.username().to_string(),
            email: user.email().to_string(),
            password: user.password_hash().to_string(),
        };
        self.users.insert(id, record.clone());
        Ok(record)
    }

    async fn update(&self, id: i32, changes: UserUpdate) -> DbResult<u64> {
        let Some(current) = self.users.get(&id).map(|u| u.email.clone()) else {
            return Ok(0);
        };

        let new_email = changes.email().filter(|e| *e != current);
        if let Some(email) = new_email {
            self.reserve_email(email, || id)?;
        }

        let previous = match self.users.get_mut(&id) {
            Some(mut row) => {
                let previous = new_email.map(|e| std::mem::replace(&mut row.email, e.to_string()));
                if let Some(username) = changes.username() {
                    row.username = username.to_string();
                }
                if let Some(hash) = changes.password_hash() {
                    row.password = hash.to_string();
                }
                previous
            }
            None => {
                if let Some(email) = new_email {
                    self.email_index.remove_if(email, |_, owner| *owner == id);
                }
                return Ok(0);
            }
        };

        if let Some(old) = previous {
            self.email_index.remove_if(&old, |_, owner| *owner == id);
        }
        Ok(1)
    }

    async fn destroy(&self, id: i32) -> DbResult<u64> {
        let Some((_, user)) = self.users.remove(&id) else {
            return Ok(0);
        };
        self.email_index.remove_if(&user.email, |_, owner| *owner == id);

        let owned: Vec<i32> = self
            .posts
            .iter()
            .filter(|p| p.user_id == id)
            .map(|p| p.id)
            .collect();
        for post_id in owned {
            if self.posts.remove(&post_id).is_some() {
                self.cascade_post(post_id);
            }
        }
        self.comments.retain(|_, c| c.user_id != id);
        self.votes.retain(|(u, _)| *u != id);
        Ok(1)
    }
}

#[async_trait]
impl PostRepo for MemoryStore {
    async fn find_all(&self) -> DbResult<Vec<PostView>> {
        let mut posts: Vec<Post> = self.posts.iter().map(|p| p.value().clone()).collect();
        posts.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(posts.iter().map(|p| self.view_of(p)).collect())
    }

    async fn find_view(&self, id: i32) -> DbResult<Option<PostView>> {
        let Some(post) = self.posts.get(&id).map(|p| p.value().clone()) else {
            return Ok(None);
        };
        Ok(Some(self.view_of(&post)))
    }

    async fn create(&self, post: PostInsert) -> DbResult<Post> {
        let Some(_author) = self.users.get(&post.user_id()) else {
            return Err(fk("posts_user_id_fkey"));
        };
        let now = OffsetDateTime::now_utc();
        let record = Post {
            id: next_id(&self.post_seq),
            title: post.title().to_string(),
            post_url: post.post_url().to_string(),
            user_id: post.user_id(),
            created_at: now,
            updated_at: now,
        };
        self.posts.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_title(&self, id: i32, user_id: i32, title: &str) -> DbResult<u64> {
        match self.posts.get_mut(&id) {
            Some(mut post) if post.user_id == user_id => {
                post.title = title.to_string();
                post.updated_at = OffsetDateTime::now_utc();
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn destroy(&self, id: i32, user_id: i32) -> DbResult<u64> {
        if self.posts.remove_if(&id, |_, p| p.user_id == user_id).is_none() {
            return Ok(0);
        }
        self.cascade_post(id);
        Ok(1)
    }

    async fn upvote(&self, user_id: i32, post_id: i32) -> DbResult<()> {
        let Some(_voter) = self.users.get(&user_id) else {
            return Err(fk("votes_user_id_fkey"));
        };
        let Some(_post) = self.posts.get(&post_id) else {
            return Err(fk("votes_post_id_fkey"));
        };
        if !self.votes.insert((user_id, post_id)) {
            return Err(DbError::UniqueViolation("votes_pkey".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl CommentRepo for MemoryStore {
    async fn find_all(&self) -> DbResult<Vec<Comment>> {
        let mut comments: Vec<Comment> = self.comments.iter().map(|c| c.value().clone()).collect();
        comments.sort_by_key(|c| (c.created_at, c.id));
        Ok(comments)
    }

    async fn create(&self, comment: CommentInsert) -> DbResult<Comment> {
        let Some(_author) = self.users.get(&comment.user_id) else {
            return Err(fk("comments_user_id_fkey"));
        };
        let Some(_post) = self.posts.get(&comment.post_id) else {
            return Err(fk("comments_post_id_fkey"));
        };
        let now = OffsetDateTime::now_utc();
        let record = Comment {
            id: next_id(&self.comment_seq),
            comment_text: comment.comment_text,
            user_id: comment.user_id,
            post_id: comment.post_id,
            created_at: now,
            updated_at: now,
        };
        self.comments.insert(record.id, record.clone());
        Ok(record)
    }

    async fn destroy(&self, id: i32, user_id: i32) -> DbResult<u64> {
        let removed = self
            .comments
            .remove_if(&id, |_, c| c.user_id == user_id)
            .is_some();
        Ok(removed as u64)
    }
}
