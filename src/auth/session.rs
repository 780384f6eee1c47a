use std::sync::Arc;

use dashmap::DashMap;
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::config::SessionConfig;

/// What a request knows about its caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticated { user_id: i32, username: String },
}

#[derive(Debug, Clone)]
struct SessionEntry {
    user_id: i32,
    username: String,
    expires_at: OffsetDateTime,
}

/// Server-side session storage keyed by the opaque id carried in the cookie.
/// Only authenticated sessions are stored.
#[derive(Clone)]
pub struct SessionStore {
    entries: Arc<DashMap<Uuid, SessionEntry>>,
    config: Arc<SessionConfig>,
}

impl SessionStore {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn ttl(&self) -> Duration {
        Duration::minutes(self.config.ttl_minutes)
    }

    /// Starts an authenticated session and returns its id.
    pub fn save(&self, user_id: i32, username: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.entries.insert(
            id,
            SessionEntry {
                user_id,
                username: username.to_string(),
                expires_at: OffsetDateTime::now_utc() + self.ttl(),
            },
        );
        debug!(%user_id, "session saved");
        id
    }

    /// Expired sessions are dropped on read.
    pub fn load(&self, id: &Uuid) -> SessionState {
        let entry = self.entries.get(id).map(|e| e.value().clone());
        match entry {
            Some(e) if e.expires_at > OffsetDateTime::now_utc() => SessionState::Authenticated {
                user_id: e.user_id,
                username: e.username,
            },
            Some(_) => {
                self.entries.remove(id);
                debug!(session = %id, "expired session dropped");
                SessionState::Anonymous
            }
            None => SessionState::Anonymous,
        }
    }

    pub fn destroy(&self, id: &Uuid) -> bool {
        self.entries.remove(id).is_some()
    }

    /// Drops every session belonging to `user_id`. Returns how many went.
    pub fn destroy_user(&self, user_id: i32) -> usize {
        let mut dropped = 0;
        self.entries.retain(|_, e| {
            let keep = e.user_id != user_id;
            dropped += usize::from(!keep);
            keep
        });
        dropped
    }

    pub fn purge_expired(&self) -> usize {
        let now = OffsetDateTime::now_utc();
        let before = self.entries.len();
        self.entries.retain(|_, e| e.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    pub fn set_cookie(&self, id: &Uuid) -> String {
        format!(
            "{}={}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}{}",
            self.config.cookie_name,
            id,
            self.ttl().whole_seconds(),
            if self.config.secure { "; Secure" } else { "" }
        )
    }

    pub fn clear_cookie(&self) -> String {
        format!(
            "{}=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0{}",
            self.config.cookie_name,
            if self.config.secure { "; Secure" } else { "" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(ttl_minutes: i64) -> SessionStore {
        SessionStore::new(SessionConfig {
            ttl_minutes,
            ..Default::default()
        })
    }

    #[test]
    fn save_load_destroy() {
        let sessions = store(10);
        let id = sessions.save(3, "alice");
        assert_eq!(
            sessions.load(&id),
            SessionState::Authenticated {
                user_id: 3,
                username: "alice".into()
            }
        );
        assert!(sessions.destroy(&id));
        assert!(!sessions.destroy(&id));
        assert_eq!(sessions.load(&id), SessionState::Anonymous);
        assert_eq!(sessions.load(&Uuid::new_v4()), SessionState::Anonymous);
    }

    #[test]
    fn expired_sessions_are_anonymous_and_purged() {
        let sessions = store(0);
        let id = sessions.save(1, "bob");
        assert_eq!(sessions.load(&id), SessionState::Anonymous);
        assert_eq!(sessions.purge_expired(), 0);

        sessions.save(1, "bob");
        sessions.save(2, "carol");
        assert_eq!(sessions.purge_expired(), 2);
    }

    #[test]
    fn destroy_user_drops_only_that_users_sessions() {
        let sessions = store(10);
        let phone = sessions.save(1, "alice");
        let laptop = sessions.save(1, "alice");
        let other = sessions.save(2, "bob");

        assert_eq!(sessions.destroy_user(1), 2);
        assert_eq!(sessions.load(&phone), SessionState::Anonymous);
        assert_eq!(sessions.load(&laptop), SessionState::Anonymous);
        assert!(matches!(sessions.load(&other), SessionState::Authenticated { user_id: 2, .. }));
        assert_eq!(sessions.destroy_user(1), 0);
    }

    #[test]
    fn cookie_attributes() {
        let sessions = SessionStore::new(SessionConfig {
            cookie_name: "sid".into(),
            ttl_minutes: 2,
            secure: true,
        });
        let id = Uuid::nil();
        assert_eq!(
            sessions.set_cookie(&id),
            format!("sid={id}; Path=/; HttpOnly; SameSite=Strict; Max-Age=120; Secure")
        );
        assert_eq!(
            sessions.clear_cookie(),
            "sid=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0; Secure"
        );
    }
}
