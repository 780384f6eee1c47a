use std::convert::Infallible;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderName},
};
use tracing::{info, warn};
use uuid::Uuid;

use super::session::{SessionState, SessionStore};
use crate::{error::AppError, state::AppState};

/// `Set-Cookie` response part produced by login, signup and logout.
pub type SetCookie = [(HeaderName, String); 1];

/// The caller's session, resolved from the session cookie. Never rejects:
/// a missing, unknown or expired cookie is an anonymous session.
pub struct Session {
    id: Option<Uuid>,
    state: SessionState,
    store: SessionStore,
}

impl Session {
    /// anonymous/authenticated -> authenticated. The previous session id, if
    /// any, is discarded and a fresh one is issued.
    pub fn login(self, user_id: i32, username: &str) -> SetCookie {
        if let Some(old) = self.id {
            self.store.destroy(&old);
        }
        let id = self.store.save(user_id, username);
        info!(%user_id, "session established");
        [(header::SET_COOKIE, self.store.set_cookie(&id))]
    }

    /// authenticated -> anonymous. `None` when there was nothing to destroy.
    pub fn logout(self) -> Option<SetCookie> {
        let SessionState::Authenticated { user_id, .. } = self.state else {
            return None;
        };
        if let Some(id) = self.id {
            self.store.destroy(&id);
        }
        info!(%user_id, "session destroyed");
        Some([(header::SET_COOKIE, self.store.clear_cookie())])
    }
}

fn session_id_from(parts: &Parts, cookie_name: &str) -> Option<Uuid> {
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .and_then(|(_, value)| Uuid::parse_str(value).ok())
}

#[async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let store = state.sessions.clone();
        let id = session_id_from(parts, &store.config().cookie_name);
        let session_state = id
            .map(|id| store.load(&id))
            .unwrap_or(SessionState::Anonymous);
        Ok(Session {
            id,
            state: session_state,
            store,
        })
    }
}

/// Guard for routes that need a logged-in caller.
pub struct LoggedIn {
    pub user_id: i32,
    pub username: String,
}

#[async_trait]
impl FromRequestParts<AppState> for LoggedIn {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = match Session::from_request_parts(parts, state).await {
            Ok(session) => session,
            Err(never) => match never {},
        };
        match session.state {
            SessionState::Authenticated { user_id, username } => Ok(LoggedIn { user_id, username }),
            SessionState::Anonymous => {
                warn!(uri = %parts.uri, "anonymous request to protected route");
                Err(AppError::Unauthorized("Please log in".into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with_cookie(cookie: &str) -> Parts {
        Request::builder()
            .header(header::COOKIE, cookie)
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    #[test]
    fn finds_session_cookie_among_others() {
        let id = Uuid::new_v4();
        let parts = parts_with_cookie(&format!("theme=dark; sid={id}; lang=en"));
        assert_eq!(session_id_from(&parts, "sid"), Some(id));
        assert_eq!(session_id_from(&parts, "other"), None);
    }

    #[test]
    fn garbage_cookie_is_ignored() {
        let parts = parts_with_cookie("sid=not-a-uuid");
        assert_eq!(session_id_from(&parts, "sid"), None);
    }

    #[tokio::test]
    async fn login_then_logout_round_trip() {
        let state = AppState::fake();
        let mut parts = parts_with_cookie("");
        let session = Session::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(session.state, SessionState::Anonymous);

        let [(_, cookie)] = session.login(1, "alice");
        let pair = cookie.split(';').next().unwrap().to_string();
        let mut parts = parts_with_cookie(&pair);
        let session = Session::from_request_parts(&mut parts, &state).await.unwrap();
        assert!(matches!(session.state, SessionState::Authenticated { user_id: 1, .. }));
        assert!(session.logout().is_some());

        let mut parts = parts_with_cookie(&pair);
        let session = Session::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(session.state, SessionState::Anonymous);
        assert!(session.logout().is_none());
    }
}
