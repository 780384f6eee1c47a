use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::session::SessionStore;
use crate::comments::repo::CommentRepo;
use crate::config::{AppConfig, SessionConfig, StorageBackend};
use crate::db::PgStore;
use crate::memory::MemoryStore;
use crate::posts::repo::PostRepo;
use crate::users::repo::UserRepo;

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepo>,
    pub posts: Arc<dyn PostRepo>,
    pub comments: Arc<dyn CommentRepo>,
    pub sessions: SessionStore,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let state = match &config.storage {
            StorageBackend::Postgres {
                database_url,
                max_connections,
            } => {
                let store = PgStore::connect(database_url, *max_connections).await?;
                store.migrate().await?;
                info!(max_connections, "connected to postgres");
                Self::from_store(Arc::new(store), config)
            }
            StorageBackend::Memory => {
                warn!("using in-process storage; data is lost on restart");
                Self::from_store(Arc::new(MemoryStore::new()), config)
            }
        };
        Ok(state)
    }

    pub fn from_store<S>(store: Arc<S>, config: AppConfig) -> Self
    where
        S: UserRepo + PostRepo + CommentRepo + 'static,
    {
        Self {
            users: store.clone(),
            posts: store.clone(),
            comments: store,
            sessions: SessionStore::new(config.session),
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        let config = AppConfig {
            storage: StorageBackend::Memory,
            session: SessionConfig {
                cookie_name: "sid".into(),
                ttl_minutes: 5,
                secure: false,
            },
        };
        Self::from_store(Arc::new(MemoryStore::new()), config)
    }
}
