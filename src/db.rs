use anyhow::Context;
use serde::Serialize;
use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Failure of a repository call. Constraint violations carry the constraint
/// name so callers can tell a duplicate email from a duplicate vote.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("unique constraint {0} violated")]
    UniqueViolation(String),

    #[error("foreign key constraint {0} violated")]
    ForeignKeyViolation(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let constraint = db_err.constraint().unwrap_or("unknown").to_string();
            match db_err.code().as_deref() {
                Some(UNIQUE_VIOLATION) => return DbError::UniqueViolation(constraint),
                Some(FOREIGN_KEY_VIOLATION) => return DbError::ForeignKeyViolation(constraint),
                _ => {}
            }
        }
        DbError::Other(anyhow::Error::new(err))
    }
}

pub type DbResult<T> = Result<T, DbError>;

/// Body returned by update and delete endpoints.
#[derive(Debug, Serialize)]
pub struct RowsAffected {
    pub rows_affected: u64,
}

/// Postgres-backed implementation of the repository traits.
#[derive(Clone)]
pub struct PgStore {
    pub pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("run migrations")?;
        Ok(())
    }
}
