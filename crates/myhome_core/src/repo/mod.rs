//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Incidence writes enforce `Incidence::validate()` before persistence.
//! - Repositories never open or commit transactions; the caller owns the
//!   unit of work and hands in a connection or transaction.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::incidence::{IncidenceId, IncidenceValidationError};
use rusqlite::Connection;
use thiserror::Error;

pub mod directory_repo;
pub mod incidence_repo;
pub mod page;

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error for persistence and query operations.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Validation(#[from] IncidenceValidationError),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("incidence not found: {0}")]
    NotFound(IncidenceId),
    #[error("repository requires schema version {expected_version}, got {actual_version}")]
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Rejects connections that did not go through `db::open_db*`.
pub(crate) fn ensure_schema_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    Ok(())
}
