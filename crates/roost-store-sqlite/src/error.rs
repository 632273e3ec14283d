//! Error type for `roost-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] roost_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("column decode error: {0}")]
  Decode(String),

  /// Attempted a transition on a job that was not found.
  #[error("job not found: {0}")]
  JobNotFound(uuid::Uuid),

  /// Attempted to complete or fail a job that is not running.
  #[error("job {0} is not running")]
  JobNotRunning(uuid::Uuid),

  #[error("page not found: {0}")]
  PageNotFound(uuid::Uuid),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
