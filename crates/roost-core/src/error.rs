//! Error types for `roost-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown job kind discriminant: {0:?}")]
  UnknownJobKind(String),

  #[error("unknown sentiment discriminant: {0:?}")]
  UnknownSentiment(String),

  #[error("analysis failed: {0}")]
  Analysis(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
