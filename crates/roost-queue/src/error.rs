use roost_core::job::JobKind;
use thiserror::Error;

/// Why one delivery of one job did not succeed.
///
/// The scheduler records the message on the job row and lets the store's
/// retry policy decide whether the job runs again; nothing here aborts the
/// polling loop itself.
#[derive(Debug, Error)]
pub enum HandlerError {
  /// A row the payload points at does not exist.
  #[error("not found: {0}")]
  NotFound(String),
  /// The stored credential cannot be used; the page needs reconnecting.
  #[error("invalid credential: {0}")]
  InvalidCredential(String),
  #[error("graph API error: {0}")]
  Graph(#[from] roost_graph::Error),
  #[error("vault error: {0}")]
  Vault(#[from] roost_vault::Error),
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
  #[error("analysis failed: {0}")]
  Analyzer(#[from] roost_core::Error),
  #[error("no handler registered for kind \"{}\"", .0.discriminant())]
  UnknownKind(JobKind),
  #[error("malformed payload: {0}")]
  Payload(#[from] serde_json::Error),
  #[error("handler panicked: {0}")]
  Panicked(String),
}

pub type Result<T, E = HandlerError> = std::result::Result<T, E>;
