//! Error type for `roost-graph`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Connection failure, timeout, or a body that was not the promised JSON.
  #[error("transport error: {0}")]
  Transport(#[from] reqwest::Error),

  /// A non-success status from the platform, with the message pulled out of
  /// the `error.message` body field when present.
  #[error("graph api error (status {status}): {message}")]
  Api { status: u16, message: String },

  /// HTTP 429. Kept separate from [`Error::Api`] so callers can tell
  /// throttling apart from genuine failures.
  #[error("rate limited by the platform: {message}")]
  RateLimited { message: String },

  #[error("unexpected response shape: {0}")]
  Decode(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
