//! Error types for `roost-vault`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("vault key must be 32 bytes, got {0}")]
  InvalidKey(usize),

  #[error("vault key is not valid base64: {0}")]
  KeyEncoding(#[from] base64::DecodeError),

  #[error("malformed credential envelope: {0}")]
  MalformedEnvelope(String),

  /// Authentication failed: wrong key, or the envelope was tampered with.
  #[error("credential decryption failed")]
  Decryption,

  #[error("credential encryption failed")]
  Encryption,

  #[error("decrypted credential is not valid UTF-8")]
  NotUtf8(#[from] std::string::FromUtf8Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
