//! Authenticated encryption for page credentials.
//!
//! Access tokens are sealed with ChaCha20-Poly1305 before they touch the
//! database and unsealed only inside job handlers, so a copied database file
//! leaks nothing without the key. The sealed form is a printable envelope:
//!
//! ```text
//! base64(nonce) ":" base64(tag) ":" base64(ciphertext)
//! ```
//!
//! A fresh random nonce is drawn per encryption, which is why sealing the
//! same token twice yields different envelopes.

pub mod error;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chacha20poly1305::{
  ChaCha20Poly1305, Key, Nonce,
  aead::{Aead, AeadCore, KeyInit, OsRng},
};

pub use crate::error::{Error, Result};

/// ChaCha20-Poly1305 nonce length in bytes.
const NONCE_LEN: usize = 12;
/// Poly1305 authentication tag length in bytes.
const TAG_LEN: usize = 16;

// ─── Vault ───────────────────────────────────────────────────────────────────

/// Seals and unseals credential strings with a single symmetric key.
///
/// Cloning is cheap; clones share the key schedule.
#[derive(Clone)]
pub struct CredentialVault {
  cipher: ChaCha20Poly1305,
}

impl CredentialVault {
  pub fn new(key: [u8; 32]) -> Self {
    Self { cipher: ChaCha20Poly1305::new(Key::from_slice(&key)) }
  }

  /// Build a vault from a base64-encoded 32-byte key, the form keys take in
  /// configuration.
  pub fn from_base64(encoded: &str) -> Result<Self> {
    let bytes = BASE64.decode(encoded.trim())?;
    let key: [u8; 32] =
      bytes.try_into().map_err(|b: Vec<u8>| Error::InvalidKey(b.len()))?;
    Ok(Self::new(key))
  }

  /// Seal a plaintext credential into a printable envelope.
  pub fn encrypt(&self, plaintext: &str) -> Result<String> {
    let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
    let mut sealed = self
      .cipher
      .encrypt(&nonce, plaintext.as_bytes())
      .map_err(|_| Error::Encryption)?;
    // The aead crate appends the tag to the ciphertext; the envelope keeps
    // them as separate segments.
    let tag = sealed.split_off(sealed.len() - TAG_LEN);

    Ok(format!(
      "{}:{}:{}",
      BASE64.encode(nonce),
      BASE64.encode(tag),
      BASE64.encode(sealed),
    ))
  }

  /// Unseal an envelope produced by [`CredentialVault::encrypt`].
  ///
  /// Structural problems (wrong segment count, bad base64, wrong nonce or
  /// tag length) surface as [`Error::MalformedEnvelope`]; an intact envelope
  /// that fails authentication surfaces as [`Error::Decryption`].
  pub fn decrypt(&self, envelope: &str) -> Result<String> {
    let segments: Vec<&str> = envelope.split(':').collect();
    let [nonce_b64, tag_b64, ciphertext_b64] = segments[..] else {
      return Err(Error::MalformedEnvelope(format!(
        "expected 3 segments, got {}",
        segments.len()
      )));
    };

    let nonce = BASE64
      .decode(nonce_b64)
      .map_err(|e| Error::MalformedEnvelope(format!("nonce: {e}")))?;
    let tag = BASE64
      .decode(tag_b64)
      .map_err(|e| Error::MalformedEnvelope(format!("tag: {e}")))?;
    let mut sealed = BASE64
      .decode(ciphertext_b64)
      .map_err(|e| Error::MalformedEnvelope(format!("ciphertext: {e}")))?;

    if nonce.len() != NONCE_LEN {
      return Err(Error::MalformedEnvelope(format!(
        "nonce must be {NONCE_LEN} bytes, got {}",
        nonce.len()
      )));
    }
    if tag.len() != TAG_LEN {
      return Err(Error::MalformedEnvelope(format!(
        "tag must be {TAG_LEN} bytes, got {}",
        tag.len()
      )));
    }

    sealed.extend_from_slice(&tag);
    let plaintext = self
      .cipher
      .decrypt(Nonce::from_slice(&nonce), sealed.as_ref())
      .map_err(|_| Error::Decryption)?;

    Ok(String::from_utf8(plaintext)?)
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
