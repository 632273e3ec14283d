//! Accounts and pages: the credential-owning side of the domain.
//!
//! An account is a tenant; a page is one connected social-platform presence
//! belonging to it. The page row carries the encrypted API credential; the
//! plaintext token exists only transiently inside handlers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Days of content an account keeps before the cleanup job prunes it.
pub const DEFAULT_RETENTION_DAYS: u32 = 90;

// ─── Account ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
  pub account_id:     Uuid,
  pub display_name:   String,
  /// Content older than this many days is pruned by the cleanup job.
  pub retention_days: u32,
  pub created_at:     DateTime<Utc>,
}

/// Input to [`crate::store::ContentStore::add_account`].
#[derive(Debug, Clone)]
pub struct NewAccount {
  pub display_name:   String,
  pub retention_days: u32,
}

impl NewAccount {
  pub fn new(display_name: impl Into<String>) -> Self {
    Self {
      display_name:   display_name.into(),
      retention_days: DEFAULT_RETENTION_DAYS,
    }
  }
}

// ─── Page ────────────────────────────────────────────────────────────────────

/// A connected social-platform page. Identified internally by `page_id` and
/// externally by the `(external_id, platform)` pair, which is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
  pub page_id:          Uuid,
  pub account_id:       Uuid,
  /// The platform's own identifier for the page.
  pub external_id:      String,
  pub platform:         String,
  pub name:             String,
  /// AEAD envelope produced by the credential vault. Never serialised
  /// outward; the plaintext token never touches the store at all.
  #[serde(skip_serializing, default)]
  pub encrypted_token:  String,
  pub token_expires_at: Option<DateTime<Utc>>,
  /// Inactive pages are skipped by ingestion and token refresh, and their
  /// content is dropped by the orphan sweep.
  pub is_active:        bool,
  pub connected_at:     DateTime<Utc>,
}

/// Input to [`crate::store::ContentStore::add_page`].
/// The token must already be encrypted by the caller.
#[derive(Debug, Clone)]
pub struct NewPage {
  pub account_id:       Uuid,
  pub external_id:      String,
  pub platform:         String,
  pub name:             String,
  pub encrypted_token:  String,
  pub token_expires_at: Option<DateTime<Utc>>,
}
