//! Job types: the unit of durable, retried work.
//!
//! A job is a row first and a task second: it exists in the store before any
//! worker sees it and survives process restarts. All state transitions go
//! through [`crate::store::JobStore`]; nothing mutates a `Job` in memory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Delivery attempts a job is allowed before it is failed permanently.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

// ─── Kind ────────────────────────────────────────────────────────────────────

/// What a job does. The variant name serves as the `kind` discriminant stored
/// in the database and accepted over the API.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
  /// Pull a page's recent posts and fan out comment fetches.
  FetchPosts,
  /// Pull the comments under a single post and fan out analyses.
  FetchComments,
  /// Score one comment and record the result.
  AnalyzeSentiment,
  /// Re-validate and extend page credentials nearing expiry.
  RefreshTokens,
  /// Apply per-account retention and drop orphaned rows.
  CleanupData,
}

impl JobKind {
  /// The discriminant string stored in the `kind` column.
  /// Must match the `rename_all = "snake_case"` serde tags above.
  pub fn discriminant(&self) -> &'static str {
    match self {
      Self::FetchPosts => "fetch_posts",
      Self::FetchComments => "fetch_comments",
      Self::AnalyzeSentiment => "analyze_sentiment",
      Self::RefreshTokens => "refresh_tokens",
      Self::CleanupData => "cleanup_data",
    }
  }

  /// Inverse of [`JobKind::discriminant`], for rows read back from the
  /// database.
  pub fn from_discriminant(discriminant: &str) -> Result<Self> {
    match discriminant {
      "fetch_posts" => Ok(Self::FetchPosts),
      "fetch_comments" => Ok(Self::FetchComments),
      "analyze_sentiment" => Ok(Self::AnalyzeSentiment),
      "refresh_tokens" => Ok(Self::RefreshTokens),
      "cleanup_data" => Ok(Self::CleanupData),
      other => Err(Error::UnknownJobKind(other.to_owned())),
    }
  }
}

// ─── Status ──────────────────────────────────────────────────────────────────

/// Where a job sits in its lifecycle.
///
/// `Queued → Running → Completed` is the happy path. A failed delivery puts
/// the job back to `Queued` while attempts remain, otherwise `Failed`. Both
/// `Completed` and `Failed` are terminal.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
  Queued,
  Running,
  Completed,
  Failed,
}

impl JobStatus {
  /// The discriminant string stored in the `status` column.
  pub fn discriminant(&self) -> &'static str {
    match self {
      Self::Queued => "queued",
      Self::Running => "running",
      Self::Completed => "completed",
      Self::Failed => "failed",
    }
  }

  pub fn is_terminal(&self) -> bool {
    matches!(self, Self::Completed | Self::Failed)
  }
}

// ─── Job ─────────────────────────────────────────────────────────────────────

/// A unit of durable work. `job_id`, `kind`, `payload`, and `created_at` never
/// change after enqueue; everything else is owned by the store's transition
/// operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
  pub job_id:       Uuid,
  pub kind:         JobKind,
  /// Kind-specific arguments, opaque to the store. Handlers deserialise this
  /// into their own payload types.
  pub payload:      serde_json::Value,
  pub status:       JobStatus,
  /// Deliveries started so far; incremented by the claim, not the failure.
  pub attempts:     u32,
  pub max_attempts: u32,
  /// The job is not eligible to run before this moment. Re-queues with
  /// backoff push it into the future.
  pub scheduled_at: DateTime<Utc>,
  pub started_at:   Option<DateTime<Utc>>,
  pub completed_at: Option<DateTime<Utc>>,
  /// Message from the most recent failed delivery.
  pub last_error:   Option<String>,
  pub created_at:   DateTime<Utc>,
}

// ─── NewJob ──────────────────────────────────────────────────────────────────

/// Input to [`crate::store::JobStore::enqueue`].
/// `created_at` is always set by the store; it is not accepted from callers.
#[derive(Debug, Clone)]
pub struct NewJob {
  pub kind:         JobKind,
  pub payload:      serde_json::Value,
  pub max_attempts: u32,
  /// `None` means eligible immediately.
  pub scheduled_at: Option<DateTime<Utc>>,
}

impl NewJob {
  /// Convenience constructor: default attempt budget, eligible immediately.
  pub fn new(kind: JobKind, payload: serde_json::Value) -> Self {
    Self {
      kind,
      payload,
      max_attempts: DEFAULT_MAX_ATTEMPTS,
      scheduled_at: None,
    }
  }

  /// Defer eligibility until `when`.
  pub fn at(mut self, when: DateTime<Utc>) -> Self {
    self.scheduled_at = Some(when);
    self
  }
}

// ─── QueueStats ──────────────────────────────────────────────────────────────

/// Row counts per status, for operators and tests.
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
)]
pub struct QueueStats {
  pub queued:    u64,
  pub running:   u64,
  pub completed: u64,
  pub failed:    u64,
}

impl QueueStats {
  pub fn total(&self) -> u64 {
    self.queued + self.running + self.completed + self.failed
  }
}
