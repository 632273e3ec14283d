//! Posts, comments, and analyses: the ingested content itself.
//!
//! Content rows are written by upsert keyed on the platform's own identifiers,
//! so re-ingesting the same window of posts is a no-op rather than a
//! duplicate. Analyses are strictly one-per-comment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analyzer::{AnalysisOutcome, Sentiment};

// ─── Posts ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
  pub post_id:       Uuid,
  pub page_id:       Uuid,
  /// The platform's own identifier; unique per platform.
  pub external_id:   String,
  pub platform:      String,
  pub message:       String,
  pub permalink:     Option<String>,
  /// When the post went up on the platform, not when we saw it.
  pub posted_at:     DateTime<Utc>,
  /// Comment total as reported by the platform at fetch time.
  pub comment_count: u32,
  pub fetched_at:    DateTime<Utc>,
}

/// Input to [`crate::store::ContentStore::upsert_post`].
#[derive(Debug, Clone)]
pub struct NewPost {
  pub page_id:       Uuid,
  pub external_id:   String,
  pub platform:      String,
  pub message:       String,
  pub permalink:     Option<String>,
  pub posted_at:     DateTime<Utc>,
  pub comment_count: u32,
}

// ─── Comments ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
  pub comment_id:  Uuid,
  pub post_id:     Uuid,
  pub external_id: String,
  pub platform:    String,
  pub message:     String,
  pub author_name: Option<String>,
  pub posted_at:   DateTime<Utc>,
  pub like_count:  u32,
  pub fetched_at:  DateTime<Utc>,
}

/// Input to [`crate::store::ContentStore::upsert_comment`].
#[derive(Debug, Clone)]
pub struct NewComment {
  pub post_id:     Uuid,
  pub external_id: String,
  pub platform:    String,
  pub message:     String,
  pub author_name: Option<String>,
  pub posted_at:   DateTime<Utc>,
  pub like_count:  u32,
}

// ─── Analyses ────────────────────────────────────────────────────────────────

/// The recorded result of scoring one comment. At most one row exists per
/// comment; re-analysis is a skip, not an overwrite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
  pub analysis_id:     Uuid,
  pub comment_id:      Uuid,
  pub sentiment:       Sentiment,
  /// Confidence in the sentiment label, in `[0, 1]`.
  pub sentiment_score: f64,
  /// Estimated toxicity, in `[0, 1]`.
  pub toxicity_score:  f64,
  /// ISO 639-1 language code.
  pub language:        String,
  pub keywords:        Vec<String>,
  pub analyzed_at:     DateTime<Utc>,
}

/// Input to [`crate::store::ContentStore::insert_analysis`].
#[derive(Debug, Clone)]
pub struct NewAnalysis {
  pub comment_id:      Uuid,
  pub sentiment:       Sentiment,
  pub sentiment_score: f64,
  pub toxicity_score:  f64,
  pub language:        String,
  pub keywords:        Vec<String>,
}

impl NewAnalysis {
  pub fn from_outcome(comment_id: Uuid, outcome: AnalysisOutcome) -> Self {
    Self {
      comment_id,
      sentiment:       outcome.sentiment,
      sentiment_score: outcome.sentiment_score,
      toxicity_score:  outcome.toxicity_score,
      language:        outcome.language,
      keywords:        outcome.keywords,
    }
  }
}

// ─── PruneCounts ─────────────────────────────────────────────────────────────

/// Rows removed by one retention or orphan pass.
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
)]
pub struct PruneCounts {
  pub posts:    u64,
  pub comments: u64,
  pub analyses: u64,
}

impl PruneCounts {
  pub fn total(&self) -> u64 {
    self.posts + self.comments + self.analyses
  }
}

impl std::ops::AddAssign for PruneCounts {
  fn add_assign(&mut self, other: Self) {
    self.posts += other.posts;
    self.comments += other.comments;
    self.analyses += other.analyses;
  }
}
