//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings with fixed microsecond
//! precision, so lexicographic comparison in SQL matches chronological order.
//! Keyword lists are stored as compact JSON. UUIDs are stored as hyphenated
//! lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use roost_core::{
  analyzer::Sentiment,
  content::{Analysis, Comment, Post},
  job::{Job, JobKind, JobStatus},
  page::{Account, Page},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime ────────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Job status ──────────────────────────────────────────────────────────────

pub fn decode_job_status(s: &str) -> Result<JobStatus> {
  match s {
    "queued" => Ok(JobStatus::Queued),
    "running" => Ok(JobStatus::Running),
    "completed" => Ok(JobStatus::Completed),
    "failed" => Ok(JobStatus::Failed),
    other => Err(Error::Decode(format!("unknown job status: {other:?}"))),
  }
}

// ─── Keywords ────────────────────────────────────────────────────────────────

pub fn encode_keywords(keywords: &[String]) -> Result<String> {
  Ok(serde_json::to_string(keywords)?)
}

pub fn decode_keywords(s: &str) -> Result<Vec<String>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `jobs` row.
pub struct RawJob {
  pub job_id:       String,
  pub kind:         String,
  pub payload:      String,
  pub status:       String,
  pub attempts:     u32,
  pub max_attempts: u32,
  pub scheduled_at: String,
  pub started_at:   Option<String>,
  pub completed_at: Option<String>,
  pub last_error:   Option<String>,
  pub created_at:   String,
}

/// Row mapper for the canonical 11-column `jobs` select list.
pub fn raw_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawJob> {
  Ok(RawJob {
    job_id:       row.get(0)?,
    kind:         row.get(1)?,
    payload:      row.get(2)?,
    status:       row.get(3)?,
    attempts:     row.get(4)?,
    max_attempts: row.get(5)?,
    scheduled_at: row.get(6)?,
    started_at:   row.get(7)?,
    completed_at: row.get(8)?,
    last_error:   row.get(9)?,
    created_at:   row.get(10)?,
  })
}

impl RawJob {
  pub fn into_job(self) -> Result<Job> {
    Ok(Job {
      job_id:       decode_uuid(&self.job_id)?,
      kind:         JobKind::from_discriminant(&self.kind)
        .map_err(Error::Core)?,
      payload:      serde_json::from_str(&self.payload)?,
      status:       decode_job_status(&self.status)?,
      attempts:     self.attempts,
      max_attempts: self.max_attempts,
      scheduled_at: decode_dt(&self.scheduled_at)?,
      started_at:   self.started_at.as_deref().map(decode_dt).transpose()?,
      completed_at: self.completed_at.as_deref().map(decode_dt).transpose()?,
      last_error:   self.last_error,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from an `accounts` row.
pub struct RawAccount {
  pub account_id:     String,
  pub display_name:   String,
  pub retention_days: u32,
  pub created_at:     String,
}

pub fn raw_account(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawAccount> {
  Ok(RawAccount {
    account_id:     row.get(0)?,
    display_name:   row.get(1)?,
    retention_days: row.get(2)?,
    created_at:     row.get(3)?,
  })
}

impl RawAccount {
  pub fn into_account(self) -> Result<Account> {
    Ok(Account {
      account_id:     decode_uuid(&self.account_id)?,
      display_name:   self.display_name,
      retention_days: self.retention_days,
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `pages` row.
pub struct RawPage {
  pub page_id:          String,
  pub account_id:       String,
  pub external_id:      String,
  pub platform:         String,
  pub name:             String,
  pub encrypted_token:  String,
  pub token_expires_at: Option<String>,
  pub is_active:        bool,
  pub connected_at:     String,
}

pub fn raw_page(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawPage> {
  Ok(RawPage {
    page_id:          row.get(0)?,
    account_id:       row.get(1)?,
    external_id:      row.get(2)?,
    platform:         row.get(3)?,
    name:             row.get(4)?,
    encrypted_token:  row.get(5)?,
    token_expires_at: row.get(6)?,
    is_active:        row.get(7)?,
    connected_at:     row.get(8)?,
  })
}

impl RawPage {
  pub fn into_page(self) -> Result<Page> {
    Ok(Page {
      page_id:          decode_uuid(&self.page_id)?,
      account_id:       decode_uuid(&self.account_id)?,
      external_id:      self.external_id,
      platform:         self.platform,
      name:             self.name,
      encrypted_token:  self.encrypted_token,
      token_expires_at: self
        .token_expires_at
        .as_deref()
        .map(decode_dt)
        .transpose()?,
      is_active:        self.is_active,
      connected_at:     decode_dt(&self.connected_at)?,
    })
  }
}

/// Raw values read directly from a `posts` row.
pub struct RawPost {
  pub post_id:       String,
  pub page_id:       String,
  pub external_id:   String,
  pub platform:      String,
  pub message:       String,
  pub permalink:     Option<String>,
  pub posted_at:     String,
  pub comment_count: u32,
  pub fetched_at:    String,
}

pub fn raw_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawPost> {
  Ok(RawPost {
    post_id:       row.get(0)?,
    page_id:       row.get(1)?,
    external_id:   row.get(2)?,
    platform:      row.get(3)?,
    message:       row.get(4)?,
    permalink:     row.get(5)?,
    posted_at:     row.get(6)?,
    comment_count: row.get(7)?,
    fetched_at:    row.get(8)?,
  })
}

impl RawPost {
  pub fn into_post(self) -> Result<Post> {
    Ok(Post {
      post_id:       decode_uuid(&self.post_id)?,
      page_id:       decode_uuid(&self.page_id)?,
      external_id:   self.external_id,
      platform:      self.platform,
      message:       self.message,
      permalink:     self.permalink,
      posted_at:     decode_dt(&self.posted_at)?,
      comment_count: self.comment_count,
      fetched_at:    decode_dt(&self.fetched_at)?,
    })
  }
}

/// Raw values read directly from a `comments` row.
pub struct RawComment {
  pub comment_id:  String,
  pub post_id:     String,
  pub external_id: String,
  pub platform:    String,
  pub message:     String,
  pub author_name: Option<String>,
  pub posted_at:   String,
  pub like_count:  u32,
  pub fetched_at:  String,
}

pub fn raw_comment(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawComment> {
  Ok(RawComment {
    comment_id:  row.get(0)?,
    post_id:     row.get(1)?,
    external_id: row.get(2)?,
    platform:    row.get(3)?,
    message:     row.get(4)?,
    author_name: row.get(5)?,
    posted_at:   row.get(6)?,
    like_count:  row.get(7)?,
    fetched_at:  row.get(8)?,
  })
}

impl RawComment {
  pub fn into_comment(self) -> Result<Comment> {
    Ok(Comment {
      comment_id:  decode_uuid(&self.comment_id)?,
      post_id:     decode_uuid(&self.post_id)?,
      external_id: self.external_id,
      platform:    self.platform,
      message:     self.message,
      author_name: self.author_name,
      posted_at:   decode_dt(&self.posted_at)?,
      like_count:  self.like_count,
      fetched_at:  decode_dt(&self.fetched_at)?,
    })
  }
}

/// Raw values read directly from an `analyses` row.
pub struct RawAnalysis {
  pub analysis_id:     String,
  pub comment_id:      String,
  pub sentiment:       String,
  pub sentiment_score: f64,
  pub toxicity_score:  f64,
  pub language:        String,
  pub keywords:        String,
  pub analyzed_at:     String,
}

pub fn raw_analysis(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawAnalysis> {
  Ok(RawAnalysis {
    analysis_id:     row.get(0)?,
    comment_id:      row.get(1)?,
    sentiment:       row.get(2)?,
    sentiment_score: row.get(3)?,
    toxicity_score:  row.get(4)?,
    language:        row.get(5)?,
    keywords:        row.get(6)?,
    analyzed_at:     row.get(7)?,
  })
}

impl RawAnalysis {
  pub fn into_analysis(self) -> Result<Analysis> {
    Ok(Analysis {
      analysis_id:     decode_uuid(&self.analysis_id)?,
      comment_id:      decode_uuid(&self.comment_id)?,
      sentiment:       Sentiment::from_discriminant(&self.sentiment)
        .map_err(Error::Core)?,
      sentiment_score: self.sentiment_score,
      toxicity_score:  self.toxicity_score,
      language:        self.language,
      keywords:        decode_keywords(&self.keywords)?,
      analyzed_at:     decode_dt(&self.analyzed_at)?,
    })
  }
}
