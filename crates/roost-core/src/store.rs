//! The `JobStore` and `ContentStore` traits.
//!
//! Both are implemented by storage backends (e.g. `roost-store-sqlite`).
//! Higher layers (`roost-queue`, `roost-api`) depend on these abstractions,
//! not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  content::{
    Analysis, Comment, NewAnalysis, NewComment, NewPost, Post, PruneCounts,
  },
  job::{Job, JobKind, NewJob, QueueStats},
  page::{Account, NewAccount, NewPage, Page},
};

// ─── JobStore ────────────────────────────────────────────────────────────────

/// Abstraction over the durable job queue.
///
/// The claim operation is the concurrency boundary: however many workers poll
/// a store, each queued job must be handed to exactly one of them. Everything
/// else is bookkeeping on the claimed row.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait JobStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Persist a new job and return it. The `created_at` timestamp is set by
  /// the store; `scheduled_at` defaults to now.
  fn enqueue(
    &self,
    input: NewJob,
  ) -> impl Future<Output = Result<Job, Self::Error>> + Send + '_;

  /// Like [`JobStore::enqueue`], but a no-op returning `None` when a job with
  /// the same kind and payload is already queued. Running and terminal rows
  /// do not block a fresh enqueue.
  fn enqueue_dedup(
    &self,
    input: NewJob,
  ) -> impl Future<Output = Result<Option<Job>, Self::Error>> + Send + '_;

  // ── Claim and transitions ─────────────────────────────────────────────

  /// Atomically claim the next eligible job: the oldest queued row whose
  /// `scheduled_at` has passed and whose attempt budget is not exhausted.
  /// The claim marks it running, increments `attempts`, and stamps
  /// `started_at`. Returns `None` when nothing is eligible.
  fn claim_next(
    &self,
  ) -> impl Future<Output = Result<Option<Job>, Self::Error>> + Send + '_;

  /// Mark a running job completed and stamp `completed_at`. Terminal.
  ///
  /// Returns an error if the job does not exist or is not running.
  fn complete(
    &self,
    job_id: Uuid,
  ) -> impl Future<Output = Result<Job, Self::Error>> + Send + '_;

  /// Record a failed delivery. While attempts remain the job returns to the
  /// queue with an exponential-backoff `scheduled_at`; once the budget is
  /// spent it is marked failed permanently. Either way `last_error` is
  /// recorded.
  ///
  /// Returns an error if the job does not exist or is not running.
  fn fail<'a>(
    &'a self,
    job_id: Uuid,
    error: &'a str,
  ) -> impl Future<Output = Result<Job, Self::Error>> + Send + 'a;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Retrieve a job by UUID. Returns `None` if not found.
  fn get_job(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Job>, Self::Error>> + Send + '_;

  /// List jobs, optionally restricted to one kind, newest first.
  fn list_jobs(
    &self,
    kind: Option<JobKind>,
  ) -> impl Future<Output = Result<Vec<Job>, Self::Error>> + Send + '_;

  /// Row counts per status.
  fn queue_stats(
    &self,
  ) -> impl Future<Output = Result<QueueStats, Self::Error>> + Send + '_;

  // ── Maintenance ───────────────────────────────────────────────────────

  /// Delete completed jobs that finished before `cutoff`. Returns the number
  /// of rows removed. Failed jobs are kept for inspection.
  fn sweep_completed(
    &self,
    cutoff: DateTime<Utc>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Return running jobs whose delivery started before `cutoff` to the
  /// queue, on the assumption their worker died. Returns the number reaped.
  fn reap_stalled(
    &self,
    cutoff: DateTime<Utc>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;
}

// ─── ContentStore ────────────────────────────────────────────────────────────

/// Abstraction over the ingested-content side of the store: accounts, pages,
/// posts, comments, and analyses.
///
/// Post and comment writes are upserts keyed on the platform's own
/// identifiers, which is what makes re-running a fetch idempotent.
pub trait ContentStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Accounts ──────────────────────────────────────────────────────────

  fn add_account(
    &self,
    input: NewAccount,
  ) -> impl Future<Output = Result<Account, Self::Error>> + Send + '_;

  fn get_account(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Account>, Self::Error>> + Send + '_;

  fn list_accounts(
    &self,
  ) -> impl Future<Output = Result<Vec<Account>, Self::Error>> + Send + '_;

  // ── Pages ─────────────────────────────────────────────────────────────

  /// Connect a page, or re-connect it if the `(external_id, platform)` pair
  /// is already known. Re-connecting replaces the stored credential and
  /// reactivates the page while keeping its `page_id`.
  fn add_page(
    &self,
    input: NewPage,
  ) -> impl Future<Output = Result<Page, Self::Error>> + Send + '_;

  fn get_page(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Page>, Self::Error>> + Send + '_;

  /// List pages; with `active_only` set, skip deactivated ones.
  fn list_pages(
    &self,
    active_only: bool,
  ) -> impl Future<Output = Result<Vec<Page>, Self::Error>> + Send + '_;

  /// Returns an error if the page does not exist.
  fn set_page_active(
    &self,
    id: Uuid,
    active: bool,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Swap in a freshly encrypted credential after a token refresh.
  fn update_page_token<'a>(
    &'a self,
    id: Uuid,
    encrypted_token: &'a str,
    expires_at: Option<DateTime<Utc>>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  // ── Posts and comments ────────────────────────────────────────────────

  /// Insert, or update in place when the `(external_id, platform)` pair is
  /// already known. The internal `post_id` is stable across upserts.
  fn upsert_post(
    &self,
    input: NewPost,
  ) -> impl Future<Output = Result<Post, Self::Error>> + Send + '_;

  fn get_post(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Post>, Self::Error>> + Send + '_;

  /// List a page's posts, newest first.
  fn list_posts(
    &self,
    page_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Post>, Self::Error>> + Send + '_;

  /// Same contract as [`ContentStore::upsert_post`].
  fn upsert_comment(
    &self,
    input: NewComment,
  ) -> impl Future<Output = Result<Comment, Self::Error>> + Send + '_;

  fn get_comment(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Comment>, Self::Error>> + Send + '_;

  /// List a post's comments, oldest first.
  fn list_comments(
    &self,
    post_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Comment>, Self::Error>> + Send + '_;

  // ── Analyses ──────────────────────────────────────────────────────────

  /// Whether a comment already has an analysis row.
  fn has_analysis(
    &self,
    comment_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// The analysis recorded for a comment, if any. Keyed by comment because
  /// at most one row exists per comment.
  fn get_analysis(
    &self,
    comment_id: Uuid,
  ) -> impl Future<Output = Result<Option<Analysis>, Self::Error>> + Send + '_;

  /// Record an analysis. At most one row may exist per comment; callers
  /// check [`ContentStore::has_analysis`] first and skip instead of
  /// overwriting.
  fn insert_analysis(
    &self,
    input: NewAnalysis,
  ) -> impl Future<Output = Result<Analysis, Self::Error>> + Send + '_;

  fn count_analyses(
    &self,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Retention ─────────────────────────────────────────────────────────

  /// Delete an account's content posted before `cutoff`. Posts are only
  /// removed once none of their comments remain, so a post with recent
  /// comments outlives its own retention window.
  fn prune_older_than(
    &self,
    account_id: Uuid,
    cutoff: DateTime<Utc>,
  ) -> impl Future<Output = Result<PruneCounts, Self::Error>> + Send + '_;

  /// Delete content whose ancestry is broken or whose page has been
  /// deactivated: analyses without a live comment, comments without a live
  /// post, posts without an active page.
  fn prune_orphans(
    &self,
  ) -> impl Future<Output = Result<PruneCounts, Self::Error>> + Send + '_;
}
