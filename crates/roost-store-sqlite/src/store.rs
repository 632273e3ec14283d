//! [`SqliteStore`], the SQLite implementation of [`JobStore`] and
//! [`ContentStore`].
//!
//! Claiming relies on a single `UPDATE ... WHERE job_id = (SELECT ...)
//! RETURNING` statement, so two workers (even in separate processes sharing
//! the database file) can never walk away with the same job.

use std::{path::Path, sync::Arc};

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use roost_core::{
  clock::{Clock, SystemClock},
  content::{
    Analysis, Comment, NewAnalysis, NewComment, NewPost, Post, PruneCounts,
  },
  job::{Job, JobKind, JobStatus, NewJob, QueueStats},
  page::{Account, NewAccount, NewPage, Page},
  retry::RetryPolicy,
  store::{ContentStore, JobStore},
};

use crate::{
  Error, Result,
  encode::{
    RawAnalysis, RawComment, RawJob, RawPage, RawPost, encode_dt,
    encode_keywords, encode_uuid, raw_account, raw_analysis, raw_comment,
    raw_job, raw_page, raw_post,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Roost store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:  tokio_rusqlite::Connection,
  clock: Arc<dyn Clock>,
  retry: RetryPolicy,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::with_connection(conn).await
  }

  /// Open an in-memory store, useful in tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::with_connection(conn).await
  }

  async fn with_connection(conn: tokio_rusqlite::Connection) -> Result<Self> {
    let store = Self {
      conn,
      clock: Arc::new(SystemClock),
      retry: RetryPolicy::job(),
    };
    store.init_schema().await?;
    Ok(store)
  }

  /// Swap the time source; timestamps and eligibility checks follow it.
  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  /// Swap the re-queue backoff policy applied by [`JobStore::fail`].
  pub fn with_job_retry(mut self, retry: RetryPolicy) -> Self {
    self.retry = retry;
    self
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── JobStore impl ───────────────────────────────────────────────────────────

impl JobStore for SqliteStore {
  type Error = Error;

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn enqueue(&self, input: NewJob) -> Result<Job> {
    let now = self.clock.now();
    let job = Job {
      job_id:       Uuid::new_v4(),
      kind:         input.kind,
      payload:      input.payload,
      status:       JobStatus::Queued,
      attempts:     0,
      max_attempts: input.max_attempts,
      scheduled_at: input.scheduled_at.unwrap_or(now),
      started_at:   None,
      completed_at: None,
      last_error:   None,
      created_at:   now,
    };

    let job_id_str       = encode_uuid(job.job_id);
    let kind_str         = job.kind.discriminant().to_owned();
    let payload_str      = job.payload.to_string();
    let max_attempts     = job.max_attempts;
    let scheduled_at_str = encode_dt(job.scheduled_at);
    let created_at_str   = encode_dt(job.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO jobs (
             job_id, kind, payload, status, attempts, max_attempts,
             scheduled_at, created_at
           ) VALUES (?1, ?2, ?3, 'queued', 0, ?4, ?5, ?6)",
          rusqlite::params![
            job_id_str,
            kind_str,
            payload_str,
            max_attempts,
            scheduled_at_str,
            created_at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(job)
  }

  async fn enqueue_dedup(&self, input: NewJob) -> Result<Option<Job>> {
    let now = self.clock.now();
    let job = Job {
      job_id:       Uuid::new_v4(),
      kind:         input.kind,
      payload:      input.payload,
      status:       JobStatus::Queued,
      attempts:     0,
      max_attempts: input.max_attempts,
      scheduled_at: input.scheduled_at.unwrap_or(now),
      started_at:   None,
      completed_at: None,
      last_error:   None,
      created_at:   now,
    };

    let job_id_str       = encode_uuid(job.job_id);
    let kind_str         = job.kind.discriminant().to_owned();
    let payload_str      = job.payload.to_string();
    let max_attempts     = job.max_attempts;
    let scheduled_at_str = encode_dt(job.scheduled_at);
    let created_at_str   = encode_dt(job.created_at);

    let inserted = self
      .conn
      .call(move |conn| {
        // Insert-unless-queued in one statement, so two producers racing on
        // the same payload cannot both get through.
        let rows = conn.execute(
          "INSERT INTO jobs (
             job_id, kind, payload, status, attempts, max_attempts,
             scheduled_at, created_at
           )
           SELECT ?1, ?2, ?3, 'queued', 0, ?4, ?5, ?6
           WHERE NOT EXISTS (
             SELECT 1 FROM jobs
             WHERE kind = ?2 AND payload = ?3 AND status = 'queued'
           )",
          rusqlite::params![
            job_id_str,
            kind_str,
            payload_str,
            max_attempts,
            scheduled_at_str,
            created_at_str,
          ],
        )?;
        Ok(rows > 0)
      })
      .await?;

    Ok(inserted.then_some(job))
  }

  // ── Claim and transitions ─────────────────────────────────────────────────

  async fn claim_next(&self) -> Result<Option<Job>> {
    let now_str = encode_dt(self.clock.now());

    let raw: Option<RawJob> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "UPDATE jobs
               SET status = 'running', attempts = attempts + 1,
                   started_at = ?1
               WHERE job_id = (
                 SELECT job_id FROM jobs
                 WHERE status = 'queued'
                   AND scheduled_at <= ?1
                   AND attempts < max_attempts
                 ORDER BY scheduled_at, created_at
                 LIMIT 1
               )
               RETURNING job_id, kind, payload, status, attempts,
                         max_attempts, scheduled_at, started_at,
                         completed_at, last_error, created_at",
              rusqlite::params![now_str],
              raw_job,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawJob::into_job).transpose()
  }

  async fn complete(&self, job_id: Uuid) -> Result<Job> {
    let id_str  = encode_uuid(job_id);
    let now_str = encode_dt(self.clock.now());

    let raw: Option<RawJob> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "UPDATE jobs SET status = 'completed', completed_at = ?2
               WHERE job_id = ?1 AND status = 'running'
               RETURNING job_id, kind, payload, status, attempts,
                         max_attempts, scheduled_at, started_at,
                         completed_at, last_error, created_at",
              rusqlite::params![id_str, now_str],
              raw_job,
            )
            .optional()?,
        )
      })
      .await?;

    match raw {
      Some(raw) => raw.into_job(),
      None => match self.get_job(job_id).await? {
        Some(_) => Err(Error::JobNotRunning(job_id)),
        None => Err(Error::JobNotFound(job_id)),
      },
    }
  }

  async fn fail(&self, job_id: Uuid, error: &str) -> Result<Job> {
    let current = self
      .get_job(job_id)
      .await?
      .ok_or(Error::JobNotFound(job_id))?;
    if current.status != JobStatus::Running {
      return Err(Error::JobNotRunning(job_id));
    }

    let id_str    = encode_uuid(job_id);
    let error_msg = error.to_owned();

    // The `status = 'running'` guard makes the transition a no-op if the
    // reaper got there first; the claiming worker then sees JobNotRunning
    // instead of silently double-writing.
    let raw: Option<RawJob> = if current.attempts < current.max_attempts {
      // Budget remains: back to the queue with exponential backoff. The
      // first delivery fails with attempts == 1, so the delay index starts
      // at zero.
      let delay   = self.retry.delay(current.attempts.saturating_sub(1));
      let next_at = encode_dt(
        self.clock.now()
          + chrono::Duration::from_std(delay).unwrap_or_default(),
      );
      self
        .conn
        .call(move |conn| {
          Ok(
            conn
              .query_row(
                "UPDATE jobs
                 SET status = 'queued', scheduled_at = ?2,
                     started_at = NULL, last_error = ?3
                 WHERE job_id = ?1 AND status = 'running'
                 RETURNING job_id, kind, payload, status, attempts,
                           max_attempts, scheduled_at, started_at,
                           completed_at, last_error, created_at",
                rusqlite::params![id_str, next_at, error_msg],
                raw_job,
              )
              .optional()?,
          )
        })
        .await?
    } else {
      self
        .conn
        .call(move |conn| {
          Ok(
            conn
              .query_row(
                "UPDATE jobs SET status = 'failed', last_error = ?2
                 WHERE job_id = ?1 AND status = 'running'
                 RETURNING job_id, kind, payload, status, attempts,
                           max_attempts, scheduled_at, started_at,
                           completed_at, last_error, created_at",
                rusqlite::params![id_str, error_msg],
                raw_job,
              )
              .optional()?,
          )
        })
        .await?
    };

    match raw {
      Some(raw) => raw.into_job(),
      None => Err(Error::JobNotRunning(job_id)),
    }
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn get_job(&self, id: Uuid) -> Result<Option<Job>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawJob> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT job_id, kind, payload, status, attempts, max_attempts,
                      scheduled_at, started_at, completed_at, last_error,
                      created_at
               FROM jobs WHERE job_id = ?1",
              rusqlite::params![id_str],
              raw_job,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawJob::into_job).transpose()
  }

  async fn list_jobs(&self, kind: Option<JobKind>) -> Result<Vec<Job>> {
    let kind_str = kind.map(|k| k.discriminant().to_owned());

    let raws: Vec<RawJob> = self
      .conn
      .call(move |conn| {
        let rows = if let Some(k) = kind_str {
          let mut stmt = conn.prepare(
            "SELECT job_id, kind, payload, status, attempts, max_attempts,
                    scheduled_at, started_at, completed_at, last_error,
                    created_at
             FROM jobs WHERE kind = ?1
             ORDER BY created_at DESC",
          )?;
          stmt
            .query_map(rusqlite::params![k], raw_job)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
          let mut stmt = conn.prepare(
            "SELECT job_id, kind, payload, status, attempts, max_attempts,
                    scheduled_at, started_at, completed_at, last_error,
                    created_at
             FROM jobs
             ORDER BY created_at DESC",
          )?;
          stmt
            .query_map([], raw_job)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawJob::into_job).collect()
  }

  async fn queue_stats(&self) -> Result<QueueStats> {
    let rows: Vec<(String, u64)> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare("SELECT status, COUNT(*) FROM jobs GROUP BY status")?;
        let rows = stmt
          .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mut stats = QueueStats::default();
    for (status, count) in rows {
      match status.as_str() {
        "queued" => stats.queued = count,
        "running" => stats.running = count,
        "completed" => stats.completed = count,
        "failed" => stats.failed = count,
        other => {
          return Err(Error::Decode(format!("unknown job status: {other:?}")));
        }
      }
    }
    Ok(stats)
  }

  // ── Maintenance ───────────────────────────────────────────────────────────

  async fn sweep_completed(&self, cutoff: DateTime<Utc>) -> Result<u64> {
    let cutoff_str = encode_dt(cutoff);

    let removed = self
      .conn
      .call(move |conn| {
        let rows = conn.execute(
          "DELETE FROM jobs
           WHERE status = 'completed'
             AND completed_at IS NOT NULL
             AND completed_at < ?1",
          rusqlite::params![cutoff_str],
        )?;
        Ok(rows as u64)
      })
      .await?;

    Ok(removed)
  }

  async fn reap_stalled(&self, cutoff: DateTime<Utc>) -> Result<u64> {
    let cutoff_str = encode_dt(cutoff);

    let reaped = self
      .conn
      .call(move |conn| {
        let rows = conn.execute(
          "UPDATE jobs SET status = 'queued', started_at = NULL
           WHERE status = 'running'
             AND started_at IS NOT NULL
             AND started_at < ?1",
          rusqlite::params![cutoff_str],
        )?;
        Ok(rows as u64)
      })
      .await?;

    Ok(reaped)
  }
}

// ─── ContentStore impl ───────────────────────────────────────────────────────

impl ContentStore for SqliteStore {
  type Error = Error;

  // ── Accounts ──────────────────────────────────────────────────────────────

  async fn add_account(&self, input: NewAccount) -> Result<Account> {
    let account = Account {
      account_id:     Uuid::new_v4(),
      display_name:   input.display_name,
      retention_days: input.retention_days,
      created_at:     self.clock.now(),
    };

    let id_str         = encode_uuid(account.account_id);
    let display_name   = account.display_name.clone();
    let retention_days = account.retention_days;
    let at_str         = encode_dt(account.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO accounts (
             account_id, display_name, retention_days, created_at
           ) VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, display_name, retention_days, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(account)
  }

  async fn get_account(&self, id: Uuid) -> Result<Option<Account>> {
    let id_str = encode_uuid(id);

    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT account_id, display_name, retention_days, created_at
               FROM accounts WHERE account_id = ?1",
              rusqlite::params![id_str],
              raw_account,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(|r| r.into_account()).transpose()
  }

  async fn list_accounts(&self) -> Result<Vec<Account>> {
    let raws = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT account_id, display_name, retention_days, created_at
           FROM accounts ORDER BY created_at",
        )?;
        let rows = stmt
          .query_map([], raw_account)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(|r| r.into_account()).collect()
  }

  // ── Pages ─────────────────────────────────────────────────────────────────

  async fn add_page(&self, input: NewPage) -> Result<Page> {
    let page_id_str    = encode_uuid(Uuid::new_v4());
    let account_id_str = encode_uuid(input.account_id);
    let external_id    = input.external_id;
    let platform       = input.platform;
    let name           = input.name;
    let token          = input.encrypted_token;
    let expires_str    = input.token_expires_at.map(encode_dt);
    let connected_str  = encode_dt(self.clock.now());

    let raw: RawPage = self
      .conn
      .call(move |conn| {
        // Re-connecting a known page replaces its credential and reactivates
        // it; the surviving page_id is the original one.
        Ok(conn.query_row(
          "INSERT INTO pages (
             page_id, account_id, external_id, platform, name,
             encrypted_token, token_expires_at, is_active, connected_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8)
           ON CONFLICT (external_id, platform) DO UPDATE SET
             account_id       = excluded.account_id,
             name             = excluded.name,
             encrypted_token  = excluded.encrypted_token,
             token_expires_at = excluded.token_expires_at,
             is_active        = 1,
             connected_at     = excluded.connected_at
           RETURNING page_id, account_id, external_id, platform, name,
                     encrypted_token, token_expires_at, is_active,
                     connected_at",
          rusqlite::params![
            page_id_str,
            account_id_str,
            external_id,
            platform,
            name,
            token,
            expires_str,
            connected_str,
          ],
          raw_page,
        )?)
      })
      .await?;

    raw.into_page()
  }

  async fn get_page(&self, id: Uuid) -> Result<Option<Page>> {
    let id_str = encode_uuid(id);

    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT page_id, account_id, external_id, platform, name,
                      encrypted_token, token_expires_at, is_active,
                      connected_at
               FROM pages WHERE page_id = ?1",
              rusqlite::params![id_str],
              raw_page,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawPage::into_page).transpose()
  }

  async fn list_pages(&self, active_only: bool) -> Result<Vec<Page>> {
    let raws = self
      .conn
      .call(move |conn| {
        let rows = if active_only {
          let mut stmt = conn.prepare(
            "SELECT page_id, account_id, external_id, platform, name,
                    encrypted_token, token_expires_at, is_active,
                    connected_at
             FROM pages WHERE is_active = 1
             ORDER BY connected_at",
          )?;
          stmt
            .query_map([], raw_page)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
          let mut stmt = conn.prepare(
            "SELECT page_id, account_id, external_id, platform, name,
                    encrypted_token, token_expires_at, is_active,
                    connected_at
             FROM pages
             ORDER BY connected_at",
          )?;
          stmt
            .query_map([], raw_page)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPage::into_page).collect()
  }

  async fn set_page_active(&self, id: Uuid, active: bool) -> Result<()> {
    let id_str = encode_uuid(id);

    let rows = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE pages SET is_active = ?2 WHERE page_id = ?1",
          rusqlite::params![id_str, active],
        )?)
      })
      .await?;

    if rows == 0 {
      return Err(Error::PageNotFound(id));
    }
    Ok(())
  }

  async fn update_page_token(
    &self,
    id: Uuid,
    encrypted_token: &str,
    expires_at: Option<DateTime<Utc>>,
  ) -> Result<()> {
    let id_str      = encode_uuid(id);
    let token       = encrypted_token.to_owned();
    let expires_str = expires_at.map(encode_dt);

    let rows = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE pages SET encrypted_token = ?2, token_expires_at = ?3
           WHERE page_id = ?1",
          rusqlite::params![id_str, token, expires_str],
        )?)
      })
      .await?;

    if rows == 0 {
      return Err(Error::PageNotFound(id));
    }
    Ok(())
  }

  // ── Posts and comments ────────────────────────────────────────────────────

  async fn upsert_post(&self, input: NewPost) -> Result<Post> {
    let post_id_str = encode_uuid(Uuid::new_v4());
    let page_id_str = encode_uuid(input.page_id);
    let external_id = input.external_id;
    let platform    = input.platform;
    let message     = input.message;
    let permalink   = input.permalink;
    let posted_str  = encode_dt(input.posted_at);
    let count       = input.comment_count;
    let fetched_str = encode_dt(self.clock.now());

    let raw: RawPost = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "INSERT INTO posts (
             post_id, page_id, external_id, platform, message, permalink,
             posted_at, comment_count, fetched_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
           ON CONFLICT (external_id, platform) DO UPDATE SET
             message       = excluded.message,
             permalink     = excluded.permalink,
             posted_at     = excluded.posted_at,
             comment_count = excluded.comment_count,
             fetched_at    = excluded.fetched_at
           RETURNING post_id, page_id, external_id, platform, message,
                     permalink, posted_at, comment_count, fetched_at",
          rusqlite::params![
            post_id_str,
            page_id_str,
            external_id,
            platform,
            message,
            permalink,
            posted_str,
            count,
            fetched_str,
          ],
          raw_post,
        )?)
      })
      .await?;

    raw.into_post()
  }

  async fn get_post(&self, id: Uuid) -> Result<Option<Post>> {
    let id_str = encode_uuid(id);

    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT post_id, page_id, external_id, platform, message,
                      permalink, posted_at, comment_count, fetched_at
               FROM posts WHERE post_id = ?1",
              rusqlite::params![id_str],
              raw_post,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawPost::into_post).transpose()
  }

  async fn list_posts(&self, page_id: Uuid) -> Result<Vec<Post>> {
    let page_id_str = encode_uuid(page_id);

    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT post_id, page_id, external_id, platform, message,
                  permalink, posted_at, comment_count, fetched_at
           FROM posts WHERE page_id = ?1
           ORDER BY posted_at DESC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![page_id_str], raw_post)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPost::into_post).collect()
  }

  async fn upsert_comment(&self, input: NewComment) -> Result<Comment> {
    let comment_id_str = encode_uuid(Uuid::new_v4());
    let post_id_str    = encode_uuid(input.post_id);
    let external_id    = input.external_id;
    let platform       = input.platform;
    let message        = input.message;
    let author_name    = input.author_name;
    let posted_str     = encode_dt(input.posted_at);
    let likes          = input.like_count;
    let fetched_str    = encode_dt(self.clock.now());

    let raw: RawComment = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "INSERT INTO comments (
             comment_id, post_id, external_id, platform, message,
             author_name, posted_at, like_count, fetched_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
           ON CONFLICT (external_id, platform) DO UPDATE SET
             message     = excluded.message,
             author_name = excluded.author_name,
             posted_at   = excluded.posted_at,
             like_count  = excluded.like_count,
             fetched_at  = excluded.fetched_at
           RETURNING comment_id, post_id, external_id, platform, message,
                     author_name, posted_at, like_count, fetched_at",
          rusqlite::params![
            comment_id_str,
            post_id_str,
            external_id,
            platform,
            message,
            author_name,
            posted_str,
            likes,
            fetched_str,
          ],
          raw_comment,
        )?)
      })
      .await?;

    raw.into_comment()
  }

  async fn get_comment(&self, id: Uuid) -> Result<Option<Comment>> {
    let id_str = encode_uuid(id);

    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT comment_id, post_id, external_id, platform, message,
                      author_name, posted_at, like_count, fetched_at
               FROM comments WHERE comment_id = ?1",
              rusqlite::params![id_str],
              raw_comment,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawComment::into_comment).transpose()
  }

  async fn list_comments(&self, post_id: Uuid) -> Result<Vec<Comment>> {
    let post_id_str = encode_uuid(post_id);

    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT comment_id, post_id, external_id, platform, message,
                  author_name, posted_at, like_count, fetched_at
           FROM comments WHERE post_id = ?1
           ORDER BY posted_at",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![post_id_str], raw_comment)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawComment::into_comment).collect()
  }

  // ── Analyses ──────────────────────────────────────────────────────────────

  async fn has_analysis(&self, comment_id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(comment_id);

    let exists = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM analyses WHERE comment_id = ?1",
              rusqlite::params![id_str],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;

    Ok(exists)
  }

  async fn get_analysis(&self, comment_id: Uuid) -> Result<Option<Analysis>> {
    let id_str = encode_uuid(comment_id);

    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT analysis_id, comment_id, sentiment, sentiment_score,
                      toxicity_score, language, keywords, analyzed_at
               FROM analyses WHERE comment_id = ?1",
              rusqlite::params![id_str],
              raw_analysis,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawAnalysis::into_analysis).transpose()
  }

  async fn insert_analysis(&self, input: NewAnalysis) -> Result<Analysis> {
    let analysis = Analysis {
      analysis_id:     Uuid::new_v4(),
      comment_id:      input.comment_id,
      sentiment:       input.sentiment,
      sentiment_score: input.sentiment_score,
      toxicity_score:  input.toxicity_score,
      language:        input.language,
      keywords:        input.keywords,
      analyzed_at:     self.clock.now(),
    };

    let id_str         = encode_uuid(analysis.analysis_id);
    let comment_id_str = encode_uuid(analysis.comment_id);
    let sentiment_str  = analysis.sentiment.discriminant().to_owned();
    let sentiment_score = analysis.sentiment_score;
    let toxicity_score = analysis.toxicity_score;
    let language       = analysis.language.clone();
    let keywords_str   = encode_keywords(&analysis.keywords)?;
    let at_str         = encode_dt(analysis.analyzed_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO analyses (
             analysis_id, comment_id, sentiment, sentiment_score,
             toxicity_score, language, keywords, analyzed_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            id_str,
            comment_id_str,
            sentiment_str,
            sentiment_score,
            toxicity_score,
            language,
            keywords_str,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(analysis)
  }

  async fn count_analyses(&self) -> Result<u64> {
    let count = self
      .conn
      .call(|conn| {
        Ok(conn.query_row("SELECT COUNT(*) FROM analyses", [], |row| {
          row.get::<_, u64>(0)
        })?)
      })
      .await?;

    Ok(count)
  }

  // ── Retention ─────────────────────────────────────────────────────────────

  async fn prune_older_than(
    &self,
    account_id: Uuid,
    cutoff: DateTime<Utc>,
  ) -> Result<PruneCounts> {
    let account_str = encode_uuid(account_id);
    let cutoff_str  = encode_dt(cutoff);

    let counts = self
      .conn
      .call(move |conn| {
        // Children before parents, so foreign keys hold at every step.
        let analyses = conn.execute(
          "DELETE FROM analyses WHERE analysis_id IN (
             SELECT a.analysis_id FROM analyses a
             JOIN comments c ON c.comment_id = a.comment_id
             JOIN posts p    ON p.post_id    = c.post_id
             JOIN pages g    ON g.page_id    = p.page_id
             WHERE g.account_id = ?1 AND c.posted_at < ?2
           )",
          rusqlite::params![account_str, cutoff_str],
        )?;

        let comments = conn.execute(
          "DELETE FROM comments WHERE comment_id IN (
             SELECT c.comment_id FROM comments c
             JOIN posts p ON p.post_id = c.post_id
             JOIN pages g ON g.page_id = p.page_id
             WHERE g.account_id = ?1 AND c.posted_at < ?2
           )",
          rusqlite::params![account_str, cutoff_str],
        )?;

        // A post with surviving comments is kept regardless of its own age.
        let posts = conn.execute(
          "DELETE FROM posts WHERE post_id IN (
             SELECT p.post_id FROM posts p
             JOIN pages g ON g.page_id = p.page_id
             WHERE g.account_id = ?1 AND p.posted_at < ?2
               AND NOT EXISTS (
                 SELECT 1 FROM comments c WHERE c.post_id = p.post_id
               )
           )",
          rusqlite::params![account_str, cutoff_str],
        )?;

        Ok(PruneCounts {
          posts:    posts as u64,
          comments: comments as u64,
          analyses: analyses as u64,
        })
      })
      .await?;

    Ok(counts)
  }

  async fn prune_orphans(&self) -> Result<PruneCounts> {
    let counts = self
      .conn
      .call(|conn| {
        let analyses = conn.execute(
          "DELETE FROM analyses WHERE analysis_id IN (
             SELECT a.analysis_id FROM analyses a
             LEFT JOIN comments c ON c.comment_id = a.comment_id
             LEFT JOIN posts p    ON p.post_id    = c.post_id
             LEFT JOIN pages g    ON g.page_id    = p.page_id
             WHERE c.comment_id IS NULL
                OR p.post_id IS NULL
                OR g.page_id IS NULL
                OR g.is_active = 0
           )",
          [],
        )?;

        let comments = conn.execute(
          "DELETE FROM comments WHERE comment_id IN (
             SELECT c.comment_id FROM comments c
             LEFT JOIN posts p ON p.post_id = c.post_id
             LEFT JOIN pages g ON g.page_id = p.page_id
             WHERE p.post_id IS NULL
                OR g.page_id IS NULL
                OR g.is_active = 0
           )",
          [],
        )?;

        let posts = conn.execute(
          "DELETE FROM posts WHERE post_id IN (
             SELECT p.post_id FROM posts p
             LEFT JOIN pages g ON g.page_id = p.page_id
             WHERE g.page_id IS NULL OR g.is_active = 0
           )",
          [],
        )?;

        Ok(PruneCounts {
          posts:    posts as u64,
          comments: comments as u64,
          analyses: analyses as u64,
        })
      })
      .await?;

    Ok(counts)
  }
}
