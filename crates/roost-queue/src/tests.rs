//! Pipeline tests: a real SQLite store, the lexicon analyzer, and a mock
//! Graph server, driven tick by tick through the scheduler.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use roost_core::{
  analyzer::{LexiconAnalyzer, Sentiment},
  clock::ManualClock,
  content::{Comment, NewComment, NewPost},
  job::{JobKind, JobStatus, NewJob},
  page::{Account, NewAccount, NewPage, Page},
  retry::RetryPolicy,
  store::{ContentStore, JobStore},
};
use roost_graph::{GraphApi, GraphConfig};
use roost_store_sqlite::SqliteStore;
use roost_vault::CredentialVault;
use serde_json::{Value, json};
use uuid::Uuid;
use wiremock::{
  Mock, MockServer, ResponseTemplate,
  matchers::{method, path, query_param},
};

use crate::{
  HandlerRegistry, JobContext, Scheduler, SchedulerConfig,
  handlers::{AnalyzeSentimentPayload, FetchPostsPayload},
};

// ─── Helpers ─────────────────────────────────────────────────────────────────

const KEY: [u8; 32] = [7; 32];

fn vault() -> CredentialVault {
  CredentialVault::new(KEY)
}

/// A store whose failed jobs become eligible again immediately.
async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
    .with_job_retry(RetryPolicy::new(3, Duration::ZERO, Duration::ZERO))
}

fn graph_for(server: &MockServer) -> Arc<GraphApi> {
  let config = GraphConfig {
    base_url: format!("{}/v19.0", server.uri()),
    app_id: "app-id".to_owned(),
    app_secret: "app-secret".to_owned(),
    retry: RetryPolicy::new(
      2,
      Duration::from_millis(1),
      Duration::from_millis(2),
    ),
    ..GraphConfig::default()
  };
  Arc::new(GraphApi::new(config).expect("graph client"))
}

/// A client for tests whose handlers never reach the network.
fn idle_graph() -> Arc<GraphApi> {
  Arc::new(GraphApi::new(GraphConfig::default()).expect("graph client"))
}

fn context(
  store: SqliteStore,
  graph: Arc<GraphApi>,
) -> JobContext<SqliteStore> {
  JobContext::new(store, vault(), graph, Arc::new(LexiconAnalyzer))
}

fn scheduler(ctx: JobContext<SqliteStore>) -> Scheduler<SqliteStore> {
  Scheduler::new(ctx, HandlerRegistry::builtin(), SchedulerConfig::default())
}

/// Tick until the queue has nothing eligible; counts deliveries.
async fn drain(scheduler: &Scheduler<SqliteStore>) -> usize {
  let mut ran = 0;
  while scheduler.tick().await.expect("tick").is_some() {
    ran += 1;
  }
  ran
}

fn t0() -> DateTime<Utc> {
  "2025-06-01T12:00:00Z".parse().expect("timestamp")
}

async fn account(store: &SqliteStore) -> Account {
  store.add_account(NewAccount::new("Acme")).await.expect("account")
}

async fn page_with_token(
  store: &SqliteStore,
  account_id: Uuid,
  external_id: &str,
  envelope: String,
) -> Page {
  store
    .add_page(NewPage {
      account_id,
      external_id: external_id.to_owned(),
      platform: "facebook".to_owned(),
      name: format!("Page {external_id}"),
      encrypted_token: envelope,
      token_expires_at: None,
    })
    .await
    .expect("page")
}

async fn connected_page(store: &SqliteStore, token: &str) -> Page {
  let account = account(store).await;
  let envelope = vault().encrypt(token).expect("envelope");
  page_with_token(store, account.account_id, "fb-page-1", envelope).await
}

/// An account, page, post, and one comment with the given message.
async fn seed_comment(store: &SqliteStore, message: &str) -> Comment {
  let page = connected_page(store, "page-token").await;
  let post = store
    .upsert_post(NewPost {
      page_id:       page.page_id,
      external_id:   "post-1".to_owned(),
      platform:      "facebook".to_owned(),
      message:       "hello".to_owned(),
      permalink:     None,
      posted_at:     t0(),
      comment_count: 1,
    })
    .await
    .expect("post");
  store
    .upsert_comment(NewComment {
      post_id:     post.post_id,
      external_id: "c-1".to_owned(),
      platform:    "facebook".to_owned(),
      message:     message.to_owned(),
      author_name: Some("Ada".to_owned()),
      posted_at:   t0(),
      like_count:  0,
    })
    .await
    .expect("comment")
}

fn fetch_posts_job(page_id: Uuid) -> NewJob {
  NewJob::new(
    JobKind::FetchPosts,
    serde_json::to_value(FetchPostsPayload { page_id }).expect("payload"),
  )
}

fn analyze_job(comment_id: Uuid) -> NewJob {
  NewJob::new(
    JobKind::AnalyzeSentiment,
    serde_json::to_value(AnalyzeSentimentPayload { comment_id })
      .expect("payload"),
  )
}

fn post_json(id: &str, message: &str, comment_count: u32) -> Value {
  json!({
    "id": id,
    "message": message,
    "permalink_url": format!("https://social.example/{id}"),
    "created_time": "2025-05-01T10:00:00Z",
    "comment_count": comment_count,
  })
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

/// Answer `debug_token` for the given token with the given verdict.
async fn mount_debug_token(server: &MockServer, token: &str, valid: bool) {
  Mock::given(method("GET"))
    .and(path("/v19.0/debug_token"))
    .and(query_param("input_token", token))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({
      "data": { "is_valid": valid },
    })))
    .mount(server)
    .await;
}

#[tokio::test]
async fn fetch_posts_drains_into_analyses() {
  let server = MockServer::start().await;
  let s = store().await;
  let page = connected_page(&s, "page-token").await;

  mount_debug_token(&server, "page-token", true).await;
  Mock::given(method("GET"))
    .and(path("/v19.0/fb-page-1/posts"))
    .and(query_param("access_token", "page-token"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({
      "data": [
        post_json("post-1", "We love our customers", 5),
        post_json("post-2", "Closed on Sunday", 0),
      ],
    })))
    .mount(&server)
    .await;

  let comments: Vec<Value> = (1..=5)
    .map(|n| {
      json!({
        "id": format!("c-{n}"),
        "message": format!("comment number {n} is great"),
        "from": { "name": "Ada" },
        "created_time": "2025-05-01T11:00:00Z",
        "like_count": n,
      })
    })
    .collect();
  Mock::given(method("GET"))
    .and(path("/v19.0/post-1/comments"))
    .and(query_param("access_token", "page-token"))
    .respond_with(
      ResponseTemplate::new(200).set_body_json(json!({ "data": comments })),
    )
    .mount(&server)
    .await;

  let sched = scheduler(context(s.clone(), graph_for(&server)));
  s.enqueue(fetch_posts_job(page.page_id)).await.unwrap();

  // One fetch, one comment fan-out, five analyses.
  assert_eq!(drain(&sched).await, 7);

  let posts = s.list_posts(page.page_id).await.unwrap();
  assert_eq!(posts.len(), 2);
  let with_comments =
    posts.iter().find(|p| p.external_id == "post-1").unwrap();
  let stored_comments =
    s.list_comments(with_comments.post_id).await.unwrap();
  assert_eq!(stored_comments.len(), 5);
  assert_eq!(s.count_analyses().await.unwrap(), 5);

  assert_eq!(
    s.list_jobs(Some(JobKind::FetchComments)).await.unwrap().len(),
    1,
  );
  assert_eq!(
    s.list_jobs(Some(JobKind::AnalyzeSentiment)).await.unwrap().len(),
    5,
  );
  let stats = s.queue_stats().await.unwrap();
  assert_eq!(stats.completed, 7);
  assert_eq!(stats.failed, 0);

  // A second sweep re-upserts everything and skips settled analyses.
  s.enqueue(fetch_posts_job(page.page_id)).await.unwrap();
  assert_eq!(drain(&sched).await, 7);

  assert_eq!(s.list_posts(page.page_id).await.unwrap().len(), 2);
  assert_eq!(
    s.list_comments(with_comments.post_id).await.unwrap().len(),
    5,
  );
  assert_eq!(s.count_analyses().await.unwrap(), 5);
}

#[tokio::test]
async fn fetch_posts_fails_jobs_for_rejected_tokens() {
  let server = MockServer::start().await;
  let s = store().await;
  let page = connected_page(&s, "tok-revoked").await;
  mount_debug_token(&server, "tok-revoked", false).await;

  let sched = scheduler(context(s.clone(), graph_for(&server)));
  let job = s.enqueue(fetch_posts_job(page.page_id)).await.unwrap();
  assert_eq!(drain(&sched).await, 3);

  let failed = s.get_job(job.job_id).await.unwrap().unwrap();
  assert_eq!(failed.status, JobStatus::Failed);
  let last_error = failed.last_error.unwrap();
  assert!(
    last_error.contains("rejects the token"),
    "last_error: {last_error}",
  );
  assert!(s.list_posts(page.page_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn fetch_posts_skips_inactive_pages() {
  let s = store().await;
  let page = connected_page(&s, "page-token").await;
  s.set_page_active(page.page_id, false).await.unwrap();

  let sched = scheduler(context(s.clone(), idle_graph()));
  let job = s.enqueue(fetch_posts_job(page.page_id)).await.unwrap();
  drain(&sched).await;

  let done = s.get_job(job.job_id).await.unwrap().unwrap();
  assert_eq!(done.status, JobStatus::Completed);
  assert!(s.list_posts(page.page_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn analyze_sentiment_records_one_row_per_comment() {
  let s = store().await;
  let comment = seed_comment(&s, "I love this, great product").await;

  let sched = scheduler(context(s.clone(), idle_graph()));
  s.enqueue(analyze_job(comment.comment_id)).await.unwrap();
  assert_eq!(drain(&sched).await, 1);

  let analysis =
    s.get_analysis(comment.comment_id).await.unwrap().unwrap();
  assert_eq!(analysis.sentiment, Sentiment::Positive);
  assert_eq!(analysis.language, "en");

  // A duplicate delivery completes without writing a second row.
  let rerun = s.enqueue(analyze_job(comment.comment_id)).await.unwrap();
  drain(&sched).await;
  let rerun = s.get_job(rerun.job_id).await.unwrap().unwrap();
  assert_eq!(rerun.status, JobStatus::Completed);
  assert_eq!(s.count_analyses().await.unwrap(), 1);
}

// ─── Failure handling ────────────────────────────────────────────────────────

#[tokio::test]
async fn failed_jobs_retry_until_the_attempt_budget_runs_out() {
  let s = store().await;
  let sched = scheduler(context(s.clone(), idle_graph()));

  // No such page: every delivery fails the same way.
  let job = s.enqueue(fetch_posts_job(Uuid::new_v4())).await.unwrap();
  assert_eq!(drain(&sched).await, 3);

  let failed = s.get_job(job.job_id).await.unwrap().unwrap();
  assert_eq!(failed.status, JobStatus::Failed);
  assert_eq!(failed.attempts, 3);
  let last_error = failed.last_error.unwrap();
  assert!(last_error.contains("not found"), "last_error: {last_error}");
}

#[tokio::test]
async fn malformed_payloads_fail_the_job() {
  let s = store().await;
  let sched = scheduler(context(s.clone(), idle_graph()));

  let job = s
    .enqueue(NewJob::new(
      JobKind::FetchPosts,
      json!({ "page_id": "not-a-uuid" }),
    ))
    .await
    .unwrap();
  drain(&sched).await;

  let failed = s.get_job(job.job_id).await.unwrap().unwrap();
  assert_eq!(failed.status, JobStatus::Failed);
  let last_error = failed.last_error.unwrap();
  assert!(last_error.contains("payload"), "last_error: {last_error}");
}

#[tokio::test]
async fn jobs_without_a_handler_fail() {
  let s = store().await;
  let mut registry = HandlerRegistry::new();
  registry.register(JobKind::CleanupData, crate::handlers::cleanup_data);
  let sched = Scheduler::new(
    context(s.clone(), idle_graph()),
    registry,
    SchedulerConfig::default(),
  );

  let job =
    s.enqueue(NewJob::new(JobKind::RefreshTokens, json!({}))).await.unwrap();
  drain(&sched).await;

  let failed = s.get_job(job.job_id).await.unwrap().unwrap();
  assert_eq!(failed.status, JobStatus::Failed);
  assert!(failed.last_error.unwrap().contains("no handler"));
}

#[tokio::test]
async fn a_panicking_handler_fails_only_its_job() {
  async fn explode(
    _ctx: JobContext<SqliteStore>,
    _payload: Value,
  ) -> crate::Result<()> {
    panic!("handler exploded")
  }

  let s = store().await;
  let mut registry = HandlerRegistry::builtin();
  registry.register(JobKind::CleanupData, explode);
  let sched = Scheduler::new(
    context(s.clone(), idle_graph()),
    registry,
    SchedulerConfig::default(),
  );

  let boom =
    s.enqueue(NewJob::new(JobKind::CleanupData, json!({}))).await.unwrap();
  let fine =
    s.enqueue(NewJob::new(JobKind::RefreshTokens, json!({}))).await.unwrap();
  drain(&sched).await;

  let boom = s.get_job(boom.job_id).await.unwrap().unwrap();
  assert_eq!(boom.status, JobStatus::Failed);
  assert!(boom.last_error.unwrap().contains("handler exploded"));

  let fine = s.get_job(fine.job_id).await.unwrap().unwrap();
  assert_eq!(fine.status, JobStatus::Completed);
}

// ─── Token refresh ───────────────────────────────────────────────────────────

#[tokio::test]
async fn refresh_tokens_rotates_expiring_credentials() {
  let server = MockServer::start().await;
  let s = store().await;
  let owner = account(&s).await;
  let v = vault();

  let expiring = page_with_token(
    &s,
    owner.account_id,
    "fb-1",
    v.encrypt("tok-expiring").unwrap(),
  )
  .await;
  let fresh = page_with_token(
    &s,
    owner.account_id,
    "fb-2",
    v.encrypt("tok-fresh").unwrap(),
  )
  .await;
  let invalid = page_with_token(
    &s,
    owner.account_id,
    "fb-3",
    v.encrypt("tok-invalid").unwrap(),
  )
  .await;
  let garbage =
    page_with_token(&s, owner.account_id, "fb-4", "not-an-envelope".into())
      .await;

  let soon = (Utc::now() + chrono::Duration::days(3)).timestamp();
  let later = (Utc::now() + chrono::Duration::days(30)).timestamp();
  Mock::given(method("GET"))
    .and(path("/v19.0/debug_token"))
    .and(query_param("input_token", "tok-expiring"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({
      "data": { "is_valid": true, "expires_at": soon },
    })))
    .mount(&server)
    .await;
  Mock::given(method("GET"))
    .and(path("/v19.0/debug_token"))
    .and(query_param("input_token", "tok-fresh"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({
      "data": { "is_valid": true, "expires_at": later },
    })))
    .mount(&server)
    .await;
  Mock::given(method("GET"))
    .and(path("/v19.0/debug_token"))
    .and(query_param("input_token", "tok-invalid"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({
      "data": { "is_valid": false },
    })))
    .mount(&server)
    .await;
  Mock::given(method("GET"))
    .and(path("/v19.0/oauth/access_token"))
    .and(query_param("fb_exchange_token", "tok-expiring"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({
      "access_token": "tok-long-lived",
      "expires_in": 5_184_000,
    })))
    .expect(1)
    .mount(&server)
    .await;

  let sched = scheduler(context(s.clone(), graph_for(&server)));
  let job =
    s.enqueue(NewJob::new(JobKind::RefreshTokens, json!({}))).await.unwrap();
  drain(&sched).await;
  let job = s.get_job(job.job_id).await.unwrap().unwrap();
  assert_eq!(job.status, JobStatus::Completed);

  // Expiring within the horizon: exchanged and re-encrypted.
  let rotated = s.get_page(expiring.page_id).await.unwrap().unwrap();
  assert!(rotated.is_active);
  assert_ne!(rotated.encrypted_token, expiring.encrypted_token);
  assert_eq!(v.decrypt(&rotated.encrypted_token).unwrap(), "tok-long-lived");
  let expires_at = rotated.token_expires_at.unwrap();
  assert!(expires_at > Utc::now() + chrono::Duration::days(50));

  // Valid with a distant expiry: untouched.
  let untouched = s.get_page(fresh.page_id).await.unwrap().unwrap();
  assert!(untouched.is_active);
  assert_eq!(untouched.encrypted_token, fresh.encrypted_token);

  // Rejected by the platform: deactivated.
  let rejected = s.get_page(invalid.page_id).await.unwrap().unwrap();
  assert!(!rejected.is_active);

  // Unreadable envelope: deactivated without a network call.
  let unreadable = s.get_page(garbage.page_id).await.unwrap().unwrap();
  assert!(!unreadable.is_active);
}

// ─── Cleanup ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn cleanup_data_enforces_retention_and_sweeps_orphans() {
  let s = store().await;
  let owner = account(&s).await;
  let v = vault();

  let active = page_with_token(
    &s,
    owner.account_id,
    "fb-1",
    v.encrypt("tok-1").unwrap(),
  )
  .await;
  let disabled = page_with_token(
    &s,
    owner.account_id,
    "fb-2",
    v.encrypt("tok-2").unwrap(),
  )
  .await;
  s.set_page_active(disabled.page_id, false).await.unwrap();

  let new_post = |page_id, ext: &str, posted_at| NewPost {
    page_id,
    external_id: ext.to_owned(),
    platform: "facebook".to_owned(),
    message: String::new(),
    permalink: None,
    posted_at,
    comment_count: 0,
  };
  // Default retention is 90 days.
  let expired = s
    .upsert_post(new_post(
      active.page_id,
      "old",
      Utc::now() - chrono::Duration::days(100),
    ))
    .await
    .unwrap();
  let recent = s
    .upsert_post(new_post(
      active.page_id,
      "new",
      Utc::now() - chrono::Duration::days(1),
    ))
    .await
    .unwrap();
  let orphaned = s
    .upsert_post(new_post(
      disabled.page_id,
      "stranded",
      Utc::now() - chrono::Duration::days(1),
    ))
    .await
    .unwrap();

  let sched = scheduler(context(s.clone(), idle_graph()));
  let job =
    s.enqueue(NewJob::new(JobKind::CleanupData, json!({}))).await.unwrap();
  drain(&sched).await;
  let job = s.get_job(job.job_id).await.unwrap().unwrap();
  assert_eq!(job.status, JobStatus::Completed);

  assert!(s.get_post(expired.post_id).await.unwrap().is_none());
  assert!(s.get_post(recent.post_id).await.unwrap().is_some());
  assert!(s.get_post(orphaned.post_id).await.unwrap().is_none());
}

// ─── Maintenance and the polling loop ────────────────────────────────────────

#[tokio::test]
async fn maintain_sweeps_old_jobs_and_reaps_stalled_ones() {
  let clock = Arc::new(ManualClock::new(t0()));
  let s = SqliteStore::open_in_memory()
    .await
    .unwrap()
    .with_clock(clock.clone());
  let ctx = context(s.clone(), idle_graph()).with_clock(clock.clone());
  let sched = Scheduler::new(
    ctx,
    HandlerRegistry::builtin(),
    SchedulerConfig::default(),
  );

  s.enqueue(NewJob::new(JobKind::RefreshTokens, json!({}))).await.unwrap();
  let completed_id = sched.tick().await.unwrap().unwrap();

  // A second claim that never finishes, as if its worker died.
  let stalled =
    s.enqueue(NewJob::new(JobKind::CleanupData, json!({}))).await.unwrap();
  s.claim_next().await.unwrap().unwrap();

  clock.advance(Duration::from_secs(8 * 24 * 3600));
  sched.maintain().await.unwrap();

  assert!(s.get_job(completed_id).await.unwrap().is_none());
  let requeued = s.get_job(stalled.job_id).await.unwrap().unwrap();
  assert_eq!(requeued.status, JobStatus::Queued);
}

#[tokio::test]
async fn scheduler_loop_runs_jobs_and_stops_cleanly() {
  let s = store().await;
  let config = SchedulerConfig {
    poll_interval: Duration::from_millis(10),
    ..SchedulerConfig::default()
  };
  let sched = Scheduler::new(
    context(s.clone(), idle_graph()),
    HandlerRegistry::builtin(),
    config,
  );
  let handle = sched.start();

  let job =
    s.enqueue(NewJob::new(JobKind::RefreshTokens, json!({}))).await.unwrap();

  let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
  loop {
    let current = s.get_job(job.job_id).await.unwrap().unwrap();
    if current.status == JobStatus::Completed {
      break;
    }
    assert!(
      tokio::time::Instant::now() < deadline,
      "job never completed: {current:?}",
    );
    tokio::time::sleep(Duration::from_millis(10)).await;
  }

  handle.shutdown().await;
}
