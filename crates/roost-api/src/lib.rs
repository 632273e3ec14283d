//! JSON admin API for Roost, plus the `roostd` server binary.
//!
//! Exposes an axum [`Router`] over any store implementing [`JobStore`] and
//! [`ContentStore`], with HTTP Basic auth on every route.

pub mod accounts;
pub mod auth;
pub mod error;
pub mod jobs;
pub mod pages;

pub use error::ApiError;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post},
};
use roost_core::store::{ContentStore, JobStore};
use roost_vault::CredentialVault;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use auth::AuthConfig;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:               String,
  pub port:               u16,
  pub store_path:         PathBuf,
  pub auth_username:      String,
  /// PHC string; generate one with `roostd --hash-password`.
  pub auth_password_hash: String,
  /// Base64-encoded 32-byte vault key.
  pub vault_key:          String,
  pub graph_app_id:       String,
  pub graph_app_secret:   String,
  /// Overrides the default public Graph endpoint, mainly for tests.
  pub graph_base_url:     Option<String>,
}

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S> {
  pub store: Arc<S>,
  pub vault: CredentialVault,
  pub auth:  Arc<AuthConfig>,
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the admin [`Router`].
pub fn router<S>(state: AppState<S>) -> Router
where
  S: JobStore + ContentStore + Clone + 'static,
{
  Router::new()
    .route("/api/jobs", post(jobs::enqueue::<S>))
    .route("/api/jobs/stats", get(jobs::stats::<S>))
    .route("/api/jobs/{id}", get(jobs::get_one::<S>))
    .route("/api/pages", get(pages::list::<S>).post(pages::connect::<S>))
    .route(
      "/api/accounts",
      get(accounts::list::<S>).post(accounts::create::<S>),
    )
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Integration tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
  use rand_core::OsRng;
  use roost_core::job::{JobKind, NewJob};
  use roost_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;
  use uuid::Uuid;

  const KEY: [u8; 32] = [9; 32];

  async fn make_state(password: &str) -> AppState<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string();

    AppState {
      store: Arc::new(store),
      vault: CredentialVault::new(KEY),
      auth:  Arc::new(AuthConfig {
        username:      "admin".to_string(),
        password_hash: hash,
      }),
    }
  }

  fn auth_header(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  async fn request(
    state: AppState<SqliteStore>,
    method: &str,
    uri: &str,
    auth: Option<&str>,
    body: Option<Value>,
  ) -> axum::response::Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
      builder = builder.header(header::AUTHORIZATION, auth);
    }
    let request = match body {
      Some(json) => builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json.to_string()))
        .unwrap(),
      None => builder.body(Body::empty()).unwrap(),
    };
    router(state).oneshot(request).await.unwrap()
  }

  async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
      .await
      .unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  // ── Auth ────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn unauthenticated_requests_return_401() {
    let state = make_state("secret").await;
    let response = request(state, "GET", "/api/jobs/stats", None, None).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let challenge = response
      .headers()
      .get(header::WWW_AUTHENTICATE)
      .unwrap()
      .to_str()
      .unwrap();
    assert_eq!(challenge, "Basic realm=\"roost\"");

    let body = body_json(response).await;
    assert_eq!(body["error"], "unauthorized");
  }

  #[tokio::test]
  async fn wrong_credentials_return_401() {
    let state = make_state("secret").await;
    let auth = auth_header("admin", "wrong");
    let response =
      request(state, "GET", "/api/jobs/stats", Some(&auth), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
  }

  // ── Jobs ────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn enqueue_returns_202_and_persists_the_job() {
    let state = make_state("secret").await;
    let auth = auth_header("admin", "secret");
    let page_id = Uuid::new_v4();

    let response = request(
      state.clone(),
      "POST",
      "/api/jobs",
      Some(&auth),
      Some(json!({ "kind": "fetch_posts", "payload": { "page_id": page_id } })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let job = body_json(response).await;
    assert_eq!(job["kind"], "fetch_posts");
    assert_eq!(job["status"], "queued");
    assert_eq!(job["payload"]["page_id"], page_id.to_string());

    let id: Uuid = job["job_id"].as_str().unwrap().parse().unwrap();
    let stored = state.store.get_job(id).await.unwrap().unwrap();
    assert_eq!(stored.kind, JobKind::FetchPosts);
    assert_eq!(stored.max_attempts, 3);
  }

  #[tokio::test]
  async fn enqueue_respects_the_attempt_budget_field() {
    let state = make_state("secret").await;
    let auth = auth_header("admin", "secret");

    let response = request(
      state,
      "POST",
      "/api/jobs",
      Some(&auth),
      Some(json!({ "kind": "cleanup_data", "max_attempts": 5 })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let job = body_json(response).await;
    assert_eq!(job["max_attempts"], 5);
    assert_eq!(job["payload"], json!({}));
  }

  #[tokio::test]
  async fn enqueue_rejects_a_zero_attempt_budget() {
    let state = make_state("secret").await;
    let auth = auth_header("admin", "secret");

    let response = request(
      state,
      "POST",
      "/api/jobs",
      Some(&auth),
      Some(json!({ "kind": "cleanup_data", "max_attempts": 0 })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert!(
      body["error"].as_str().unwrap().contains("max_attempts"),
      "unexpected error body: {body}"
    );
  }

  #[tokio::test]
  async fn enqueue_rejects_unknown_kinds() {
    let state = make_state("secret").await;
    let auth = auth_header("admin", "secret");

    let response = request(
      state,
      "POST",
      "/api/jobs",
      Some(&auth),
      Some(json!({ "kind": "mine_bitcoin" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
  }

  #[tokio::test]
  async fn job_lookup_finds_and_404s() {
    let state = make_state("secret").await;
    let auth = auth_header("admin", "secret");
    let job = state
      .store
      .enqueue(NewJob::new(JobKind::CleanupData, json!({})))
      .await
      .unwrap();

    let uri = format!("/api/jobs/{}", job.job_id);
    let response =
      request(state.clone(), "GET", &uri, Some(&auth), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let found = body_json(response).await;
    assert_eq!(found["job_id"], job.job_id.to_string());

    let uri = format!("/api/jobs/{}", Uuid::new_v4());
    let response = request(state, "GET", &uri, Some(&auth), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert!(
      body["error"].as_str().unwrap().contains("not found"),
      "unexpected error body: {body}"
    );
  }

  #[tokio::test]
  async fn stats_reflect_the_store() {
    let state = make_state("secret").await;
    let auth = auth_header("admin", "secret");
    for _ in 0..2 {
      state
        .store
        .enqueue(NewJob::new(JobKind::CleanupData, json!({})))
        .await
        .unwrap();
    }
    let claimed = state.store.claim_next().await.unwrap().unwrap();
    state.store.complete(claimed.job_id).await.unwrap();

    let response =
      request(state, "GET", "/api/jobs/stats", Some(&auth), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let stats = body_json(response).await;
    assert_eq!(
      stats,
      json!({ "queued": 1, "running": 0, "completed": 1, "failed": 0 })
    );
  }

  // ── Accounts ────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn accounts_roundtrip() {
    let state = make_state("secret").await;
    let auth = auth_header("admin", "secret");

    let response = request(
      state.clone(),
      "POST",
      "/api/accounts",
      Some(&auth),
      Some(json!({ "display_name": "Acme", "retention_days": 30 })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let account = body_json(response).await;
    assert_eq!(account["display_name"], "Acme");
    assert_eq!(account["retention_days"], 30);

    let response = request(
      state.clone(),
      "POST",
      "/api/accounts",
      Some(&auth),
      Some(json!({ "display_name": "Globex" })),
    )
    .await;
    let account = body_json(response).await;
    assert_eq!(account["retention_days"], 90);

    let response =
      request(state, "GET", "/api/accounts", Some(&auth), None).await;
    let listed = body_json(response).await;
    assert_eq!(listed.as_array().unwrap().len(), 2);
  }

  // ── Pages ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn page_connect_encrypts_and_never_leaks_the_token() {
    let state = make_state("secret").await;
    let auth = auth_header("admin", "secret");

    let response = request(
      state.clone(),
      "POST",
      "/api/accounts",
      Some(&auth),
      Some(json!({ "display_name": "Acme" })),
    )
    .await;
    let account = body_json(response).await;
    let account_id = account["account_id"].as_str().unwrap().to_owned();

    let response = request(
      state.clone(),
      "POST",
      "/api/pages",
      Some(&auth),
      Some(json!({
        "account_id":   account_id,
        "external_id":  "fb-page-1",
        "name":         "Acme Fan Page",
        "access_token": "tok-plain",
      })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
      .await
      .unwrap();
    let text = std::str::from_utf8(&bytes).unwrap();
    assert!(!text.contains("tok-plain"), "token leaked: {text}");
    let page: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(page.get("encrypted_token").is_none());
    assert_eq!(page["platform"], "facebook");

    // The stored envelope must decrypt back to what was posted.
    let page_id: Uuid = page["page_id"].as_str().unwrap().parse().unwrap();
    let stored = state.store.get_page(page_id).await.unwrap().unwrap();
    assert_ne!(stored.encrypted_token, "tok-plain");
    let plaintext = state.vault.decrypt(&stored.encrypted_token).unwrap();
    assert_eq!(plaintext, "tok-plain");

    let response =
      request(state.clone(), "GET", "/api/pages", Some(&auth), None).await;
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
      .await
      .unwrap();
    let text = std::str::from_utf8(&bytes).unwrap();
    assert!(!text.contains("tok-plain"), "token leaked in list: {text}");

    let response = request(
      state,
      "POST",
      "/api/pages",
      Some(&auth),
      Some(json!({
        "account_id":   Uuid::new_v4(),
        "external_id":  "fb-page-2",
        "name":         "Ghost Page",
        "access_token": "tok-ghost",
      })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
  }
}
