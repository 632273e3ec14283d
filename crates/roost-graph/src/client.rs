//! The Graph API client proper.
//!
//! Every outbound request flows through [`GraphApi::get_json`], which is
//! where rate limiting, transient-failure retry, and error-body parsing all
//! live. The typed endpoint methods above it only build URLs and deserialise.

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use roost_core::retry::RetryPolicy;
use serde::{Deserialize, de::DeserializeOwned};
use tokio::sync::Mutex;

use crate::{
  error::{Error, Result},
  limiter::RateLimiter,
};

/// Limiter scope for endpoints that authenticate as the app rather than as a
/// page (`debug_token`, token exchange).
const APP_SCOPE: &str = "app";

/// Page size requested from the platform; pagination handles the rest.
const PAGE_LIMIT: &str = "100";

// ─── Config ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct GraphConfig {
  /// Versioned API root, no trailing slash.
  pub base_url:            String,
  pub app_id:              String,
  pub app_secret:          String,
  /// Rate-limit budget per page per window.
  pub requests_per_window: usize,
  pub window:              Duration,
  /// Pagination stops after this many posts per fetch.
  pub post_cap:            usize,
  /// Pagination stops after this many comments per post.
  pub comment_cap:         usize,
  /// Transient-failure retry for individual requests.
  pub retry:               RetryPolicy,
  pub timeout:             Duration,
}

impl Default for GraphConfig {
  fn default() -> Self {
    Self {
      base_url:            "https://graph.facebook.com/v19.0".to_owned(),
      app_id:              String::new(),
      app_secret:          String::new(),
      requests_per_window: 200,
      window:              Duration::from_secs(3600),
      post_cap:            1000,
      comment_cap:         10_000,
      retry:               RetryPolicy::api(),
      timeout:             Duration::from_secs(30),
    }
  }
}

// ─── Wire types ──────────────────────────────────────────────────────────────

/// A post as the platform reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphPost {
  pub id:            String,
  #[serde(default)]
  pub message:       String,
  pub permalink_url: Option<String>,
  pub created_time:  DateTime<Utc>,
  #[serde(default)]
  pub comment_count: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphAuthor {
  pub name: String,
}

/// A comment as the platform reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphComment {
  pub id:           String,
  #[serde(default)]
  pub message:      String,
  pub from:         Option<GraphAuthor>,
  pub created_time: DateTime<Utc>,
  #[serde(default)]
  pub like_count:   u32,
}

/// Result of a `debug_token` introspection call.
#[derive(Debug, Clone)]
pub struct TokenInfo {
  pub is_valid:   bool,
  pub expires_at: Option<DateTime<Utc>>,
}

/// Result of exchanging a token for a long-lived one.
#[derive(Debug, Clone)]
pub struct ExchangedToken {
  pub access_token: String,
  pub expires_at:   Option<DateTime<Utc>>,
}

/// The standard list envelope: a `data` array plus an optional cursor block.
#[derive(Debug, Deserialize)]
struct ListEnvelope<T> {
  #[serde(default = "Vec::new")]
  data:   Vec<T>,
  paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
struct Paging {
  next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DebugTokenEnvelope {
  data: DebugTokenData,
}

#[derive(Debug, Deserialize)]
struct DebugTokenData {
  #[serde(default)]
  is_valid:   bool,
  /// Unix seconds; the platform sends 0 for tokens that never expire.
  expires_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ExchangeResponse {
  access_token: String,
  /// Lifetime in seconds from now; absent for non-expiring tokens.
  expires_in:   Option<i64>,
}

// ─── Client ──────────────────────────────────────────────────────────────────

pub struct GraphApi {
  http:     reqwest::Client,
  config:   GraphConfig,
  limiters: Mutex<HashMap<String, Arc<RateLimiter>>>,
}

impl GraphApi {
  pub fn new(config: GraphConfig) -> Result<Self> {
    let http = reqwest::Client::builder().timeout(config.timeout).build()?;
    Ok(Self { http, config, limiters: Mutex::new(HashMap::new()) })
  }

  /// Scope requests to one page, using its own credential and rate budget.
  pub fn page(&self, external_id: &str, access_token: &str) -> PageClient<'_> {
    PageClient {
      api:         self,
      external_id: external_id.to_owned(),
      token:       access_token.to_owned(),
    }
  }

  /// Introspect a page token via the app credential.
  pub async fn debug_token(&self, token: &str) -> Result<TokenInfo> {
    let url = format!("{}/debug_token", self.config.base_url);
    let app_token =
      format!("{}|{}", self.config.app_id, self.config.app_secret);
    let query = vec![
      ("input_token".to_owned(), token.to_owned()),
      ("access_token".to_owned(), app_token),
    ];

    let body = self.get_json(APP_SCOPE, &url, &query).await?;
    let envelope: DebugTokenEnvelope = serde_json::from_value(body)?;
    Ok(TokenInfo {
      is_valid:   envelope.data.is_valid,
      expires_at: envelope
        .data
        .expires_at
        .filter(|&secs| secs > 0)
        .and_then(|secs| DateTime::from_timestamp(secs, 0)),
    })
  }

  /// Trade a short-lived page token for a long-lived one.
  pub async fn exchange_token(&self, token: &str) -> Result<ExchangedToken> {
    let url = format!("{}/oauth/access_token", self.config.base_url);
    let query = vec![
      ("grant_type".to_owned(), "fb_exchange_token".to_owned()),
      ("client_id".to_owned(), self.config.app_id.clone()),
      ("client_secret".to_owned(), self.config.app_secret.clone()),
      ("fb_exchange_token".to_owned(), token.to_owned()),
    ];

    let body = self.get_json(APP_SCOPE, &url, &query).await?;
    let response: ExchangeResponse = serde_json::from_value(body)?;
    Ok(ExchangedToken {
      access_token: response.access_token,
      expires_at:   response
        .expires_in
        .map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
    })
  }

  async fn limiter(&self, scope: &str) -> Arc<RateLimiter> {
    let mut limiters = self.limiters.lock().await;
    Arc::clone(limiters.entry(scope.to_owned()).or_insert_with(|| {
      Arc::new(RateLimiter::new(
        self.config.requests_per_window,
        self.config.window,
      ))
    }))
  }

  /// One rate-limited GET with bounded retry.
  ///
  /// Transport errors, HTTP 429, and 5xx are retried with exponential
  /// backoff up to the policy's attempt budget; other 4xx fail immediately.
  /// Every attempt, retries included, consumes a rate-limit slot.
  async fn get_json(
    &self,
    scope: &str,
    url: &str,
    query: &[(String, String)],
  ) -> Result<serde_json::Value> {
    let limiter = self.limiter(scope).await;
    let mut attempt: u32 = 0;

    loop {
      limiter.acquire().await;

      let error = match self.http.get(url).query(query).send().await {
        Ok(response) => {
          let status = response.status();
          if status.is_success() {
            return Ok(response.json().await?);
          }

          let body = response.text().await.unwrap_or_default();
          let message = error_message(&body);
          if status.as_u16() == 429 {
            Error::RateLimited { message }
          } else if status.is_server_error() {
            Error::Api { status: status.as_u16(), message }
          } else {
            // Bad request, bad token, missing object: retrying won't help.
            return Err(Error::Api { status: status.as_u16(), message });
          }
        }
        Err(e) => Error::Transport(e),
      };

      attempt += 1;
      if attempt >= self.config.retry.max_attempts {
        return Err(error);
      }
      let delay = self.config.retry.delay(attempt - 1);
      tracing::debug!(
        url,
        attempt,
        delay_ms = delay.as_millis() as u64,
        error = %error,
        "transient graph failure, backing off",
      );
      tokio::time::sleep(delay).await;
    }
  }

  /// Follow `paging.next` cursors, collecting at most `cap` items.
  async fn list_all<T: DeserializeOwned>(
    &self,
    scope: &str,
    first_url: String,
    first_query: Vec<(String, String)>,
    cap: usize,
  ) -> Result<Vec<T>> {
    let mut items: Vec<T> = Vec::new();
    let mut next = Some((first_url, first_query));

    while let Some((url, query)) = next {
      let body = self.get_json(scope, &url, &query).await?;
      let envelope: ListEnvelope<T> = serde_json::from_value(body)?;

      if envelope.data.is_empty() {
        // No forward progress is possible; ignore any cursor.
        break;
      }
      for item in envelope.data {
        items.push(item);
        if items.len() >= cap {
          tracing::debug!(cap, url, "item cap reached, stopping pagination");
          return Ok(items);
        }
      }

      // `next` URLs embed the cursor and credentials already.
      next = envelope
        .paging
        .and_then(|p| p.next)
        .map(|url| (url, Vec::new()));
    }

    Ok(items)
  }
}

// ─── PageClient ──────────────────────────────────────────────────────────────

/// A [`GraphApi`] handle scoped to one page's external id and access token.
pub struct PageClient<'a> {
  api:         &'a GraphApi,
  external_id: String,
  token:       String,
}

impl PageClient<'_> {
  /// The page's recent posts, newest first, capped at the configured
  /// per-fetch budget.
  pub async fn posts(&self) -> Result<Vec<GraphPost>> {
    let url =
      format!("{}/{}/posts", self.api.config.base_url, self.external_id);
    let query = vec![
      ("access_token".to_owned(), self.token.clone()),
      (
        "fields".to_owned(),
        "id,message,permalink_url,created_time,comment_count".to_owned(),
      ),
      ("limit".to_owned(), PAGE_LIMIT.to_owned()),
    ];
    self
      .api
      .list_all(&self.external_id, url, query, self.api.config.post_cap)
      .await
  }

  /// The comments under one of the page's posts.
  pub async fn comments(
    &self,
    post_external_id: &str,
  ) -> Result<Vec<GraphComment>> {
    let url = format!(
      "{}/{}/comments",
      self.api.config.base_url, post_external_id
    );
    let query = vec![
      ("access_token".to_owned(), self.token.clone()),
      (
        "fields".to_owned(),
        "id,message,from,created_time,like_count".to_owned(),
      ),
      ("limit".to_owned(), PAGE_LIMIT.to_owned()),
    ];
    self
      .api
      .list_all(&self.external_id, url, query, self.api.config.comment_cap)
      .await
  }
}

// ─── Error bodies ────────────────────────────────────────────────────────────

/// Pull the human-readable message out of a Graph error body, falling back
/// to the raw body when it isn't the documented shape.
fn error_message(body: &str) -> String {
  let parsed: serde_json::Value =
    serde_json::from_str(body).unwrap_or_default();
  if let Some(message) = parsed
    .get("error")
    .and_then(|e| e.get("message"))
    .and_then(|m| m.as_str())
  {
    return message.to_owned();
  }
  if body.is_empty() {
    "unknown error".to_owned()
  } else {
    body.to_owned()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn error_message_prefers_the_documented_field() {
    let body = r#"{"error":{"message":"Invalid OAuth access token","code":190}}"#;
    assert_eq!(error_message(body), "Invalid OAuth access token");
  }

  #[test]
  fn error_message_falls_back_to_the_raw_body() {
    assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
    assert_eq!(error_message(""), "unknown error");
    assert_eq!(error_message(r#"{"other":"shape"}"#), r#"{"other":"shape"}"#);
  }
}
