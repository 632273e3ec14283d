//! Page endpoints.
//!
//! | method | path         | action                        |
//! |--------|--------------|-------------------------------|
//! | POST   | `/api/pages` | connect (or re-connect) a page|
//! | GET    | `/api/pages` | list connected pages          |

use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use roost_core::{
  page::{NewPage, Page},
  store::ContentStore,
};
use serde::Deserialize;

use crate::{AppState, auth::Authenticated, error::ApiError};
use uuid::Uuid;

fn default_platform() -> String { "facebook".to_owned() }

#[derive(Debug, Deserialize)]
pub struct ConnectBody {
  pub account_id:   Uuid,
  pub external_id:  String,
  #[serde(default = "default_platform")]
  pub platform:     String,
  pub name:         String,
  /// Plaintext page token; encrypted before it reaches the store.
  pub access_token: String,
  pub expires_at:   Option<DateTime<Utc>>,
}

/// Connect a page to an account. The access token is sealed into the vault
/// envelope here; nothing downstream ever sees the plaintext again.
pub async fn connect<S: ContentStore>(
  _auth: Authenticated,
  State(state): State<AppState<S>>,
  Json(body): Json<ConnectBody>,
) -> Result<(StatusCode, Json<Page>), ApiError> {
  let account = state
    .store
    .get_account(body.account_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  if account.is_none() {
    return Err(ApiError::NotFound(format!(
      "account {} not found",
      body.account_id
    )));
  }

  let encrypted_token = state.vault.encrypt(&body.access_token)?;
  let page = state
    .store
    .add_page(NewPage {
      account_id:       body.account_id,
      external_id:      body.external_id,
      platform:         body.platform,
      name:             body.name,
      encrypted_token,
      token_expires_at: body.expires_at,
    })
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;

  Ok((StatusCode::CREATED, Json(page)))
}

/// List all connected pages, deactivated ones included.
pub async fn list<S: ContentStore>(
  _auth: Authenticated,
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<Page>>, ApiError> {
  let pages = state
    .store
    .list_pages(false)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(pages))
}
