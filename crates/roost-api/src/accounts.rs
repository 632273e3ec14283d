//! Account endpoints.
//!
//! | method | path            | action             |
//! |--------|-----------------|--------------------|
//! | POST   | `/api/accounts` | create an account  |
//! | GET    | `/api/accounts` | list accounts      |

use axum::{Json, extract::State, http::StatusCode};
use roost_core::{
  page::{Account, NewAccount},
  store::ContentStore,
};
use serde::Deserialize;

use crate::{AppState, auth::Authenticated, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub display_name:   String,
  /// Days of content to keep; defaults to the standard retention window.
  pub retention_days: Option<u32>,
}

pub async fn create<S: ContentStore>(
  _auth: Authenticated,
  State(state): State<AppState<S>>,
  Json(body): Json<CreateBody>,
) -> Result<(StatusCode, Json<Account>), ApiError> {
  let mut new_account = NewAccount::new(body.display_name);
  if let Some(retention_days) = body.retention_days {
    new_account.retention_days = retention_days;
  }

  let account = state
    .store
    .add_account(new_account)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;

  Ok((StatusCode::CREATED, Json(account)))
}

pub async fn list<S: ContentStore>(
  _auth: Authenticated,
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<Account>>, ApiError> {
  let accounts = state
    .store
    .list_accounts()
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(accounts))
}
