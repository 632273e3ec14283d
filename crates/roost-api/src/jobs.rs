//! Job queue endpoints.
//!
//! | method | path              | action                     |
//! |--------|-------------------|----------------------------|
//! | POST   | `/api/jobs`       | enqueue a job              |
//! | GET    | `/api/jobs/stats` | queue counters by status   |
//! | GET    | `/api/jobs/{id}`  | fetch a single job         |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use roost_core::{
  job::{Job, JobKind, NewJob, QueueStats},
  store::JobStore,
};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{AppState, auth::Authenticated, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct EnqueueBody {
  pub kind:         JobKind,
  /// Handler-specific arguments; defaults to an empty object.
  pub payload:      Option<Value>,
  pub max_attempts: Option<u32>,
}

/// Enqueue a job for the scheduler to pick up. This is the only way work
/// enters the queue from outside the process.
pub async fn enqueue<S: JobStore>(
  _auth: Authenticated,
  State(state): State<AppState<S>>,
  Json(body): Json<EnqueueBody>,
) -> Result<(StatusCode, Json<Job>), ApiError> {
  if body.max_attempts == Some(0) {
    return Err(ApiError::BadRequest(
      "max_attempts must be at least 1".to_owned(),
    ));
  }

  let mut new_job =
    NewJob::new(body.kind, body.payload.unwrap_or_else(|| json!({})));
  if let Some(max_attempts) = body.max_attempts {
    new_job.max_attempts = max_attempts;
  }

  let job = state
    .store
    .enqueue(new_job)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;

  Ok((StatusCode::ACCEPTED, Json(job)))
}

/// Counts of jobs per status, for dashboards and health checks.
pub async fn stats<S: JobStore>(
  _auth: Authenticated,
  State(state): State<AppState<S>>,
) -> Result<Json<QueueStats>, ApiError> {
  let stats = state
    .store
    .queue_stats()
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(stats))
}

/// Fetch one job by id, including its attempt count and last error.
pub async fn get_one<S: JobStore>(
  _auth: Authenticated,
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Job>, ApiError> {
  let job = state
    .store
    .get_job(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("job {id} not found")))?;
  Ok(Json(job))
}
