//! Score one comment and record the result.

use roost_core::{
  content::NewAnalysis,
  store::{ContentStore, JobStore},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{HandlerError, Result, context::JobContext};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeSentimentPayload {
  pub comment_id: Uuid,
}

pub async fn analyze_sentiment<S>(
  ctx: JobContext<S>,
  payload: Value,
) -> Result<()>
where
  S: JobStore + ContentStore + Clone + Send + Sync + 'static,
{
  let payload: AnalyzeSentimentPayload = serde_json::from_value(payload)?;

  // Re-deliveries and duplicate fan-out both land here. One row per comment.
  if ctx
    .store
    .has_analysis(payload.comment_id)
    .await
    .map_err(|e| HandlerError::Store(Box::new(e)))?
  {
    tracing::debug!(
      comment_id = %payload.comment_id,
      "comment already analyzed, skipping",
    );
    return Ok(());
  }

  let comment = ctx
    .store
    .get_comment(payload.comment_id)
    .await
    .map_err(|e| HandlerError::Store(Box::new(e)))?
    .ok_or_else(|| {
      HandlerError::NotFound(format!("comment {}", payload.comment_id))
    })?;

  let outcome = ctx.analyzer.analyze(&comment.message).await?;
  let sentiment = outcome.sentiment;
  ctx
    .store
    .insert_analysis(NewAnalysis::from_outcome(comment.comment_id, outcome))
    .await
    .map_err(|e| HandlerError::Store(Box::new(e)))?;

  tracing::debug!(
    comment_id = %comment.comment_id,
    sentiment = sentiment.discriminant(),
    "comment analyzed",
  );
  Ok(())
}
