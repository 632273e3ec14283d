//! Pull the comments under one post and fan out sentiment analyses.

use roost_core::{
  content::NewComment,
  job::{JobKind, NewJob},
  store::{ContentStore, JobStore},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::AnalyzeSentimentPayload;
use crate::{HandlerError, Result, context::JobContext};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchCommentsPayload {
  pub page_id: Uuid,
  pub post_id: Uuid,
}

pub async fn fetch_comments<S>(
  ctx: JobContext<S>,
  payload: Value,
) -> Result<()>
where
  S: JobStore + ContentStore + Clone + Send + Sync + 'static,
{
  let payload: FetchCommentsPayload = serde_json::from_value(payload)?;

  let page = ctx
    .store
    .get_page(payload.page_id)
    .await
    .map_err(|e| HandlerError::Store(Box::new(e)))?
    .ok_or_else(|| {
      HandlerError::NotFound(format!("page {}", payload.page_id))
    })?;
  if !page.is_active {
    tracing::info!(page_id = %page.page_id, "page is inactive, skipping");
    return Ok(());
  }

  let post = ctx
    .store
    .get_post(payload.post_id)
    .await
    .map_err(|e| HandlerError::Store(Box::new(e)))?
    .ok_or_else(|| {
      HandlerError::NotFound(format!("post {}", payload.post_id))
    })?;

  let token = ctx.vault.decrypt(&page.encrypted_token).map_err(|e| {
    HandlerError::InvalidCredential(format!("page {}: {e}", page.page_id))
  })?;
  let comments = ctx
    .graph
    .page(&page.external_id, &token)
    .comments(&post.external_id)
    .await?;

  let total = comments.len();
  let mut fanned_out = 0_usize;
  for comment in comments {
    let stored = ctx
      .store
      .upsert_comment(NewComment {
        post_id:     post.post_id,
        external_id: comment.id,
        platform:    page.platform.clone(),
        message:     comment.message,
        author_name: comment.from.map(|author| author.name),
        posted_at:   comment.created_time,
        like_count:  comment.like_count,
      })
      .await
      .map_err(|e| HandlerError::Store(Box::new(e)))?;

    let follow_up = NewJob::new(
      JobKind::AnalyzeSentiment,
      serde_json::to_value(AnalyzeSentimentPayload {
        comment_id: stored.comment_id,
      })?,
    );
    if ctx
      .store
      .enqueue_dedup(follow_up)
      .await
      .map_err(|e| HandlerError::Store(Box::new(e)))?
      .is_some()
    {
      fanned_out += 1;
    }
  }

  tracing::info!(
    post_id = %post.post_id,
    comments = total,
    analysis_jobs = fanned_out,
    "comment fetch complete",
  );
  Ok(())
}
