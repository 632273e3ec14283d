//! Pull a page's recent posts and fan out comment fetches.

use roost_core::{
  content::NewPost,
  job::{JobKind, NewJob},
  store::{ContentStore, JobStore},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::FetchCommentsPayload;
use crate::{HandlerError, Result, context::JobContext};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchPostsPayload {
  pub page_id: Uuid,
}

pub async fn fetch_posts<S>(ctx: JobContext<S>, payload: Value) -> Result<()>
where
  S: JobStore + ContentStore + Clone + Send + Sync + 'static,
{
  let payload: FetchPostsPayload = serde_json::from_value(payload)?;

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

  let token = ctx.vault.decrypt(&page.encrypted_token).map_err(|e| {
    HandlerError::InvalidCredential(format!("page {}: {e}", page.page_id))
  })?;
  let info = ctx.graph.debug_token(&token).await?;
  if !info.is_valid {
    return Err(HandlerError::InvalidCredential(format!(
      "page {}: platform rejects the token",
      page.page_id
    )));
  }

  let posts = ctx.graph.page(&page.external_id, &token).posts().await?;

  let total = posts.len();
  let mut fanned_out = 0_usize;
  for post in posts {
    let stored = ctx
      .store
      .upsert_post(NewPost {
        page_id:       page.page_id,
        external_id:   post.id,
        platform:      page.platform.clone(),
        message:       post.message,
        permalink:     post.permalink_url,
        posted_at:     post.created_time,
        comment_count: post.comment_count,
      })
      .await
      .map_err(|e| HandlerError::Store(Box::new(e)))?;

    if stored.comment_count == 0 {
      continue;
    }
    let follow_up = NewJob::new(
      JobKind::FetchComments,
      serde_json::to_value(FetchCommentsPayload {
        page_id: page.page_id,
        post_id: stored.post_id,
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
    page_id = %page.page_id,
    posts = total,
    comment_jobs = fanned_out,
    "post fetch complete",
  );
  Ok(())
}
