//! Re-validate page credentials and extend the ones nearing expiry.

use roost_core::store::{ContentStore, JobStore};
use serde_json::Value;

use crate::{HandlerError, Result, context::JobContext};

/// Tokens expiring within this many days get exchanged proactively.
const REFRESH_AHEAD_DAYS: i64 = 7;

pub async fn refresh_tokens<S>(
  ctx: JobContext<S>,
  _payload: Value,
) -> Result<()>
where
  S: JobStore + ContentStore + Clone + Send + Sync + 'static,
{
  let pages = ctx
    .store
    .list_pages(true)
    .await
    .map_err(|e| HandlerError::Store(Box::new(e)))?;
  let horizon = ctx.clock.now() + chrono::Duration::days(REFRESH_AHEAD_DAYS);

  for page in pages {
    let token = match ctx.vault.decrypt(&page.encrypted_token) {
      Ok(token) => token,
      Err(error) => {
        tracing::warn!(
          page_id = %page.page_id,
          %error,
          "stored credential is unreadable, deactivating page",
        );
        ctx
          .store
          .set_page_active(page.page_id, false)
          .await
          .map_err(|e| HandlerError::Store(Box::new(e)))?;
        continue;
      }
    };

    let info = ctx.graph.debug_token(&token).await?;
    if !info.is_valid {
      tracing::warn!(
        page_id = %page.page_id,
        "platform rejects the token, deactivating page",
      );
      ctx
        .store
        .set_page_active(page.page_id, false)
        .await
        .map_err(|e| HandlerError::Store(Box::new(e)))?;
      continue;
    }

    // Tokens without a known expiry never qualify for an exchange.
    if !matches!(info.expires_at, Some(at) if at <= horizon) {
      continue;
    }

    let exchanged = ctx.graph.exchange_token(&token).await?;
    let envelope = ctx.vault.encrypt(&exchanged.access_token)?;
    ctx
      .store
      .update_page_token(page.page_id, &envelope, exchanged.expires_at)
      .await
      .map_err(|e| HandlerError::Store(Box::new(e)))?;
    tracing::info!(
      page_id = %page.page_id,
      expires_at = ?exchanged.expires_at,
      "token refreshed",
    );
  }

  Ok(())
}
