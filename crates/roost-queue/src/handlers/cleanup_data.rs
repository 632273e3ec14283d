//! Apply per-account retention, then sweep orphaned rows.

use roost_core::{
  content::PruneCounts,
  store::{ContentStore, JobStore},
};
use serde_json::Value;

use crate::{HandlerError, Result, context::JobContext};

pub async fn cleanup_data<S>(ctx: JobContext<S>, _payload: Value) -> Result<()>
where
  S: JobStore + ContentStore + Clone + Send + Sync + 'static,
{
  let now = ctx.clock.now();
  let mut removed = PruneCounts::default();

  let accounts = ctx
    .store
    .list_accounts()
    .await
    .map_err(|e| HandlerError::Store(Box::new(e)))?;
  for account in accounts {
    let cutoff =
      now - chrono::Duration::days(i64::from(account.retention_days));
    let counts = ctx
      .store
      .prune_older_than(account.account_id, cutoff)
      .await
      .map_err(|e| HandlerError::Store(Box::new(e)))?;
    if counts.total() > 0 {
      tracing::info!(
        account_id = %account.account_id,
        posts = counts.posts,
        comments = counts.comments,
        analyses = counts.analyses,
        "retention window enforced",
      );
    }
    removed += counts;
  }

  // The orphan sweep runs even when retention removed nothing; it also
  // covers content whose page was deactivated since the last run.
  let orphans = ctx
    .store
    .prune_orphans()
    .await
    .map_err(|e| HandlerError::Store(Box::new(e)))?;
  if orphans.total() > 0 {
    tracing::info!(
      posts = orphans.posts,
      comments = orphans.comments,
      analyses = orphans.analyses,
      "orphaned rows swept",
    );
  }
  removed += orphans;

  tracing::debug!(total = removed.total(), "cleanup complete");
  Ok(())
}
