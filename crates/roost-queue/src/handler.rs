use std::{collections::HashMap, future::Future};

use futures_util::{FutureExt as _, future::BoxFuture};
use roost_core::{
  job::JobKind,
  store::{ContentStore, JobStore},
};
use serde_json::Value;

use crate::{Result, context::JobContext, handlers};

/// A boxed handler: one delivery of one job.
pub type HandlerFn<S> = Box<
  dyn Fn(JobContext<S>, Value) -> BoxFuture<'static, Result<()>>
    + Send
    + Sync,
>;

/// Maps each [`JobKind`] to the code that runs it.
pub struct HandlerRegistry<S> {
  handlers: HashMap<JobKind, HandlerFn<S>>,
}

impl<S> HandlerRegistry<S>
where
  S: JobStore + ContentStore + Clone + Send + Sync + 'static,
{
  pub fn new() -> Self {
    Self {
      handlers: HashMap::new(),
    }
  }

  /// A registry with all five built-in handlers.
  pub fn builtin() -> Self {
    let mut registry = Self::new();
    registry.register(JobKind::FetchPosts, handlers::fetch_posts);
    registry.register(JobKind::FetchComments, handlers::fetch_comments);
    registry.register(JobKind::AnalyzeSentiment, handlers::analyze_sentiment);
    registry.register(JobKind::RefreshTokens, handlers::refresh_tokens);
    registry.register(JobKind::CleanupData, handlers::cleanup_data);
    registry
  }

  /// Register (or replace) the handler for one kind.
  pub fn register<F, Fut>(&mut self, kind: JobKind, handler: F)
  where
    F: Fn(JobContext<S>, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
  {
    self.handlers.insert(
      kind,
      Box::new(move |ctx, payload| handler(ctx, payload).boxed()),
    );
  }

  pub fn get(&self, kind: JobKind) -> Option<&HandlerFn<S>> {
    self.handlers.get(&kind)
  }
}

impl<S> Default for HandlerRegistry<S>
where
  S: JobStore + ContentStore + Clone + Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}
