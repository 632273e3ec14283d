//! The built-in job handlers, one module per [`JobKind`].
//!
//! Handlers are free functions over any store implementing both store
//! traits. Each receives a cloned [`JobContext`] and its job's raw payload,
//! and returns the error that should be recorded on the job row.
//!
//! [`JobKind`]: roost_core::job::JobKind
//! [`JobContext`]: crate::context::JobContext

mod analyze_sentiment;
mod cleanup_data;
mod fetch_comments;
mod fetch_posts;
mod refresh_tokens;

pub use self::{
  analyze_sentiment::{AnalyzeSentimentPayload, analyze_sentiment},
  cleanup_data::cleanup_data,
  fetch_comments::{FetchCommentsPayload, fetch_comments},
  fetch_posts::{FetchPostsPayload, fetch_posts},
  refresh_tokens::refresh_tokens,
};
