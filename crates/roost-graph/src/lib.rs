//! HTTP client for Graph-style social platform APIs.
//!
//! One [`GraphApi`] is shared by every job handler. It owns the per-page
//! rate limiters, retries transient failures with bounded backoff, and
//! follows cursor pagination up to the configured item caps.

pub mod client;
pub mod error;
pub mod limiter;

pub use crate::{
  client::{
    ExchangedToken, GraphApi, GraphAuthor, GraphComment, GraphConfig,
    GraphPost, PageClient, TokenInfo,
  },
  error::{Error, Result},
  limiter::RateLimiter,
};
