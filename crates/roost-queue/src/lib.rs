//! Durable job execution: handler registry, job context, and the polling
//! scheduler.
//!
//! The queue itself lives in the store (anything implementing
//! [`roost_core::store::JobStore`]); this crate is the code that drains it.
//! [`handlers`] holds the five built-in job implementations.

pub mod context;
pub mod error;
pub mod handler;
pub mod handlers;
pub mod scheduler;

pub use self::{
  context::JobContext,
  error::{HandlerError, Result},
  handler::{HandlerFn, HandlerRegistry},
  scheduler::{Scheduler, SchedulerConfig, SchedulerHandle},
};

#[cfg(test)]
mod tests;
