//! Injectable time source.
//!
//! Every timestamp the system writes flows through a [`Clock`], which is what
//! lets the scheduling, backoff, and retention tests pin time down instead of
//! sleeping.

use std::{
  sync::atomic::{AtomicI64, Ordering},
  time::Duration,
};

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}

/// A clock that only moves when told to. Microsecond resolution.
#[derive(Debug)]
pub struct ManualClock {
  micros: AtomicI64,
}

impl ManualClock {
  pub fn new(start: DateTime<Utc>) -> Self {
    Self { micros: AtomicI64::new(start.timestamp_micros()) }
  }

  pub fn advance(&self, by: Duration) {
    self.micros.fetch_add(by.as_micros() as i64, Ordering::SeqCst);
  }

  pub fn set(&self, to: DateTime<Utc>) {
    self.micros.store(to.timestamp_micros(), Ordering::SeqCst);
  }
}

impl Clock for ManualClock {
  fn now(&self) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(self.micros.load(Ordering::SeqCst))
      .unwrap_or_default()
  }
}
