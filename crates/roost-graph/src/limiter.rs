//! Sliding-window rate limiting.
//!
//! The platform budgets API calls per page per hour, so the client keeps one
//! [`RateLimiter`] per page external id (plus one for app-level endpoints).
//! Timestamps of recent requests live in a deque; a request that would
//! overflow the window sleeps until the oldest timestamp slides out.

use std::{collections::VecDeque, time::Duration};

use tokio::{sync::Mutex, time::Instant};

pub struct RateLimiter {
  window:       Duration,
  max_requests: usize,
  stamps:       Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
  pub fn new(max_requests: usize, window: Duration) -> Self {
    Self {
      window,
      // A zero budget would never admit anyone.
      max_requests: max_requests.max(1),
      stamps: Mutex::new(VecDeque::new()),
    }
  }

  /// Record one request, suspending first if the window is full. Fair only
  /// in the aggregate: concurrent waiters race for freed slots.
  pub async fn acquire(&self) {
    loop {
      let wait = {
        let mut stamps = self.stamps.lock().await;
        let now = Instant::now();
        while stamps
          .front()
          .is_some_and(|t| now.duration_since(*t) >= self.window)
        {
          stamps.pop_front();
        }
        if stamps.len() < self.max_requests {
          stamps.push_back(now);
          return;
        }
        match stamps.front() {
          Some(oldest) => {
            (*oldest + self.window).saturating_duration_since(now)
          }
          None => Duration::ZERO,
        }
      };
      tokio::time::sleep(wait).await;
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use super::*;

  #[tokio::test(start_paused = true)]
  async fn under_capacity_is_immediate() {
    let limiter = RateLimiter::new(3, Duration::from_secs(60));
    let start = Instant::now();
    for _ in 0..3 {
      limiter.acquire().await;
    }
    assert_eq!(start.elapsed(), Duration::ZERO);
  }

  #[tokio::test(start_paused = true)]
  async fn full_window_blocks_until_a_slot_expires() {
    let limiter = RateLimiter::new(2, Duration::from_secs(60));
    limiter.acquire().await;
    tokio::time::advance(Duration::from_secs(30)).await;
    limiter.acquire().await;

    // Window is full; the t=0 stamp expires at t=60, i.e. 30s from now.
    let start = Instant::now();
    limiter.acquire().await;
    assert_eq!(start.elapsed(), Duration::from_secs(30));
  }

  #[tokio::test(start_paused = true)]
  async fn spaced_requests_never_wait() {
    let limiter = RateLimiter::new(1, Duration::from_secs(10));
    for _ in 0..3 {
      let start = Instant::now();
      limiter.acquire().await;
      assert_eq!(start.elapsed(), Duration::ZERO);
      tokio::time::advance(Duration::from_secs(11)).await;
    }
  }

  #[tokio::test(start_paused = true)]
  async fn concurrent_callers_serialize() {
    let limiter = Arc::new(RateLimiter::new(1, Duration::from_secs(5)));
    let start = Instant::now();

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..3 {
      let limiter = Arc::clone(&limiter);
      tasks.spawn(async move { limiter.acquire().await });
    }
    while let Some(joined) = tasks.join_next().await {
      joined.unwrap();
    }

    // One slot per 5s window: admissions at t=0, t=5, t=10.
    assert_eq!(start.elapsed(), Duration::from_secs(10));
  }
}
