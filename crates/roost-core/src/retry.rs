//! Bounded exponential backoff.
//!
//! Two instances exist in a running system with very different tunings: the
//! Graph client retries transient faults on a scale of seconds, and the job
//! store re-queues failed jobs on a scale of minutes. The formula is shared.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  pub max_attempts: u32,
  pub base:         Duration,
  pub cap:          Duration,
}

impl RetryPolicy {
  pub fn new(max_attempts: u32, base: Duration, cap: Duration) -> Self {
    Self { max_attempts, base, cap }
  }

  /// In-process retry of outbound API calls: 3 attempts, 1s base, 30s cap.
  pub fn api() -> Self {
    Self::new(3, Duration::from_secs(1), Duration::from_secs(30))
  }

  /// Cross-delivery re-queue of failed jobs: 60s base, 15min cap. The attempt
  /// budget lives on the job row, so `max_attempts` here is advisory.
  pub fn job() -> Self {
    Self::new(3, Duration::from_secs(60), Duration::from_secs(15 * 60))
  }

  /// Delay before retry number `attempt` (zero-based): `base * 2^attempt`,
  /// capped.
  pub fn delay(&self, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt);
    self.base.saturating_mul(factor).min(self.cap)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn doubles_per_attempt() {
    let policy =
      RetryPolicy::new(5, Duration::from_secs(1), Duration::from_secs(600));
    assert_eq!(policy.delay(0), Duration::from_secs(1));
    assert_eq!(policy.delay(1), Duration::from_secs(2));
    assert_eq!(policy.delay(2), Duration::from_secs(4));
    assert_eq!(policy.delay(3), Duration::from_secs(8));
  }

  #[test]
  fn honours_the_cap() {
    let policy = RetryPolicy::api();
    assert_eq!(policy.delay(10), Duration::from_secs(30));
    // Absurd attempt numbers must not overflow.
    assert_eq!(policy.delay(u32::MAX), Duration::from_secs(30));
  }

  #[test]
  fn job_policy_starts_at_a_minute() {
    let policy = RetryPolicy::job();
    assert_eq!(policy.delay(0), Duration::from_secs(60));
    assert_eq!(policy.delay(1), Duration::from_secs(120));
    assert_eq!(policy.delay(8), Duration::from_secs(900));
  }
}
