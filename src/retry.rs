//! Retry with exponential backoff for calls against the completion backend.
//!
//! The policy is a plain value: delay computation is pure and `run` drives
//! an async fallible closure, sleeping between attempts. Callers decide what
//! counts as retryable by what they return.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
  /// Total attempts, not re-attempts after the first.
  pub max_retries: u32,
  pub base_delay: Duration,
  pub max_delay: Duration,
  pub multiplier: f64,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_retries: 3,
      base_delay: Duration::from_secs(1),
      max_delay: Duration::from_secs(30),
      multiplier: 2.0,
    }
  }
}

impl RetryPolicy {
  /// Backoff before the attempt after `attempt` (0-based): base * m^attempt,
  /// capped at `max_delay`.
  pub fn delay_for(&self, attempt: u32) -> Duration {
    let scaled = self.base_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
    Duration::from_secs_f64(scaled.min(self.max_delay.as_secs_f64()))
  }

  /// Run `op` up to `max_retries` times, sleeping the backoff delay between
  /// failures. Returns the first success or the last error.
  pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, E>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
  {
    let mut attempt = 0u32;
    loop {
      match op().await {
        Ok(v) => return Ok(v),
        Err(e) => {
          attempt += 1;
          if attempt >= self.max_retries {
            warn!(target: "exam", %label, attempts = attempt, error = %e, "Retries exhausted");
            return Err(e);
          }
          let delay = self.delay_for(attempt - 1);
          warn!(target: "exam", %label, attempt, delay_ms = delay.as_millis() as u64, error = %e, "Attempt failed, backing off");
          tokio::time::sleep(delay).await;
        }
      }
    }
  }
}
