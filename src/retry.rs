//! Bounded retry for store writes that lose a SQLite lock race.

use std::future::Future;
use std::time::Duration;

use crate::error::{EngineError, EngineResult};

/// Exponential backoff applied only to busy/locked database errors. Every
/// other error is returned immediately.
#[derive(Debug, Clone, Copy)]
pub struct WriteRetry {
  pub max_retries: u32,
  pub base_delay: Duration,
}

impl Default for WriteRetry {
  fn default() -> Self {
    Self {
      max_retries: 8,
      base_delay: Duration::from_millis(5),
    }
  }
}

impl WriteRetry {
  pub async fn run<F, Fut, T>(&self, operation: &str, mut f: F) -> EngineResult<T>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = EngineResult<T>>,
  {
    let mut attempt = 0u32;
    loop {
      match f().await {
        Ok(v) => return Ok(v),
        Err(e) if e.is_busy() => {
          attempt += 1;
          if attempt > self.max_retries {
            tracing::warn!(operation, attempts = attempt, "giving up on contended write");
            return Err(EngineError::ConcurrencyConflict(format!(
              "{} did not complete after {} attempts: {}",
              operation, attempt, e
            )));
          }
          let delay = self.base_delay * (1u32 << attempt.min(6));
          tracing::debug!(operation, attempt, ?delay, "store busy, retrying");
          tokio::time::sleep(delay).await;
        }
        Err(e) => return Err(e),
      }
    }
  }
}
