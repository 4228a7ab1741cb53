//! Bounded retry with exponential backoff for store operations.

use std::{future::Future, time::Duration};

use puzzler_core::store::StoreError;
use tokio::time::sleep;
use tracing::warn;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Total attempts, the first one included.
  pub attempts:        u32,
  pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self { Self { attempts: 3, initial_backoff: Duration::from_millis(200) } }
}

/// Run `op` until it succeeds, fails with a non-transient error, or runs out
/// of attempts. The backoff doubles after every transient failure.
pub async fn with_retry<T, E, F, Fut>(
  policy: &RetryPolicy,
  operation: &'static str,
  mut op: F,
) -> Result<T>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = std::result::Result<T, E>>,
  E: StoreError,
{
  let mut attempt = 0;
  let mut backoff = policy.initial_backoff;

  loop {
    attempt += 1;
    match op().await {
      Ok(value) => return Ok(value),
      Err(e) if e.is_transient() && attempt < policy.attempts => {
        warn!(operation, attempt, error = %e, "transient store failure, retrying in {backoff:?}");
        sleep(backoff).await;
        backoff = backoff.saturating_mul(2);
      }
      Err(e) => {
        return Err(Error::Store { operation, source: Box::new(e) });
      }
    }
  }
}
