use std::time::Duration;

use carden_core::RemoteError;

const MAX_ATTEMPTS: u32 = 3;
const BASE_DELAY_MS: u64 = 250;

/// Run `op` up to [`MAX_ATTEMPTS`] times, backing off between attempts.
///
/// Only [`RemoteError::is_transient`] failures are retried; everything else
/// (auth, not-found, etag mismatch, malformed payloads) surfaces immediately.
pub async fn with_retry<T, F, Fut>(label: &str, mut op: F) -> Result<T, RemoteError>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<T, RemoteError>>,
{
  let mut attempt = 1;
  loop {
    match op().await {
      Ok(value) => return Ok(value),
      Err(err) if err.is_transient() && attempt < MAX_ATTEMPTS => {
        let delay = Duration::from_millis(BASE_DELAY_MS * (1 << (attempt - 1)));
        tracing::warn!(
          %err,
          attempt,
          delay_ms = delay.as_millis() as u64,
          "{label} failed, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
      }
      Err(err) => return Err(err),
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicU32, Ordering};

  use super::*;

  #[tokio::test(start_paused = true)]
  async fn transient_errors_are_retried_until_success() {
    let calls = AtomicU32::new(0);
    let result = with_retry("fetch", || {
      let n = calls.fetch_add(1, Ordering::SeqCst);
      async move {
        if n < 2 {
          Err(RemoteError::Transient("503".into()))
        } else {
          Ok(n)
        }
      }
    })
    .await;
    assert_eq!(result.unwrap(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test(start_paused = true)]
  async fn attempts_are_bounded() {
    let calls = AtomicU32::new(0);
    let result: Result<(), _> = with_retry("fetch", || {
      calls.fetch_add(1, Ordering::SeqCst);
      async { Err(RemoteError::Transient("timeout".into())) }
    })
    .await;
    assert!(matches!(result, Err(RemoteError::Transient(_))));
    assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
  }

  #[tokio::test(start_paused = true)]
  async fn non_transient_errors_fail_fast() {
    let calls = AtomicU32::new(0);
    let result: Result<(), _> = with_retry("update", || {
      calls.fetch_add(1, Ordering::SeqCst);
      async { Err(RemoteError::Auth("401 unauthorized".into())) }
    })
    .await;
    assert!(matches!(result, Err(RemoteError::Auth(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }
}
