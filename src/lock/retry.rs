//! Retry drivers around [`LeaseLock::try_acquire`]
//!
//! Both drivers retry only on contention. Store errors and corrupt values end
//! the loop immediately.

use super::lease::Lease;
use super::{Acquisition, LeaseLock};
use crate::common::{Error, Result};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Linear backoff: attempt `i` (zero based) waits `(i + 1) * unit`.
///
/// There is no cap and no jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    unit: Duration,
}

impl Backoff {
    pub const fn linear(unit: Duration) -> Self {
        Self { unit }
    }

    pub fn unit(&self) -> Duration {
        self.unit
    }

    /// Delay after the zero-based `attempt`
    pub fn delay(&self, attempt: u32) -> Duration {
        self.unit.saturating_mul(attempt.saturating_add(1))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::linear(Duration::from_millis(1))
    }
}

impl LeaseLock {
    /// Try up to `max_attempts` times, backing off after every contended attempt.
    ///
    /// Running out of attempts is reported as [`Acquisition::Exhausted`], not as
    /// an error.
    pub async fn acquire_with_retries(
        &self,
        key: &str,
        lease: Duration,
        max_attempts: u32,
    ) -> Result<Acquisition> {
        for attempt in 0..max_attempts {
            match self.try_acquire(key, lease).await? {
                acquired @ Acquisition::Acquired(_) => return Ok(acquired),
                _ => {
                    let delay = self.options.backoff.delay(attempt);
                    debug!(
                        "{} contended (attempt {}/{}), retrying in {:?}",
                        key,
                        attempt + 1,
                        max_attempts,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }

        Ok(Acquisition::Exhausted {
            attempts: max_attempts,
        })
    }

    /// Retry until the lock is acquired, a store error occurs, or `cancel` fires.
    ///
    /// Cancellation is observed between attempts and during backoff sleeps. An
    /// attempt already talking to the store runs to completion first.
    pub async fn acquire_or_block(
        &self,
        key: &str,
        lease: Duration,
        cancel: &CancellationToken,
    ) -> Result<Lease> {
        let mut attempt: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            if let Acquisition::Acquired(held) = self.try_acquire(key, lease).await? {
                return Ok(held);
            }

            let delay = self.options.backoff.delay(attempt);
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Gave up waiting for {} after {} attempts", key, attempt + 1);
                    return Err(Error::Cancelled);
                }
                _ = tokio::time::sleep(delay) => {}
            }
            attempt = attempt.saturating_add(1);
        }
    }

    /// Block until acquired or a store error occurs, with no way to cancel
    pub async fn acquire_forever(&self, key: &str, lease: Duration) -> Result<Lease> {
        self.acquire_or_block(key, lease, &CancellationToken::new())
            .await
    }
}
