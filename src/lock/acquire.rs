//! Single acquisition attempt

use super::evaluator::{self, AcquireDecision};
use super::lease::{expiry_after, HolderToken, Lease, LeaseValue};
use super::{ensure_key, Acquisition, LeaseLock};
use crate::common::Result;
use std::time::Duration;
use tracing::{debug, trace, warn};

impl LeaseLock {
    /// Make one attempt to take `key` for `lease`.
    ///
    /// Returns `Contended` when a live lease holds the key or another caller
    /// won the race. Store failures and unreadable values are errors; the
    /// attempt is never assumed to have succeeded in that case.
    pub async fn try_acquire(&self, key: &str, lease: Duration) -> Result<Acquisition> {
        ensure_key(key)?;

        let now = self.clock.now_nanos();
        let token = self.options.fencing.then(HolderToken::generate);
        let value = LeaseValue::new(expiry_after(now, lease), token);
        let encoded = value.encode();

        if self.store.set_if_absent(key, &encoded).await? {
            trace!("Acquired {} on first write, expires at {}", key, value.expiry_nanos);
            return Ok(Acquisition::Acquired(Lease::new(key, value)));
        }

        let stored = self.store.get(key).await?;
        let decision = evaluator::evaluate(key, stored.as_deref(), now).inspect_err(|e| {
            warn!("Refusing to acquire {}: {}", key, e);
        })?;

        let won = match decision {
            AcquireDecision::Held { expiry_nanos } => {
                trace!("{} is held until {}", key, expiry_nanos);
                return Ok(Acquisition::Contended {
                    holder_expiry: Some(expiry_nanos),
                });
            }
            AcquireDecision::Vacant => {
                if self.conditional_writes() {
                    match stored.as_deref() {
                        Some(empty) => self.store.compare_and_swap(key, empty, &encoded).await?,
                        None => self.store.set_if_absent(key, &encoded).await?,
                    }
                } else {
                    // GETSET is not a CAS: two racers can both see the key absent
                    let previous = self.store.exchange(key, &encoded).await?;
                    evaluator::takeover_won(None, previous.as_deref())
                }
            }
            AcquireDecision::Stale { observed } => {
                let won = if self.conditional_writes() {
                    self.store
                        .compare_and_swap(key, &observed, &encoded)
                        .await?
                } else {
                    let previous = self.store.exchange(key, &encoded).await?;
                    evaluator::takeover_won(Some(&observed), previous.as_deref())
                };
                debug!(
                    "Stale lease on {} ({}) takeover {}",
                    key,
                    observed,
                    if won { "won" } else { "lost" }
                );
                won
            }
        };

        if won {
            Ok(Acquisition::Acquired(Lease::new(key, value)))
        } else {
            Ok(Acquisition::Contended {
                holder_expiry: None,
            })
        }
    }

    /// [`try_acquire`](Self::try_acquire) with the lease given in milliseconds
    pub async fn try_acquire_ms(&self, key: &str, lease_ms: u64) -> Result<Acquisition> {
        self.try_acquire(key, Duration::from_millis(lease_ms)).await
    }
}
