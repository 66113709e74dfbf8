//! Releasing held locks

use super::evaluator::{self, ReleaseDecision};
use super::lease::{HolderToken, Lease};
use super::{ensure_key, LeaseLock, Release};
use crate::common::{Error, Result};
use std::time::Duration;
use tracing::{debug, warn};

impl LeaseLock {
    /// Delete the lock on `key` unless its lease ends within `safety_margin`.
    ///
    /// This is the anonymous release: it does not check who holds the lease.
    /// Fails with `LockNotFound` when there is nothing to release.
    pub async fn release(&self, key: &str, safety_margin: Duration) -> Result<Release> {
        self.release_checked(key, safety_margin, None).await
    }

    /// [`release`](Self::release) with the margin given in milliseconds
    pub async fn release_ms(&self, key: &str, safety_margin_ms: u64) -> Result<Release> {
        self.release(key, Duration::from_millis(safety_margin_ms))
            .await
    }

    /// Release a lease acquired by this caller.
    ///
    /// When the lease carries a holder token, the stored value must carry the
    /// same token or the release is refused with [`Release::NotOwner`].
    pub async fn release_lease(&self, lease: &Lease, safety_margin: Duration) -> Result<Release> {
        self.release_checked(&lease.key, safety_margin, lease.token.as_ref())
            .await
    }

    async fn release_checked(
        &self,
        key: &str,
        safety_margin: Duration,
        token: Option<&HolderToken>,
    ) -> Result<Release> {
        ensure_key(key)?;

        let raw = match self.store.get(key).await? {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Err(Error::LockNotFound(key.to_string())),
        };

        let now = self.clock.now_nanos();
        let decision = evaluator::evaluate_release(key, &raw, now, safety_margin, token)
            .inspect_err(|e| warn!("Refusing to release {}: {}", key, e))?;

        match decision {
            ReleaseDecision::NotOwner => {
                warn!("Not releasing {}: held by another owner", key);
                Ok(Release::NotOwner)
            }
            ReleaseDecision::NearExpiry { expiry_nanos } => {
                debug!(
                    "Not releasing {}: lease ends at {}, within {:?} of now",
                    key, expiry_nanos, safety_margin
                );
                Ok(Release::NearExpiry { expiry_nanos })
            }
            ReleaseDecision::Delete => {
                let removed = if self.conditional_writes() {
                    self.store.compare_and_delete(key, &raw).await?
                } else {
                    self.store.delete(key).await? > 0
                };
                if removed {
                    debug!("Released {}", key);
                    Ok(Release::Released)
                } else {
                    Ok(Release::Vanished)
                }
            }
        }
    }
}
