//! Lease-based mutual exclusion over a [`LockStore`]
//!
//! ```text
//!  acquire_with_retries / acquire_or_block      (retry)
//!                 │
//!            try_acquire                          (acquire)
//!                 │
//!         evaluate / takeover_won                 (evaluator)
//!                 │
//!   SETNX · GET · GETSET (or CAS) · DEL           (store)
//! ```
//!
//! A lock is one store entry holding the lease expiry. Whoever moves the
//! entry into a state carrying their own expiry holds the lock; nothing else
//! is trusted.

pub mod acquire;
pub mod evaluator;
pub mod lease;
pub mod release;
pub mod retry;

pub use evaluator::{AcquireDecision, ReleaseDecision};
pub use lease::{HolderToken, Lease, LeaseValue};
pub use retry::Backoff;

use crate::common::{Clock, Error, LockConfig, Result, SystemClock};
use crate::store::LockStore;
use std::sync::Arc;

/// Result of an acquisition attempt that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquisition {
    Acquired(Lease),
    /// Someone else holds the lock, or won the race for it
    Contended { holder_expiry: Option<i64> },
    /// The bounded retry driver ran out of attempts
    Exhausted { attempts: u32 },
}

impl Acquisition {
    pub fn is_acquired(&self) -> bool {
        matches!(self, Acquisition::Acquired(_))
    }

    pub fn lease(&self) -> Option<&Lease> {
        match self {
            Acquisition::Acquired(lease) => Some(lease),
            _ => None,
        }
    }

    pub fn into_lease(self) -> Option<Lease> {
        match self {
            Acquisition::Acquired(lease) => Some(lease),
            _ => None,
        }
    }
}

/// Result of a release that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    Released,
    /// Refused: the lease is within the safety margin of its expiry
    NearExpiry { expiry_nanos: i64 },
    /// Refused: the stored lease belongs to another holder
    NotOwner,
    /// The entry changed or disappeared between the read and the delete
    Vanished,
}

impl Release {
    pub fn is_released(&self) -> bool {
        matches!(self, Release::Released)
    }
}

/// Protocol knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    /// Tag written leases with a random holder token
    pub fencing: bool,
    /// Prefer store-side CAS over GETSET when the store offers it
    pub conditional_writes: bool,
    pub backoff: Backoff,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            fencing: true,
            conditional_writes: true,
            backoff: Backoff::default(),
        }
    }
}

impl From<&LockConfig> for LockOptions {
    fn from(config: &LockConfig) -> Self {
        Self {
            fencing: config.fencing,
            conditional_writes: config.conditional_writes,
            backoff: Backoff::linear(config.backoff_unit()),
        }
    }
}

/// Lock controller bound to one store.
///
/// Cheap to clone; clones share the store and clock.
#[derive(Debug, Clone)]
pub struct LeaseLock {
    store: Arc<dyn LockStore>,
    clock: Arc<dyn Clock>,
    options: LockOptions,
}

impl LeaseLock {
    pub fn new(store: Arc<dyn LockStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            options: LockOptions::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_options(mut self, options: LockOptions) -> Self {
        self.options = options;
        self
    }

    pub fn store(&self) -> &Arc<dyn LockStore> {
        &self.store
    }

    pub fn options(&self) -> &LockOptions {
        &self.options
    }

    pub fn now_nanos(&self) -> i64 {
        self.clock.now_nanos()
    }

    fn conditional_writes(&self) -> bool {
        self.options.conditional_writes && self.store.supports_conditional_writes()
    }
}

/// Keys are opaque to the protocol; only the empty key is refused
pub(crate) fn ensure_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidKey("key cannot be empty".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::time::Duration;

    #[test]
    fn test_options_from_config() {
        let config = LockConfig {
            backoff_unit_ms: 5,
            fencing: false,
            ..Default::default()
        };
        let options = LockOptions::from(&config);
        assert!(!options.fencing);
        assert!(options.conditional_writes);
        assert_eq!(options.backoff.delay(1), Duration::from_millis(10));
    }

    #[test]
    fn test_conditional_writes_need_store_support() {
        let lock = LeaseLock::new(Arc::new(MemoryStore::new()));
        assert!(lock.conditional_writes());

        let lock = lock.with_options(LockOptions {
            conditional_writes: false,
            ..Default::default()
        });
        assert!(!lock.conditional_writes());
    }

    #[test]
    fn test_acquisition_accessors() {
        let lease = Lease::from_parts("k", 10, None);
        let acquired = Acquisition::Acquired(lease.clone());
        assert!(acquired.is_acquired());
        assert_eq!(acquired.lease(), Some(&lease));

        let exhausted = Acquisition::Exhausted { attempts: 3 };
        assert!(!exhausted.is_acquired());
        assert_eq!(exhausted.into_lease(), None);
    }
}
