//! Key-value store adapters the lock protocol runs on
//!
//! The protocol needs five string primitives from the store: `GET`, `SET`,
//! `SETNX`, `GETSET` and `DEL`. Adapters may additionally offer genuine
//! conditional writes, which the lock controller prefers when present.

pub mod memory;
pub mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

use crate::common::{Error, Result};
use async_trait::async_trait;
use std::fmt::Debug;

/// Trait for key-value backends usable by the lock controller.
///
/// Every method either reports what the store did or fails with a store error
/// (`Error::Store`, `Error::Timeout`, `Error::Closed`). Adapters never retry.
#[async_trait]
pub trait LockStore: Send + Sync + Debug {
    /// Short backend name used in log fields
    fn name(&self) -> &'static str;

    /// Current value, `None` when the key is absent
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Unconditional write
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Create `key = value` only if absent; true iff the create happened
    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool>;

    /// Atomically write `value` and return the value present just before
    async fn exchange(&self, key: &str, value: &str) -> Result<Option<String>>;

    /// Remove the key, returning how many entries were removed
    async fn delete(&self, key: &str) -> Result<u64>;

    /// Whether `compare_and_swap` and `compare_and_delete` are available
    fn supports_conditional_writes(&self) -> bool {
        false
    }

    /// Write `value` only if the current value equals `expected`
    async fn compare_and_swap(&self, _key: &str, _expected: &str, _value: &str) -> Result<bool> {
        Err(Error::Unsupported("compare-and-swap"))
    }

    /// Delete the key only if the current value equals `expected`
    async fn compare_and_delete(&self, _key: &str, _expected: &str) -> Result<bool> {
        Err(Error::Unsupported("compare-and-delete"))
    }

    /// Release connections; later calls fail with `Error::Closed`
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
