//! # kvlock
//!
//! Lease-based distributed locks on top of a plain key-value store:
//! - One store entry per lock, holding the lease expiry (nanoseconds since epoch)
//! - `SETNX` for the uncontended path, `GETSET` (or a real CAS) to take over stale leases
//! - Bounded and cancellable unbounded retry with linear backoff
//! - Release guarded by a safety margin and, optionally, a holder token
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────┐
//! │  LeaseLock                   │
//! │   retry  → acquire           │
//! │   release                    │
//! │        └─ evaluator (pure)   │
//! └──────────────┬───────────────┘
//!                │ LockStore
//!      ┌─────────┴─────────┐
//!      │                   │
//! ┌────▼───────┐    ┌──────▼──────┐
//! │ RedisStore │    │ MemoryStore │
//! └────────────┘    └─────────────┘
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use kvlock::{Config, LeaseLock, LockStore, RedisStore};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn run() -> kvlock::Result<()> {
//! let config = Config::load(None)?;
//! let store = Arc::new(RedisStore::connect(&config.store).await?);
//! let lock = LeaseLock::new(store.clone()).with_options((&config.lock).into());
//!
//! if let Some(lease) = lock
//!     .acquire_with_retries("reports:nightly", Duration::from_secs(30), 10)
//!     .await?
//!     .into_lease()
//! {
//!     // critical section
//!     lock.release_lease(&lease, Duration::from_millis(100)).await?;
//! }
//! store.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ### CLI
//! ```bash
//! kvlock --url redis://127.0.0.1:6379/0 acquire reports:nightly --lease 30s --retries 10
//! kvlock inspect reports:nightly
//! kvlock release reports:nightly --margin 100ms --token <token>
//! kvlock run reports:nightly --wait -- ./export.sh
//! ```

pub mod common;
pub mod lock;
pub mod store;

// Re-export commonly used types
pub use common::{Config, Error, Result};
pub use lock::{Acquisition, HolderToken, Lease, LeaseLock, LockOptions, Release};
pub use store::{LockStore, MemoryStore, RedisStore};

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
