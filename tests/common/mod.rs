//! Shared helpers for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use kvlock::common::ManualClock;
use kvlock::{LeaseLock, LockOptions, LockStore, MemoryStore, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const START: i64 = 1_700_000_000_000_000_000;

/// Wraps a [`MemoryStore`], counting every primitive call
#[derive(Debug, Default)]
pub struct CountingStore {
    inner: MemoryStore,
    conditional: bool,
    pub gets: AtomicUsize,
    pub creates: AtomicUsize,
    pub exchanges: AtomicUsize,
    pub swaps: AtomicUsize,
    pub deletes: AtomicUsize,
}

impl CountingStore {
    /// A store offering only the five plain primitives
    pub fn plain() -> Self {
        Self::default()
    }

    /// A store that also offers compare-and-swap / compare-and-delete
    pub fn conditional() -> Self {
        Self {
            conditional: true,
            ..Default::default()
        }
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LockStore for CountingStore {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.inner.set(key, value).await
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.inner.set_if_absent(key, value).await
    }

    async fn exchange(&self, key: &str, value: &str) -> Result<Option<String>> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        self.inner.exchange(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<u64> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(key).await
    }

    fn supports_conditional_writes(&self) -> bool {
        self.conditional
    }

    async fn compare_and_swap(&self, key: &str, expected: &str, value: &str) -> Result<bool> {
        self.swaps.fetch_add(1, Ordering::SeqCst);
        self.inner.compare_and_swap(key, expected, value).await
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.compare_and_delete(key, expected).await
    }

    async fn close(&self) -> Result<()> {
        self.inner.close().await
    }
}

/// A lock over `store` driven by a manual clock starting at [`START`]
pub fn manual_lock(store: Arc<dyn LockStore>, options: LockOptions) -> (LeaseLock, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(START));
    let lock = LeaseLock::new(store)
        .with_clock(clock.clone())
        .with_options(options);
    (lock, clock)
}
