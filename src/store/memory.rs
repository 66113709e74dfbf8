//! In-process store
//!
//! Every primitive runs inside a single critical section, which makes each
//! call linearizable the way a single-threaded store server is.

use super::LockStore;
use crate::common::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub struct MemoryStore {
    map: Mutex<HashMap<String, String>>,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.lock().is_empty()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl LockStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.ensure_open()?;
        Ok(self.map.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.ensure_open()?;
        self.map.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool> {
        self.ensure_open()?;
        let mut map = self.map.lock();
        if map.contains_key(key) {
            return Ok(false);
        }
        map.insert(key.to_string(), value.to_string());
        Ok(true)
    }

    async fn exchange(&self, key: &str, value: &str) -> Result<Option<String>> {
        self.ensure_open()?;
        Ok(self.map.lock().insert(key.to_string(), value.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<u64> {
        self.ensure_open()?;
        Ok(u64::from(self.map.lock().remove(key).is_some()))
    }

    fn supports_conditional_writes(&self) -> bool {
        true
    }

    async fn compare_and_swap(&self, key: &str, expected: &str, value: &str) -> Result<bool> {
        self.ensure_open()?;
        let mut map = self.map.lock();
        match map.get_mut(key) {
            Some(current) if current == expected => {
                *current = value.to_string();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool> {
        self.ensure_open()?;
        let mut map = self.map.lock();
        if map.get(key).map(String::as_str) == Some(expected) {
            map.remove(key);
            return Ok(true);
        }
        Ok(false)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        self.map.lock().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_set_if_absent_only_once() {
        let store = MemoryStore::new();
        assert!(store.set_if_absent("k", "1").await.unwrap());
        assert!(!store.set_if_absent("k", "2").await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_exchange_returns_previous() {
        let store = MemoryStore::new();
        assert_eq!(store.exchange("k", "1").await.unwrap(), None);
        assert_eq!(store.exchange("k", "2").await.unwrap().as_deref(), Some("1"));
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_delete_counts() {
        let store = MemoryStore::new();
        assert_ok!(store.set("k", "v").await);
        assert_eq!(assert_ok!(store.delete("k").await), 1);
        assert_eq!(assert_ok!(store.delete("k").await), 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_conditional_writes() {
        let store = MemoryStore::new();
        assert!(!store.compare_and_swap("k", "a", "b").await.unwrap());

        store.set("k", "a").await.unwrap();
        assert!(!store.compare_and_swap("k", "x", "b").await.unwrap());
        assert!(store.compare_and_swap("k", "a", "b").await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("b"));

        assert!(!store.compare_and_delete("k", "a").await.unwrap());
        assert!(store.compare_and_delete("k", "b").await.unwrap());
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_closed_store_rejects_calls() {
        let store = MemoryStore::new();
        store.set("k", "v").await.unwrap();
        store.close().await.unwrap();

        let err = assert_err!(store.get("k").await);
        assert!(matches!(err, Error::Closed));
        assert_err!(store.set_if_absent("k", "v").await);
    }
}
