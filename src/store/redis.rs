//! Redis adapter
//!
//! Maps the lock primitives onto `GET`, `SET`, `SETNX`, `GETSET` and `DEL`.
//! Conditional writes run as Lua scripts, which Redis executes atomically.

use super::LockStore;
use crate::common::{Error, Result, StoreConfig};
use ::redis::aio::ConnectionManager;
use ::redis::{Client, RedisResult, Script};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::fmt;
use std::future::Future;
use std::time::Duration;

const COMPARE_AND_SWAP: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    redis.call("SET", KEYS[1], ARGV[2])
    return 1
end
return 0
"#;

const COMPARE_AND_DELETE: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
end
return 0
"#;

/// Redis-backed [`LockStore`] sharing one multiplexed, auto-reconnecting connection
pub struct RedisStore {
    url: String,
    conn: RwLock<Option<ConnectionManager>>,
    command_timeout: Duration,
    cas: Script,
    cad: Script,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("url", &self.url)
            .field("command_timeout", &self.command_timeout)
            .field("open", &self.conn.read().is_some())
            .finish()
    }
}

impl RedisStore {
    /// Open a connection described by `config`
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str())?;
        let manager = tokio::time::timeout(config.connect_timeout(), ConnectionManager::new(client))
            .await
            .map_err(|_| Error::Timeout(format!("connect {}", config.url)))??;

        tracing::debug!("Connected to redis at {}", config.url);

        Ok(Self {
            url: config.url.clone(),
            conn: RwLock::new(Some(manager)),
            command_timeout: config.command_timeout(),
            cas: Script::new(COMPARE_AND_SWAP),
            cad: Script::new(COMPARE_AND_DELETE),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn connection(&self) -> Result<ConnectionManager> {
        self.conn.read().clone().ok_or(Error::Closed)
    }

    async fn run<T, F>(&self, op: &'static str, key: &str, fut: F) -> Result<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(self.command_timeout, fut).await {
            Ok(res) => res.map_err(Error::from),
            Err(_) => Err(Error::Timeout(format!("{} {}", op, key))),
        }
    }
}

#[async_trait]
impl LockStore for RedisStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection()?;
        let cmd = ::redis::cmd("GET").arg(key).clone();
        self.run("GET", key, cmd.query_async(&mut conn)).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.connection()?;
        let cmd = ::redis::cmd("SET").arg(key).arg(value).clone();
        self.run("SET", key, cmd.query_async(&mut conn)).await
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool> {
        let mut conn = self.connection()?;
        let cmd = ::redis::cmd("SETNX").arg(key).arg(value).clone();
        self.run("SETNX", key, cmd.query_async(&mut conn)).await
    }

    async fn exchange(&self, key: &str, value: &str) -> Result<Option<String>> {
        let mut conn = self.connection()?;
        let cmd = ::redis::cmd("GETSET").arg(key).arg(value).clone();
        self.run("GETSET", key, cmd.query_async(&mut conn)).await
    }

    async fn delete(&self, key: &str) -> Result<u64> {
        let mut conn = self.connection()?;
        let cmd = ::redis::cmd("DEL").arg(key).clone();
        self.run("DEL", key, cmd.query_async(&mut conn)).await
    }

    fn supports_conditional_writes(&self) -> bool {
        true
    }

    async fn compare_and_swap(&self, key: &str, expected: &str, value: &str) -> Result<bool> {
        let mut conn = self.connection()?;
        let mut invocation = self.cas.prepare_invoke();
        invocation.key(key).arg(expected).arg(value);
        let swapped: i64 = self
            .run("EVALSHA cas", key, invocation.invoke_async(&mut conn))
            .await?;
        Ok(swapped == 1)
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool> {
        let mut conn = self.connection()?;
        let mut invocation = self.cad.prepare_invoke();
        invocation.key(key).arg(expected);
        let removed: i64 = self
            .run("EVALSHA cad", key, invocation.invoke_async(&mut conn))
            .await?;
        Ok(removed > 0)
    }

    async fn close(&self) -> Result<()> {
        if self.conn.write().take().is_some() {
            tracing::debug!("Closed redis connection to {}", self.url);
        }
        Ok(())
    }
}
