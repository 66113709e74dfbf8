//! Lease values as persisted in the store, and the handle returned to holders
//!
//! A stored value is either a bare decimal expiry (`1739870000123456789`) or
//! an expiry tagged with the holder's token (`1739870000123456789:9f2c...`).
//! Bare values are what anonymous clients write; tagged values let a holder
//! prove ownership on release.

use crate::common::{duration_nanos, Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

const TOKEN_SEPARATOR: char = ':';

/// Random token identifying one successful acquisition
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HolderToken(String);

impl HolderToken {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for HolderToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for HolderToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for HolderToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Decoded store value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseValue {
    /// Absolute expiry, nanoseconds since the Unix epoch
    pub expiry_nanos: i64,
    pub token: Option<HolderToken>,
}

impl LeaseValue {
    pub fn new(expiry_nanos: i64, token: Option<HolderToken>) -> Self {
        Self {
            expiry_nanos,
            token,
        }
    }

    /// Decode a raw store value written for `key`
    pub fn parse(key: &str, raw: &str) -> Result<Self> {
        let (expiry, token) = match raw.split_once(TOKEN_SEPARATOR) {
            Some((expiry, token)) => {
                if token.is_empty() {
                    return Err(Error::corrupt(key, raw));
                }
                (expiry, Some(HolderToken::from(token)))
            }
            None => (raw, None),
        };

        let expiry_nanos = expiry
            .parse::<i64>()
            .map_err(|_| Error::corrupt(key, raw))?;
        Ok(Self {
            expiry_nanos,
            token,
        })
    }

    pub fn encode(&self) -> String {
        match &self.token {
            Some(token) => format!("{}{}{}", self.expiry_nanos, TOKEN_SEPARATOR, token),
            None => self.expiry_nanos.to_string(),
        }
    }

    /// Live while `now < expiry`
    pub fn is_live(&self, now_nanos: i64) -> bool {
        now_nanos < self.expiry_nanos
    }
}

/// A lease held by this caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub key: String,
    pub expiry_nanos: i64,
    pub token: Option<HolderToken>,
}

impl Lease {
    pub(crate) fn new(key: &str, value: LeaseValue) -> Self {
        Self {
            key: key.to_string(),
            expiry_nanos: value.expiry_nanos,
            token: value.token,
        }
    }

    /// Rebuild a handle for a lease acquired elsewhere (e.g. another process run)
    pub fn from_parts(key: impl Into<String>, expiry_nanos: i64, token: Option<HolderToken>) -> Self {
        Self {
            key: key.into(),
            expiry_nanos,
            token,
        }
    }

    /// The value this lease wrote to the store
    pub fn value(&self) -> LeaseValue {
        LeaseValue::new(self.expiry_nanos, self.token.clone())
    }

    /// Time left before the lease goes stale
    pub fn remaining(&self, now_nanos: i64) -> Duration {
        let left = self.expiry_nanos.saturating_sub(now_nanos);
        Duration::from_nanos(u64::try_from(left).unwrap_or(0))
    }

    pub fn is_expired(&self, now_nanos: i64) -> bool {
        now_nanos >= self.expiry_nanos
    }
}

/// Expiry for a lease of `lease` starting at `now`, saturating on overflow
pub fn expiry_after(now_nanos: i64, lease: Duration) -> i64 {
    now_nanos.saturating_add(duration_nanos(lease))
}
