//! Pure lock state decisions
//!
//! Nothing here touches the store. Given what was read and the current time,
//! these functions decide what the controllers do next.

use super::lease::{HolderToken, LeaseValue};
use crate::common::{duration_nanos, Result};
use std::time::Duration;

/// What an acquirer should do after `SETNX` failed and the key was read back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireDecision {
    /// The key disappeared between the create attempt and the read
    Vacant,
    /// A live lease owns the key
    Held { expiry_nanos: i64 },
    /// The lease is stale and may be taken over; `observed` is the raw value read
    Stale { observed: String },
}

/// Classify the value read for `key` at `now_nanos`.
///
/// A lease expiring exactly at `now_nanos` still counts as held here; takeover
/// needs `now > expiry`.
pub fn evaluate(key: &str, stored: Option<&str>, now_nanos: i64) -> Result<AcquireDecision> {
    let raw = match stored {
        None | Some("") => return Ok(AcquireDecision::Vacant),
        Some(raw) => raw,
    };

    let value = LeaseValue::parse(key, raw)?;
    if now_nanos <= value.expiry_nanos {
        Ok(AcquireDecision::Held {
            expiry_nanos: value.expiry_nanos,
        })
    } else {
        Ok(AcquireDecision::Stale {
            observed: raw.to_string(),
        })
    }
}

/// Did an exchange win the transition away from `observed`?
///
/// `observed` is `None` for a vacant key. The exchange wins only when the
/// value it replaced is exactly the one this caller based its decision on.
pub fn takeover_won(observed: Option<&str>, previous: Option<&str>) -> bool {
    match (observed, previous) {
        (None, None) | (None, Some("")) => true,
        (Some(observed), Some(previous)) => observed == previous,
        _ => false,
    }
}

/// What a releaser should do with the value currently stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseDecision {
    Delete,
    /// The lease is within the safety margin of its own expiry
    NearExpiry { expiry_nanos: i64 },
    /// The stored value carries a different (or no) holder token
    NotOwner,
}

/// Decide whether the value stored under `key` may be deleted.
///
/// With `token` set, the stored value must carry the same token. The timing
/// guard applies either way: deletion is refused once
/// `now + margin > expiry`, since past that point the lease may already
/// have been taken over by someone else.
pub fn evaluate_release(
    key: &str,
    raw: &str,
    now_nanos: i64,
    safety_margin: Duration,
    token: Option<&HolderToken>,
) -> Result<ReleaseDecision> {
    let value = LeaseValue::parse(key, raw)?;

    if let Some(token) = token {
        if value.token.as_ref() != Some(token) {
            return Ok(ReleaseDecision::NotOwner);
        }
    }

    if now_nanos.saturating_add(duration_nanos(safety_margin)) > value.expiry_nanos {
        return Ok(ReleaseDecision::NearExpiry {
            expiry_nanos: value.expiry_nanos,
        });
    }

    Ok(ReleaseDecision::Delete)
}
