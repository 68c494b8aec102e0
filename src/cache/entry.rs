//! Cache Entry Module
//!
//! Defines the persisted record of one memoized call.

use chrono::{DateTime, TimeDelta, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CacheError, Result};

// == Cache Entry ==
/// A computed result together with the window it may be reused in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Fingerprint of the call that produced the result
    pub identity: String,
    /// The serialized result
    pub result: Value,
    /// When the result was computed
    pub created_at: DateTime<Utc>,
    /// How long after `created_at` the result stays fresh
    #[serde(rename = "valid_for_us", with = "micros")]
    pub valid_for: TimeDelta,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry stamped with the current time.
    pub fn new(identity: impl Into<String>, result: Value, valid_for: TimeDelta) -> Self {
        Self::with_created_at(identity, result, Utc::now(), valid_for)
    }

    /// Creates an entry with an explicit creation time.
    pub fn with_created_at(
        identity: impl Into<String>,
        result: Value,
        created_at: DateTime<Utc>,
        valid_for: TimeDelta,
    ) -> Self {
        Self {
            identity: identity.into(),
            result,
            created_at,
            valid_for,
        }
    }

    /// Encodes `result` and builds an entry stamped with the current time.
    pub fn encode<R: Serialize + ?Sized>(
        identity: impl Into<String>,
        result: &R,
        valid_for: TimeDelta,
    ) -> Result<Self> {
        let value = serde_json::to_value(result)
            .map_err(|e| CacheError::UnserializableResult(e.to_string()))?;
        Ok(Self::new(identity, value, valid_for))
    }

    /// Instant from which the entry is stale.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at
            .checked_add_signed(self.valid_for)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    // == Freshness ==
    /// An entry is fresh strictly before `created_at + valid_for`.
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at()
    }

    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Utc::now())
    }

    /// Remaining freshness, zero once stale.
    pub fn ttl_remaining(&self) -> TimeDelta {
        let remaining = self.expires_at() - Utc::now();
        remaining.max(TimeDelta::zero())
    }

    /// Decodes the stored result.
    pub fn decode_result<R: DeserializeOwned>(&self) -> Result<R> {
        R::deserialize(&self.result).map_err(|e| CacheError::UnserializableResult(e.to_string()))
    }
}

/// `TimeDelta` on disk as whole microseconds.
mod micros {
    use chrono::TimeDelta;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(delta: &TimeDelta, serializer: S) -> Result<S::Ok, S::Error> {
        match delta.num_microseconds() {
            Some(us) => serializer.serialize_i64(us),
            None => Err(serde::ser::Error::custom("duration exceeds i64 microseconds")),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TimeDelta, D::Error> {
        let us = i64::deserialize(deserializer)?;
        if us < 0 {
            return Err(de::Error::custom("valid_for cannot be negative"));
        }
        Ok(TimeDelta::microseconds(us))
    }
}
