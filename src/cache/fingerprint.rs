//! Fingerprint Module
//!
//! Derives the stable identity string of a (callable, arguments) pair.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{CacheError, Result};

// == Callable Id ==
/// Caller-supplied stable name of a cached callable, e.g. `"reports::monthly_totals"`.
///
/// It is the only thing tying stored entries to a function across restarts, so
/// renaming it orphans every entry written under the old name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CallableId(String);

impl CallableId {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CacheError::InvalidCallableId(
                "callable name cannot be empty".to_string(),
            ));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// == Call Args ==
/// Positional and keyword arguments captured as JSON values.
///
/// Keyword arguments are kept sorted by name, so the order they were given in
/// does not change the fingerprint. Values must serialize in a fixed order:
/// a `HashMap` or `HashSet` value encodes in iteration order, giving a
/// different fingerprint per process and spurious misses. Use `BTreeMap` or
/// `BTreeSet` instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallArgs {
    pub positional: Vec<Value>,
    pub keyword: BTreeMap<String, Value>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional argument.
    pub fn arg<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self> {
        self.positional.push(to_argument_value(value)?);
        Ok(self)
    }

    /// Sets a keyword argument, replacing any previous value under that name.
    pub fn kwarg<T: Serialize + ?Sized>(mut self, name: impl Into<String>, value: &T) -> Result<Self> {
        self.keyword.insert(name.into(), to_argument_value(value)?);
        Ok(self)
    }
}

// == Fingerprint ==
/// Hex-encoded SHA-256 digest identifying one call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Computes the identity of `callable` invoked with `args`.
///
/// The pair is converted to a `serde_json::Value` first: object keys end up
/// sorted, which makes struct and map arguments canonical. Argument types
/// whose `Serialize` impl depends on iteration order (`HashMap`, `HashSet`)
/// are not canonical and must not be used.
///
/// # Errors
/// `UnserializableArgument` when `args` cannot be represented as JSON
/// (for example a map keyed by tuples).
pub fn fingerprint<A: Serialize + ?Sized>(callable: &CallableId, args: &A) -> Result<Fingerprint> {
    let canonical = Value::Array(vec![
        Value::String(callable.as_str().to_string()),
        to_argument_value(args)?,
    ]);
    let bytes = serde_json::to_vec(&canonical)
        .map_err(|e| CacheError::UnserializableArgument(e.to_string()))?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(Fingerprint(hex::encode(hasher.finalize())))
}

fn to_argument_value<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| CacheError::UnserializableArgument(e.to_string()))
}
