//! Memoization Engine Module
//!
//! Wraps callables so repeated calls within a validity window are answered
//! from the cache store instead of being recomputed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{TimeDelta, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::cache::{
    fingerprint, CacheDuration, CacheEntry, CacheStats, CallableId, EntryStore, Fingerprint,
    JsonFileStore,
};
use crate::config::Config;
use crate::error::{CacheError, Result};

type LockTable = Mutex<HashMap<String, Arc<Mutex<()>>>>;

// == Time Cache ==
/// Owner of a cache store and the policy applied to every wrapped callable.
///
/// Calls sharing an identity are serialized on a per-identity mutex, so the
/// lookup / remove / compute / insert sequence never interleaves for one key
/// and the store never gains duplicate entries through this instance. Other
/// processes writing the same file are not coordinated with.
#[derive(Debug)]
pub struct TimeCache<S: EntryStore> {
    store: Mutex<S>,
    in_flight: LockTable,
    stats: Mutex<CacheStats>,
    degrade_on_store_error: bool,
}

impl TimeCache<JsonFileStore> {
    // == Open ==
    /// Opens the JSON file store named by `config`.
    pub fn open(config: &Config) -> Result<Self> {
        let store = JsonFileStore::open(&config.db_path)?;
        Ok(Self::new(store).degrade_on_store_error(config.degrade_on_store_error))
    }
}

impl<S: EntryStore> TimeCache<S> {
    // == Constructor ==
    pub fn new(store: S) -> Self {
        Self {
            store: Mutex::new(store),
            in_flight: Mutex::new(HashMap::new()),
            stats: Mutex::new(CacheStats::new()),
            degrade_on_store_error: false,
        }
    }

    /// When set, store I/O failures are logged and counted and the call is
    /// computed uncached instead of failing.
    pub fn degrade_on_store_error(mut self, degrade: bool) -> Self {
        self.degrade_on_store_error = degrade;
        self
    }

    // == Wrap ==
    /// Wraps `func` under the stable name `name`, caching results for `duration`.
    ///
    /// # Errors
    /// `InvalidDuration` for a negative duration and `InvalidCallableId` for
    /// an empty name, both before any call is made.
    pub fn wrap<F>(
        self: &Arc<Self>,
        name: impl Into<String>,
        duration: CacheDuration,
        func: F,
    ) -> Result<Memoized<S, F>> {
        let valid_for = duration.normalize()?;
        let callable = CallableId::new(name)?;
        debug!(callable = %callable, valid_for = %valid_for, "Wrapped callable");

        Ok(Memoized {
            cache: Arc::clone(self),
            callable,
            valid_for,
            func,
        })
    }

    /// Wraps a callable that cannot fail; cache failures surface as `CacheError`.
    pub fn wrap_infallible<A, R, F>(
        self: &Arc<Self>,
        name: impl Into<String>,
        duration: CacheDuration,
        func: F,
    ) -> Result<Memoized<S, impl Fn(&A) -> Result<R>>>
    where
        F: Fn(&A) -> R,
    {
        self.wrap(name, duration, move |args: &A| Ok::<R, CacheError>(func(args)))
    }

    // == Operator Controls ==
    /// Drops every entry stored for `identity`. Recovers from `CacheCorruption`.
    pub fn invalidate(&self, identity: &str) -> Result<usize> {
        let removed = self.store().remove(identity)?;
        info!(identity, removed, "Invalidated cache identity");
        Ok(removed)
    }

    /// Drops every stored entry.
    pub fn clear(&self) -> Result<usize> {
        let removed = self.store().clear()?;
        info!(removed, "Cleared cache store");
        Ok(removed)
    }

    /// Drops entries that are already stale.
    pub fn purge_stale(&self) -> Result<usize> {
        let removed = self.store().remove_stale(Utc::now())?;
        if removed > 0 {
            info!(removed, "Purged stale cache entries");
        }
        Ok(removed)
    }

    pub fn stats(&self) -> CacheStats {
        self.stats_mut().clone()
    }

    /// Runs `f` with exclusive access to the underlying store.
    pub fn with_store<T>(&self, f: impl FnOnce(&mut S) -> T) -> T {
        f(&mut self.store())
    }

    // == Lookup ==
    /// Returns the decoded result of a fresh entry, removing a stale one.
    fn fresh_result<R: DeserializeOwned>(&self, identity: &Fingerprint) -> Result<Option<R>> {
        let key = identity.as_str();
        let mut store = self.store();
        let mut matches = store.lookup(key)?;

        if matches.len() > 1 {
            error!(identity = key, matches = matches.len(), "Duplicate cache entries");
            return Err(CacheError::CacheCorruption {
                identity: key.to_string(),
                matches: matches.len(),
            });
        }

        let Some(entry) = matches.pop() else {
            return Ok(None);
        };

        if entry.is_fresh_at(Utc::now()) {
            match entry.decode_result() {
                Ok(result) => return Ok(Some(result)),
                Err(e) => warn!(identity = key, error = %e, "Discarding undecodable cache entry"),
            }
        } else {
            debug!(identity = key, created_at = %entry.created_at, "Cache entry expired");
            self.stats_mut().record_expiration();
        }

        store.remove(key)?;
        Ok(None)
    }

    /// Swallows `err` if it is a store failure and degrading is enabled.
    fn absorb(&self, err: CacheError) -> Result<()> {
        match err {
            CacheError::StoreUnavailable { .. } if self.degrade_on_store_error => {
                warn!(error = %err, "Cache store unavailable, computing uncached");
                self.stats_mut().record_store_error();
                Ok(())
            }
            other => Err(other),
        }
    }

    fn store(&self) -> MutexGuard<'_, S> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stats_mut(&self) -> MutexGuard<'_, CacheStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lease(&self, identity: &Fingerprint) -> Lease<'_> {
        let mut table = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = table
            .entry(identity.as_str().to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        Lease {
            table: &self.in_flight,
            identity: identity.as_str().to_string(),
            slot,
        }
    }
}

/// Claim on an identity's mutex; the table slot is dropped with the last claim.
struct Lease<'a> {
    table: &'a LockTable,
    identity: String,
    slot: Arc<Mutex<()>>,
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the table, one here.
        if Arc::strong_count(&self.slot) == 2 {
            table.remove(&self.identity);
        }
    }
}

// == Memoized ==
/// A callable wrapped by a `TimeCache`.
pub struct Memoized<S: EntryStore, F> {
    cache: Arc<TimeCache<S>>,
    callable: CallableId,
    valid_for: TimeDelta,
    func: F,
}

impl<S: EntryStore, F> Memoized<S, F> {
    pub fn callable(&self) -> &CallableId {
        &self.callable
    }

    pub fn valid_for(&self) -> TimeDelta {
        self.valid_for
    }

    /// Identity the cache stores results of `func(args)` under.
    pub fn identity<A: Serialize + ?Sized>(&self, args: &A) -> Result<Fingerprint> {
        fingerprint(&self.callable, args)
    }

    // == Call ==
    /// Returns a fresh cached result or computes, persists and returns a new one.
    ///
    /// Errors from `func` are returned exactly as produced and nothing is
    /// stored. A result that cannot be encoded is still returned; the failure
    /// is logged and counted in `persist_failures`.
    pub fn call<A, R, E>(&self, args: &A) -> std::result::Result<R, E>
    where
        A: Serialize,
        R: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: Fn(&A) -> std::result::Result<R, E>,
    {
        let cache = &self.cache;
        let identity = self.identity(args)?;
        let lease = cache.lease(&identity);
        let _held = lease.slot.lock().unwrap_or_else(PoisonError::into_inner);

        match cache.fresh_result::<R>(&identity) {
            Ok(Some(result)) => {
                debug!(callable = %self.callable, identity = %identity, "Cache hit");
                cache.stats_mut().record_hit();
                return Ok(result);
            }
            Ok(None) => {}
            Err(e) => cache.absorb(e)?,
        }

        debug!(callable = %self.callable, identity = %identity, "Cache miss");
        cache.stats_mut().record_miss();
        let result = (self.func)(args)?;

        match CacheEntry::encode(identity.as_str(), &result, self.valid_for) {
            Ok(entry) => {
                let inserted = cache.store().insert(entry);
                if let Err(e) = inserted {
                    cache.absorb(e)?;
                }
            }
            Err(e) => {
                warn!(callable = %self.callable, error = %e, "Result not cached");
                cache.stats_mut().record_persist_failure();
            }
        }

        Ok(result)
    }
}
