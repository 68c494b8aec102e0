//! Cache Module
//!
//! Time-based memoization: call fingerprints, persisted entries, the stores
//! holding them and the engine tying them together.

mod duration;
mod engine;
mod entry;
mod fingerprint;
mod stats;
mod store;


// Re-export public types
pub use duration::CacheDuration;
pub use engine::{Memoized, TimeCache};
pub use entry::CacheEntry;
pub use fingerprint::{fingerprint, CallArgs, CallableId, Fingerprint};
pub use stats::CacheStats;
pub use store::{EntryStore, JsonFileStore, MemoryStore};
