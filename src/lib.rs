//! Time Cache - persistent, time-based memoization
//!
//! Wraps callables so their results are stored in a durable JSON file and
//! reused until a configured validity window runs out.

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheDuration, CallArgs, Memoized, TimeCache};
pub use config::Config;
pub use error::{CacheError, Result};
