//! Time Cache demo
//!
//! Memoizes a slow `square` for ten seconds and calls it twice; the second
//! call is answered from the store file.

use std::sync::Arc;
use std::thread::sleep;
use std::time::{Duration, Instant};

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use timecache::{CacheDuration, Config, TimeCache};

fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "timecache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        "Configuration loaded: db_path={}, degrade_on_store_error={}",
        config.db_path.display(),
        config.degrade_on_store_error
    );

    let cache = Arc::new(
        TimeCache::open(&config)
            .with_context(|| format!("opening cache store {}", config.db_path.display()))?,
    );

    let square = cache.wrap_infallible(
        "timecache::demo::square",
        CacheDuration::from_seconds(10),
        |x: &u64| {
            sleep(Duration::from_secs(2));
            x * x
        },
    )?;

    for attempt in 1..=2 {
        let started = Instant::now();
        let value = square.call(&2)?;
        info!(attempt, value, elapsed_ms = started.elapsed().as_millis() as u64, "square(2)");
    }

    let stats = cache.stats();
    info!(
        hits = stats.hits,
        misses = stats.misses,
        hit_rate = stats.hit_rate(),
        "Cache statistics"
    );
    Ok(())
}
