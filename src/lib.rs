// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod config;
pub mod ingest;
pub mod metrics;
pub mod query;
pub mod scheduler;
pub mod store;
pub mod summary;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::ingest::types::{FeedFetcher, Item};
pub use crate::query::{QueryError, QueryService};
pub use crate::scheduler::{Scheduler, SchedulerCfg};
pub use crate::store::{ItemStore, SqliteStore};
pub use crate::summary::{Summarizer, Summary};

/// Compact `fmt` subscriber honoring `RUST_LOG`, default `feed_digest=info,warn`.
/// Safe to call more than once (later calls are no-ops).
pub fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("feed_digest=info,warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}
