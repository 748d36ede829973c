//! Caching for resources and project listings.
//!
//! Two independent stores:
//! - `InMemoryCache`: bounded, per-collection locked, lazily expiring
//! - `PersistentSummaryStore`: best-effort JSON file of project summaries
//!   that survives restarts

mod entry;
mod memory;
mod summary;

pub use entry::{CacheEntry, CacheStats, Collection};
pub use memory::{InMemoryCache, DEFAULT_TTL, RESOURCE_CAPACITY};
pub use summary::{summarize, PersistentSummaryStore, ProjectSummary, SUMMARY_TTL_HOURS};
