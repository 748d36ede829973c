//! Core types shared by the in-memory cache tables.

use std::time::Duration;
use tokio::time::Instant;

/// A cached value and the moment it was written.
///
/// Entries are never mutated; a new write replaces the entry wholesale.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
  pub value: T,
  pub written_at: Instant,
  /// Write order, breaks ties between entries written at the same instant
  pub(crate) seq: u64,
}

impl<T> CacheEntry<T> {
  pub fn age(&self, now: Instant) -> Duration {
    now.saturating_duration_since(self.written_at)
  }

  /// Valid while `age <= ttl`.
  pub fn is_valid(&self, now: Instant, ttl: Duration) -> bool {
    self.age(now) <= ttl
  }
}

/// The independent collections held by [`super::InMemoryCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
  /// Single resources keyed by unique id (bounded)
  Resources,
  /// Thumbnail lists keyed by dataset id
  Thumbnails,
  /// The one project list
  Projects,
  /// Samples keyed by project id
  ProjectSamples,
  /// Datasets keyed by project id
  ProjectDatasets,
}

impl Collection {
  pub const ALL: [Collection; 5] = [
    Collection::Resources,
    Collection::Thumbnails,
    Collection::Projects,
    Collection::ProjectSamples,
    Collection::ProjectDatasets,
  ];
}

/// Number of stored entries per collection.
///
/// Expired entries count until a read discovers them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
  pub resources: usize,
  pub thumbnails: usize,
  pub projects: usize,
  pub project_samples: usize,
  pub project_datasets: usize,
}

impl CacheStats {
  pub fn total(&self) -> usize {
    self.resources + self.thumbnails + self.projects + self.project_samples + self.project_datasets
  }
}
