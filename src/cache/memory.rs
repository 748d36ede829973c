//! Bounded, lazily-expiring in-memory cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::api::{Dataset, Project, Resource, Sample, Thumbnail};

use super::entry::{CacheEntry, CacheStats, Collection};

/// How long an entry stays valid after it was written
pub const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);

/// Maximum number of live entries in the resource collection
pub const RESOURCE_CAPACITY: usize = 50;

/// Key of the single entry in the project list collection
const PROJECT_LIST_KEY: &str = "projects";

struct TableInner<V> {
  entries: HashMap<String, CacheEntry<V>>,
  next_seq: u64,
}

/// One keyed collection guarded by its own lock.
struct TtlTable<V> {
  inner: Mutex<TableInner<V>>,
  ttl: Duration,
  capacity: Option<usize>,
}

impl<V: Clone> TtlTable<V> {
  fn new(ttl: Duration, capacity: Option<usize>) -> Self {
    Self {
      inner: Mutex::new(TableInner {
        entries: HashMap::new(),
        next_seq: 0,
      }),
      ttl,
      capacity,
    }
  }

  fn lock(&self) -> MutexGuard<'_, TableInner<V>> {
    // Entries are replaced whole, so a panicked writer leaves nothing half-written
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn put(&self, key: &str, value: V) {
    let mut inner = self.lock();

    if let Some(capacity) = self.capacity {
      if !inner.entries.contains_key(key) && inner.entries.len() >= capacity {
        // Oldest write goes first; reads never refresh the timestamp
        let oldest = inner
          .entries
          .iter()
          .min_by_key(|(_, e)| (e.written_at, e.seq))
          .map(|(k, _)| k.clone());
        if let Some(oldest) = oldest {
          debug!(key = %oldest, "evicting oldest cache entry");
          inner.entries.remove(&oldest);
        }
      }
    }

    let seq = inner.next_seq;
    inner.next_seq += 1;
    inner.entries.insert(
      key.to_string(),
      CacheEntry {
        value,
        written_at: Instant::now(),
        seq,
      },
    );
  }

  fn get(&self, key: &str) -> Option<V> {
    let mut inner = self.lock();
    let now = Instant::now();

    let valid = inner.entries.get(key)?.is_valid(now, self.ttl);
    if valid {
      inner.entries.get(key).map(|e| e.value.clone())
    } else {
      debug!(key, "cache entry expired");
      inner.entries.remove(key);
      None
    }
  }
}

/// Type-erased operations used when a caller addresses a collection by name.
trait Table: Send + Sync {
  fn remove(&self, key: &str);
  fn clear(&self);
  fn len(&self) -> usize;
  fn age(&self, key: &str) -> Option<Duration>;
}

impl<V: Clone + Send> Table for TtlTable<V> {
  fn remove(&self, key: &str) {
    self.lock().entries.remove(key);
  }

  fn clear(&self) {
    self.lock().entries.clear();
  }

  fn len(&self) -> usize {
    self.lock().entries.len()
  }

  fn age(&self, key: &str) -> Option<Duration> {
    self.lock().entries.get(key).map(|e| e.age(Instant::now()))
  }
}

/// Process-wide cache for resources and project listings.
///
/// Each collection has its own lock. There is no atomicity across collections
/// or keys; concurrent writers to the same key are last-writer-wins. Expiry is
/// only discovered on read, there is no background sweep.
pub struct InMemoryCache {
  resources: TtlTable<Arc<Resource>>,
  thumbnails: TtlTable<Vec<Thumbnail>>,
  projects: TtlTable<Vec<Project>>,
  project_samples: TtlTable<Vec<Sample>>,
  project_datasets: TtlTable<Vec<Dataset>>,
}

impl Default for InMemoryCache {
  fn default() -> Self {
    Self::new()
  }
}

impl InMemoryCache {
  pub fn new() -> Self {
    Self::with_settings(DEFAULT_TTL, RESOURCE_CAPACITY)
  }

  /// Create a cache with a custom TTL and resource capacity.
  pub fn with_settings(ttl: Duration, resource_capacity: usize) -> Self {
    Self {
      resources: TtlTable::new(ttl, Some(resource_capacity)),
      thumbnails: TtlTable::new(ttl, None),
      projects: TtlTable::new(ttl, None),
      project_samples: TtlTable::new(ttl, None),
      project_datasets: TtlTable::new(ttl, None),
    }
  }

  fn table(&self, collection: Collection) -> &dyn Table {
    match collection {
      Collection::Resources => &self.resources,
      Collection::Thumbnails => &self.thumbnails,
      Collection::Projects => &self.projects,
      Collection::ProjectSamples => &self.project_samples,
      Collection::ProjectDatasets => &self.project_datasets,
    }
  }

  // Resources

  pub fn get_resource(&self, id: &str) -> Option<Arc<Resource>> {
    self.resources.get(id)
  }

  /// Store a resource snapshot under its unique id.
  pub fn put_resource(&self, resource: Arc<Resource>) {
    let key = resource.unique_id().to_string();
    self.resources.put(&key, resource);
  }

  /// Whether a valid snapshot is cached; an expired one is removed.
  pub fn contains_resource(&self, id: &str) -> bool {
    self.get_resource(id).is_some()
  }

  // Thumbnails

  pub fn get_thumbnails(&self, dataset_id: &str) -> Option<Vec<Thumbnail>> {
    self.thumbnails.get(dataset_id)
  }

  pub fn put_thumbnails(&self, dataset_id: &str, thumbnails: Vec<Thumbnail>) {
    self.thumbnails.put(dataset_id, thumbnails);
  }

  // Projects

  pub fn get_projects(&self) -> Option<Vec<Project>> {
    self.projects.get(PROJECT_LIST_KEY)
  }

  pub fn put_projects(&self, projects: Vec<Project>) {
    self.projects.put(PROJECT_LIST_KEY, projects);
  }

  pub fn get_project_samples(&self, project_id: &str) -> Option<Vec<Sample>> {
    self.project_samples.get(project_id)
  }

  pub fn put_project_samples(&self, project_id: &str, samples: Vec<Sample>) {
    self.project_samples.put(project_id, samples);
  }

  pub fn get_project_datasets(&self, project_id: &str) -> Option<Vec<Dataset>> {
    self.project_datasets.get(project_id)
  }

  pub fn put_project_datasets(&self, project_id: &str, datasets: Vec<Dataset>) {
    self.project_datasets.put(project_id, datasets);
  }

  // Invalidation and inspection

  /// Remove one key from a collection.
  pub fn remove(&self, collection: Collection, key: &str) {
    self.table(collection).remove(key);
  }

  /// Remove every entry of a collection.
  pub fn clear(&self, collection: Collection) {
    self.table(collection).clear();
  }

  pub fn clear_all(&self) {
    for collection in Collection::ALL {
      self.clear(collection);
    }
  }

  /// Whole minutes since the entry was written, if it is stored.
  ///
  /// Does not check expiry.
  pub fn age_minutes(&self, collection: Collection, key: &str) -> Option<u64> {
    self
      .table(collection)
      .age(key)
      .map(|age| age.as_secs() / 60)
  }

  /// Age of the cached project list in minutes.
  pub fn projects_age_minutes(&self) -> Option<u64> {
    self.age_minutes(Collection::Projects, PROJECT_LIST_KEY)
  }

  pub fn stats(&self) -> CacheStats {
    CacheStats {
      resources: self.resources.len(),
      thumbnails: self.thumbnails.len(),
      projects: self.projects.len(),
      project_samples: self.project_samples.len(),
      project_datasets: self.project_datasets.len(),
    }
  }
}
