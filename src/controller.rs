//! Cache-first fetch orchestration behind the resource screen.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::api::Resource;
use crate::cache::{Collection, InMemoryCache};
use crate::repository::ResourceRepository;
use crate::state::UiState;

/// Direction hint for a transition between related resources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiblingDirection {
  Previous,
  Next,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drives the resource screen.
///
/// State is published through a watch channel, and only the latest request
/// may publish. Background prefetches are owned by the controller and
/// aborted when it is dropped; they only ever write complete snapshots to
/// the cache.
pub struct ResourceController {
  repository: ResourceRepository,
  cache: Arc<InMemoryCache>,
  state: watch::Sender<UiState>,
  /// Bumped by every foreground request
  request: AtomicU64,
  #[cfg(test)]
  published: Mutex<Vec<UiState>>,
  /// resource id -> (section key -> expanded)
  sections: Mutex<HashMap<String, HashMap<String, bool>>>,
  sibling_direction: Mutex<Option<SiblingDirection>>,
  prefetch: Mutex<JoinSet<()>>,
  /// Abort handles of every unfinished prefetch, including ones being settled
  prefetch_handles: Mutex<Vec<AbortHandle>>,
  /// Ids with a prefetch in flight
  prefetching: Arc<Mutex<HashSet<String>>>,
}

impl ResourceController {
  pub fn new(repository: ResourceRepository, cache: Arc<InMemoryCache>) -> Self {
    let (state, _) = watch::channel(UiState::Idle);
    Self {
      repository,
      cache,
      state,
      request: AtomicU64::new(0),
      #[cfg(test)]
      published: Mutex::new(Vec::new()),
      sections: Mutex::new(HashMap::new()),
      sibling_direction: Mutex::new(None),
      prefetch: Mutex::new(JoinSet::new()),
      prefetch_handles: Mutex::new(Vec::new()),
      prefetching: Arc::new(Mutex::new(HashSet::new())),
    }
  }

  pub fn subscribe(&self) -> watch::Receiver<UiState> {
    self.state.subscribe()
  }

  pub fn state(&self) -> UiState {
    self.state.borrow().clone()
  }

  pub fn cache(&self) -> &Arc<InMemoryCache> {
    &self.cache
  }

  /// Publish `state` unless a newer request has started since `ticket`.
  fn publish(&self, ticket: u64, state: UiState) -> bool {
    self.state.send_if_modified(|current| {
      if self.request.load(Ordering::SeqCst) != ticket {
        return false;
      }
      #[cfg(test)]
      lock(&self.published).push(state.clone());
      *current = state;
      true
    })
  }

  /// Every state published so far, oldest first. Drains the record.
  #[cfg(test)]
  fn take_published(&self) -> Vec<UiState> {
    std::mem::take(&mut *lock(&self.published))
  }

  /// Show the resource named by `id`, from cache when possible.
  pub async fn fetch_by_identifier(&self, id: &str) {
    let ticket = self.request.fetch_add(1, Ordering::SeqCst) + 1;

    if let Some(resource) = self.cache.get_resource(id) {
      debug!(id, "resource cache hit");
      let thumbnails = self.cache.get_thumbnails(id).unwrap_or_default();
      let published = self.publish(
        ticket,
        UiState::Success {
          resource: Arc::clone(&resource),
          thumbnails,
          is_refreshing: false,
        },
      );
      if published {
        self.prefetch_related(&resource);
      }
      return;
    }

    // Keep the current payload on screen while the new one loads
    let pending = self.state.borrow().refreshing();
    self.publish(ticket, pending.unwrap_or(UiState::Loading));

    match self.repository.fetch(id).await {
      Ok(resource) => {
        let resource = Arc::new(resource);
        self.cache.put_resource(Arc::clone(&resource));

        let thumbnails = match resource.as_ref() {
          Resource::Dataset(dataset) => {
            let thumbnails = self.repository.fetch_thumbnails(&dataset.unique_id).await;
            self
              .cache
              .put_thumbnails(&dataset.unique_id, thumbnails.clone());
            thumbnails
          }
          Resource::Sample(_) => Vec::new(),
        };

        info!(id, kind = ?resource.kind(), "resource loaded");
        let published = self.publish(
          ticket,
          UiState::Success {
            resource: Arc::clone(&resource),
            thumbnails,
            is_refreshing: false,
          },
        );
        if published {
          self.prefetch_related(&resource);
        } else {
          debug!(id, "newer request in flight, result only cached");
        }
      }
      Err(e) => {
        warn!(id, error = %e, "resource fetch failed");
        self.publish(ticket, UiState::Error(e.to_string()));
      }
    }
  }

  /// Drop the cached copy and fetch again over the network.
  pub async fn refresh(&self, id: &str) {
    self.cache.remove(Collection::Resources, id);
    self.cache.remove(Collection::Thumbnails, id);
    self.fetch_by_identifier(id).await;
  }

  /// Cached or freshly fetched resource, without touching the visible state.
  pub async fn ensure_cached(&self, id: &str) -> Option<Arc<Resource>> {
    if let Some(resource) = self.cache.get_resource(id) {
      return Some(resource);
    }
    match self.repository.fetch(id).await {
      Ok(resource) => {
        let resource = Arc::new(resource);
        self.cache.put_resource(Arc::clone(&resource));
        Some(resource)
      }
      Err(e) => {
        debug!(id, error = %e, "could not resolve navigation target");
        None
      }
    }
  }

  /// Navigate to a related resource with a directional transition.
  pub async fn navigate_to_sibling(&self, id: &str, direction: SiblingDirection) {
    self.set_sibling_direction(Some(direction));
    self.fetch_by_identifier(id).await;
  }

  /// Navigate anywhere else; clears any pending sibling hint first.
  pub async fn navigate_to(&self, id: &str) {
    self.set_sibling_direction(None);
    self.fetch_by_identifier(id).await;
  }

  // Background prefetch

  /// Fetch every referenced resource that is not cached yet, each in its own task.
  fn prefetch_related(&self, resource: &Resource) {
    let ids: BTreeSet<String> = resource
      .referenced_ids()
      .filter(|id| *id != resource.unique_id())
      .filter(|id| !self.cache.contains_resource(id))
      .map(String::from)
      .collect();
    if ids.is_empty() {
      return;
    }

    let mut tasks = lock(&self.prefetch);
    let mut handles = lock(&self.prefetch_handles);
    // Reap finished tasks so neither list grows over a session
    while tasks.try_join_next().is_some() {}
    handles.retain(|handle| !handle.is_finished());

    for id in ids {
      if !lock(&self.prefetching).insert(id.clone()) {
        continue;
      }

      let repository = self.repository.clone();
      let cache = Arc::clone(&self.cache);
      let prefetching = Arc::clone(&self.prefetching);
      let handle = tasks.spawn(async move {
        match repository.fetch(&id).await {
          Ok(resource) => {
            // A cache hit later must be able to show thumbnails without a round trip
            if let Resource::Dataset(dataset) = &resource {
              let thumbnails = repository.fetch_thumbnails(&dataset.unique_id).await;
              cache.put_thumbnails(&dataset.unique_id, thumbnails);
            }
            debug!(id, "prefetched related resource");
            cache.put_resource(Arc::new(resource));
          }
          Err(e) => debug!(id, error = %e, "prefetch failed"),
        }
        lock(&prefetching).remove(&id);
      });
      handles.push(handle);
    }
  }

  /// Wait until every prefetch started so far has finished or been cancelled.
  pub async fn settle_prefetch(&self) {
    let mut tasks = std::mem::take(&mut *lock(&self.prefetch));
    while tasks.join_next().await.is_some() {}
  }

  /// Abort all in-flight prefetches, including any a caller is settling.
  pub fn cancel_prefetch(&self) {
    for handle in lock(&self.prefetch_handles).drain(..) {
      handle.abort();
    }
    lock(&self.prefetching).clear();
  }

  // Per-resource UI sub-state

  pub fn set_section_expanded(&self, resource_id: &str, section: &str, expanded: bool) {
    lock(&self.sections)
      .entry(resource_id.to_string())
      .or_default()
      .insert(section.to_string(), expanded);
  }

  /// Remembered expansion of a section, if it was ever set.
  pub fn is_section_expanded(&self, resource_id: &str, section: &str) -> Option<bool> {
    lock(&self.sections)
      .get(resource_id)
      .and_then(|sections| sections.get(section))
      .copied()
  }

  /// Flip a section, starting from `default` if it was never set. Returns the new value.
  pub fn toggle_section(&self, resource_id: &str, section: &str, default: bool) -> bool {
    let mut sections = lock(&self.sections);
    let expanded = sections
      .entry(resource_id.to_string())
      .or_default()
      .entry(section.to_string())
      .or_insert(default);
    *expanded = !*expanded;
    *expanded
  }

  pub fn section_states(&self, resource_id: &str) -> HashMap<String, bool> {
    lock(&self.sections)
      .get(resource_id)
      .cloned()
      .unwrap_or_default()
  }

  // Sibling navigation hint

  pub fn set_sibling_direction(&self, direction: Option<SiblingDirection>) {
    *lock(&self.sibling_direction) = direction;
  }

  pub fn sibling_direction(&self) -> Option<SiblingDirection> {
    *lock(&self.sibling_direction)
  }

  /// Read the hint and reset it.
  pub fn take_sibling_direction(&self) -> Option<SiblingDirection> {
    lock(&self.sibling_direction).take()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::Thumbnail;
  use crate::testing::{dataset, refs, sample, FakeClient};
  use std::time::Duration;

  fn controller(client: &Arc<FakeClient>) -> Arc<ResourceController> {
    Arc::new(ResourceController::new(
      ResourceRepository::new(client.clone()),
      Arc::new(InMemoryCache::new()),
    ))
  }

  /// S1 with parents P2, P1 and child C1, all of which exist
  fn family(client: &FakeClient) {
    client.add_sample(sample("S1"), refs(&["P2", "P1"]), refs(&["C1"]));
    client.add_sample(sample("P1"), Vec::new(), refs(&["S1"]));
    client.add_sample(sample("P2"), Vec::new(), refs(&["S1"]));
    client.add_sample(sample("C1"), refs(&["S1"]), Vec::new());
  }

  #[tokio::test]
  async fn test_cold_fetch_loading_then_success() {
    let client = FakeClient::new();
    family(&client);
    let controller = controller(&client);
    let mut rx = controller.subscribe();
    assert_eq!(*rx.borrow(), UiState::Idle);

    client.close_gate();
    let task = {
      let controller = Arc::clone(&controller);
      tokio::spawn(async move { controller.fetch_by_identifier("S1").await })
    };

    rx.changed().await.unwrap();
    assert!(rx.borrow_and_update().is_loading());

    client.open_gate();
    task.await.unwrap();

    let state = controller.state();
    let Some(resource) = state.resource() else {
      panic!("expected success, got {:?}", state);
    };
    let Resource::Sample(s) = resource.as_ref() else {
      panic!("expected a sample");
    };
    let parents: Vec<&str> = s.parent_samples.iter().map(|r| r.unique_id.as_str()).collect();
    assert_eq!(parents, vec!["P1", "P2"]);
    assert_eq!(s.child_samples.len(), 1);
    assert!(!state.is_refreshing());

    let published = controller.take_published();
    assert_eq!(published.len(), 2, "{:?}", published);
    assert!(published[0].is_loading());
    assert!(published[1].is_success());

    controller.settle_prefetch().await;
    for id in ["P1", "P2", "C1"] {
      assert!(controller.cache().contains_resource(id), "{} not prefetched", id);
    }
  }

  #[tokio::test]
  async fn test_cached_fetch_has_no_network_round_trip() {
    let client = FakeClient::new();
    family(&client);
    let controller = controller(&client);

    controller.fetch_by_identifier("S1").await;
    controller.settle_prefetch().await;
    let calls = client.total_calls();
    controller.take_published();

    let mut rx = controller.subscribe();
    rx.borrow_and_update();

    // Any network call would block forever
    client.close_gate();
    tokio::time::timeout(Duration::from_secs(1), controller.fetch_by_identifier("S1"))
      .await
      .expect("cached fetch should not wait on the network");

    assert!(rx.has_changed().unwrap());
    let state = rx.borrow_and_update().clone();
    assert!(state.is_success());
    assert!(!state.is_refreshing());
    assert_eq!(client.total_calls(), calls);
    assert_eq!(client.calls_for("resolve_type", "S1"), 1);

    // Exactly one Success, no Loading in between
    let published = controller.take_published();
    assert_eq!(published, vec![state]);
  }

  #[tokio::test]
  async fn test_refresh_always_hits_network() {
    let client = FakeClient::new();
    family(&client);
    let controller = controller(&client);

    controller.fetch_by_identifier("S1").await;
    controller.refresh("S1").await;

    assert_eq!(client.calls_for("get_sample", "S1"), 2);
    assert!(controller.state().is_success());
  }

  #[tokio::test]
  async fn test_miss_while_showing_marks_refreshing() {
    let client = FakeClient::new();
    family(&client);
    client.add_sample(sample("X"), Vec::new(), Vec::new());
    let controller = controller(&client);

    controller.fetch_by_identifier("S1").await;
    let mut rx = controller.subscribe();
    rx.borrow_and_update();

    client.close_gate();
    let task = {
      let controller = Arc::clone(&controller);
      tokio::spawn(async move { controller.fetch_by_identifier("X").await })
    };

    rx.changed().await.unwrap();
    {
      let state = rx.borrow_and_update();
      assert!(state.is_refreshing());
      assert_eq!(state.resource().unwrap().unique_id(), "S1");
    }

    client.open_gate();
    task.await.unwrap();

    let state = controller.state();
    assert_eq!(state.resource().unwrap().unique_id(), "X");
    assert!(!state.is_refreshing());
  }

  #[tokio::test]
  async fn test_failure_publishes_error() {
    let client = FakeClient::new();
    let controller = controller(&client);

    controller.fetch_by_identifier("missing").await;

    let state = controller.state();
    assert!(state.error().unwrap().contains("missing"));
    assert_eq!(controller.cache().stats().resources, 0);
  }

  #[tokio::test]
  async fn test_prefetch_failures_are_isolated() {
    let client = FakeClient::new();
    family(&client);
    client.fail("get_sample", "P1");
    let controller = controller(&client);

    controller.fetch_by_identifier("S1").await;
    controller.settle_prefetch().await;

    assert_eq!(controller.state().resource().unwrap().unique_id(), "S1");
    assert!(!controller.cache().contains_resource("P1"));
    assert!(controller.cache().contains_resource("P2"));
    assert!(controller.cache().contains_resource("C1"));
  }

  #[tokio::test]
  async fn test_dataset_thumbnails_are_cached() {
    let client = FakeClient::new();
    client.add_dataset(dataset("D1"), Vec::new(), Vec::new(), Vec::new());
    client.set_thumbnails("D1", vec![Thumbnail("AAAA".into()), Thumbnail("BBBB".into())]);
    let controller = controller(&client);

    controller.fetch_by_identifier("D1").await;
    assert_eq!(controller.state().thumbnails().len(), 2);
    assert_eq!(controller.cache().get_thumbnails("D1").unwrap().len(), 2);

    controller.fetch_by_identifier("D1").await;
    assert_eq!(controller.state().thumbnails().len(), 2);
    assert_eq!(client.calls("get_thumbnails"), 1);
  }

  #[tokio::test]
  async fn test_late_result_does_not_replace_newer_request() {
    let client = FakeClient::new();
    client.add_sample(sample("A"), Vec::new(), Vec::new());
    client.add_sample(sample("B"), Vec::new(), Vec::new());
    let controller = controller(&client);
    controller.ensure_cached("B").await.unwrap();

    let mut rx = controller.subscribe();
    client.close_gate();
    let task = {
      let controller = Arc::clone(&controller);
      tokio::spawn(async move { controller.fetch_by_identifier("A").await })
    };
    rx.changed().await.unwrap();
    assert!(rx.borrow_and_update().is_loading());

    // Served from cache while A is still blocked
    controller.navigate_to("B").await;
    assert_eq!(controller.state().resource().unwrap().unique_id(), "B");

    client.open_gate();
    task.await.unwrap();

    assert_eq!(controller.state().resource().unwrap().unique_id(), "B");
    // The late result is still kept for the next visit
    assert!(controller.cache().contains_resource("A"));
  }

  #[tokio::test]
  async fn test_prefetched_dataset_shows_thumbnails() {
    let client = FakeClient::new();
    client.add_dataset(dataset("D1"), Vec::new(), refs(&["D2"]), Vec::new());
    client.add_dataset(dataset("D2"), refs(&["D1"]), Vec::new(), Vec::new());
    client.set_thumbnails("D2", vec![Thumbnail("AAAA".into())]);
    let controller = controller(&client);

    controller.fetch_by_identifier("D1").await;
    controller.settle_prefetch().await;
    assert_eq!(client.calls_for("get_thumbnails", "D2"), 1);

    controller
      .navigate_to_sibling("D2", SiblingDirection::Next)
      .await;

    assert_eq!(controller.state().thumbnails().len(), 1);
    // Shown from cache, fetched once by the prefetch
    assert_eq!(client.calls_for("get_thumbnails", "D2"), 1);
  }

  #[tokio::test]
  async fn test_cancel_reaches_prefetches_being_settled() {
    let client = FakeClient::new();
    family(&client);
    let cache = Arc::new(InMemoryCache::new());
    let controller = Arc::new(ResourceController::new(
      ResourceRepository::new(client.clone()),
      cache.clone(),
    ));
    let seeded = ResourceRepository::new(client.clone()).fetch("S1").await.unwrap();
    cache.put_resource(Arc::new(seeded));

    client.close_gate();
    controller.fetch_by_identifier("S1").await;
    let settling = {
      let controller = Arc::clone(&controller);
      tokio::spawn(async move { controller.settle_prefetch().await })
    };
    // Let the settle take the tasks and the prefetches block on the gate
    tokio::task::yield_now().await;

    controller.cancel_prefetch();
    tokio::time::timeout(Duration::from_secs(1), settling)
      .await
      .expect("settle should end once its tasks are aborted")
      .unwrap();

    client.open_gate();
    tokio::time::sleep(Duration::from_millis(50)).await;
    for id in ["P1", "P2", "C1"] {
      assert!(!cache.contains_resource(id));
    }
  }

  #[tokio::test]
  async fn test_drop_cancels_prefetch() {
    let client = FakeClient::new();
    family(&client);
    let cache = Arc::new(InMemoryCache::new());
    let controller = ResourceController::new(ResourceRepository::new(client.clone()), cache.clone());

    // Seed S1 so the fetch is a cache hit and only prefetches touch the network
    let seeded = ResourceRepository::new(client.clone()).fetch("S1").await.unwrap();
    cache.put_resource(Arc::new(seeded));

    client.close_gate();
    controller.fetch_by_identifier("S1").await;
    drop(controller);
    client.open_gate();

    tokio::time::sleep(Duration::from_millis(50)).await;
    for id in ["P1", "P2", "C1"] {
      assert!(!cache.contains_resource(id));
      assert_eq!(client.calls_for("get_sample", id), 0);
    }
  }

  #[tokio::test]
  async fn test_ensure_cached_leaves_state_alone() {
    let client = FakeClient::new();
    family(&client);
    let controller = controller(&client);

    let resource = controller.ensure_cached("P1").await.unwrap();
    assert_eq!(resource.unique_id(), "P1");
    assert!(controller.cache().contains_resource("P1"));
    assert!(controller.ensure_cached("nope").await.is_none());
    assert_eq!(controller.state(), UiState::Idle);

    // Second call is served from cache
    controller.ensure_cached("P1").await;
    assert_eq!(client.calls_for("get_sample", "P1"), 1);
  }

  #[tokio::test]
  async fn test_sibling_direction_is_one_shot() {
    let client = FakeClient::new();
    family(&client);
    let controller = controller(&client);

    controller
      .navigate_to_sibling("P1", SiblingDirection::Next)
      .await;
    assert_eq!(controller.sibling_direction(), Some(SiblingDirection::Next));
    assert_eq!(controller.state().resource().unwrap().unique_id(), "P1");

    controller.navigate_to("C1").await;
    assert_eq!(controller.sibling_direction(), None);

    controller.set_sibling_direction(Some(SiblingDirection::Previous));
    assert_eq!(
      controller.take_sibling_direction(),
      Some(SiblingDirection::Previous)
    );
    assert_eq!(controller.sibling_direction(), None);
  }

  #[test]
  fn test_section_state_per_resource() {
    let client = FakeClient::new();
    let controller = ResourceController::new(
      ResourceRepository::new(client),
      Arc::new(InMemoryCache::new()),
    );

    assert_eq!(controller.is_section_expanded("S1", "parents"), None);
    controller.set_section_expanded("S1", "parents", true);
    assert!(!controller.toggle_section("S1", "parents", false));
    assert!(controller.toggle_section("S1", "metadata", false));

    assert_eq!(controller.is_section_expanded("S1", "parents"), Some(false));
    assert_eq!(controller.section_states("S1").len(), 2);
    assert!(controller.section_states("S2").is_empty());
  }
}
