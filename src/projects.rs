//! Project listings: cache-first reads and the refresh that feeds the
//! persisted summaries.

use chrono::{SubsecRound, Utc};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::api::{ClientError, Dataset, Project, ResourceClient, Sample};
use crate::cache::{summarize, InMemoryCache, PersistentSummaryStore, ProjectSummary};
use crate::error::ResourceError;

/// How many projects are listed in parallel during a full refresh
const PROJECT_FETCH_CONCURRENCY: usize = 4;

fn transport(e: ClientError) -> ResourceError {
  ResourceError::Transport(e.to_string())
}

pub struct ProjectService {
  client: Arc<dyn ResourceClient>,
  cache: Arc<InMemoryCache>,
  /// Only written from `refresh_all`; callers run one refresh at a time
  store: PersistentSummaryStore,
}

impl ProjectService {
  pub fn new(
    client: Arc<dyn ResourceClient>,
    cache: Arc<InMemoryCache>,
    store: PersistentSummaryStore,
  ) -> Self {
    Self {
      client,
      cache,
      store,
    }
  }

  /// Persisted summaries for display before the network answers.
  pub async fn cold_start(&self) -> Option<Vec<ProjectSummary>> {
    let store = self.store.clone();
    tokio::task::spawn_blocking(move || store.load())
      .await
      .ok()
      .flatten()
  }

  pub async fn summaries_age_hours(&self) -> Option<i64> {
    let store = self.store.clone();
    tokio::task::spawn_blocking(move || store.age_hours())
      .await
      .ok()
      .flatten()
  }

  /// Project list, from cache unless `force` is set.
  pub async fn projects(&self, force: bool) -> Result<Vec<Project>, ResourceError> {
    if !force {
      if let Some(projects) = self.cache.get_projects() {
        return Ok(projects);
      }
    }
    let projects = self.client.list_projects().await.map_err(transport)?;
    self.cache.put_projects(projects.clone());
    Ok(projects)
  }

  pub async fn project_samples(&self, project_id: &str) -> Result<Vec<Sample>, ResourceError> {
    if let Some(samples) = self.cache.get_project_samples(project_id) {
      return Ok(samples);
    }
    let samples = self
      .client
      .list_samples_of_project(project_id)
      .await
      .map_err(transport)?;
    self.cache.put_project_samples(project_id, samples.clone());
    Ok(samples)
  }

  /// Datasets of a project. A cached listing without metadata does not satisfy
  /// a request that includes it.
  pub async fn project_datasets(
    &self,
    project_id: &str,
    include_metadata: bool,
  ) -> Result<Vec<Dataset>, ResourceError> {
    if let Some(datasets) = self.cache.get_project_datasets(project_id) {
      if !include_metadata || datasets.iter().all(|d| d.scientific_metadata.is_some()) {
        return Ok(datasets);
      }
    }
    let datasets = self
      .client
      .list_datasets_of_project(project_id, include_metadata)
      .await
      .map_err(transport)?;
    self
      .cache
      .put_project_datasets(project_id, datasets.clone());
    Ok(datasets)
  }

  /// Reload every project with its samples and datasets, refill the cache and
  /// persist fresh summaries.
  ///
  /// Only a failed project list is an error; a project whose collections
  /// cannot be listed is summarized as empty.
  pub async fn refresh_all(&self) -> Result<Vec<ProjectSummary>, ResourceError> {
    let projects = self.projects(true).await?;

    let listings: Vec<_> = futures::stream::iter(projects.iter().map(|project| {
      let client = Arc::clone(&self.client);
      let id = project.project_id.clone();
      async move {
        let (samples, datasets) = futures::join!(
          client.list_samples_of_project(&id),
          client.list_datasets_of_project(&id, false),
        );
        (id, samples, datasets)
      }
    }))
    .buffer_unordered(PROJECT_FETCH_CONCURRENCY)
    .collect()
    .await;

    let mut samples_by_project = HashMap::new();
    let mut datasets_by_project = HashMap::new();
    for (id, samples, datasets) in listings {
      match samples {
        Ok(samples) => {
          self.cache.put_project_samples(&id, samples.clone());
          samples_by_project.insert(id.clone(), samples);
        }
        Err(e) => debug!(project = %id, error = %e, "project samples unavailable"),
      }
      match datasets {
        Ok(datasets) => {
          self.cache.put_project_datasets(&id, datasets.clone());
          datasets_by_project.insert(id.clone(), datasets);
        }
        Err(e) => debug!(project = %id, error = %e, "project datasets unavailable"),
      }
    }

    // Millisecond precision, matching what the store persists
    let now = Utc::now().trunc_subsecs(3);
    let summaries = summarize(&projects, &samples_by_project, &datasets_by_project, now);

    let store = self.store.clone();
    let batch = summaries.clone();
    let _ = tokio::task::spawn_blocking(move || store.save_summaries(batch, now)).await;

    info!("project summaries refreshed");
    Ok(summaries)
  }
}
