//! In-memory fake of the remote API and record builders for unit tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

use crate::api::{
  ClientError, ClientResult, Dataset, Project, Reference, ResourceClient, ResourceKind, Sample,
  ScientificMetadata, Thumbnail,
};

pub fn sample(id: &str) -> Sample {
  Sample {
    unique_id: id.to_string(),
    name: format!("sample {}", id),
    description: None,
    sample_type: None,
    owner: None,
    project_id: None,
    created_at: None,
    parent_samples: Vec::new(),
    child_samples: Vec::new(),
  }
}

pub fn dataset(id: &str) -> Dataset {
  Dataset {
    unique_id: id.to_string(),
    name: format!("dataset {}", id),
    description: None,
    measurement: None,
    instrument: None,
    owner: None,
    project_id: None,
    created_at: None,
    scientific_metadata: None,
    parent_datasets: Vec::new(),
    child_datasets: Vec::new(),
    linked_samples: Vec::new(),
  }
}

pub fn project(id: &str) -> Project {
  Project {
    project_id: id.to_string(),
    name: Some(format!("project {}", id)),
    description: None,
    lead_email: None,
    created_at: None,
  }
}

pub fn refs(ids: &[&str]) -> Vec<Reference> {
  ids.iter().map(|id| Reference::new(*id, *id)).collect()
}

#[derive(Default)]
struct FakeData {
  discovery_fails: bool,
  samples: HashMap<String, Sample>,
  datasets: HashMap<String, Dataset>,
  sample_parents: HashMap<String, Vec<Reference>>,
  sample_children: HashMap<String, Vec<Reference>>,
  dataset_parents: HashMap<String, Vec<Reference>>,
  dataset_children: HashMap<String, Vec<Reference>>,
  dataset_samples: HashMap<String, Vec<Reference>>,
  metadata: HashMap<String, ScientificMetadata>,
  thumbnails: HashMap<String, Vec<Thumbnail>>,
  projects: Vec<Project>,
  project_samples: HashMap<String, Vec<Sample>>,
  project_datasets: HashMap<String, Vec<Dataset>>,
  failing: HashSet<(&'static str, String)>,
}

/// Fake remote API that records every call.
#[derive(Default)]
pub struct FakeClient {
  data: Mutex<FakeData>,
  calls: Mutex<Vec<(&'static str, String)>>,
  gate: Mutex<Option<Arc<Semaphore>>>,
}

impl FakeClient {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  fn data(&self) -> std::sync::MutexGuard<'_, FakeData> {
    self.data.lock().unwrap()
  }

  pub fn add_sample(&self, sample: Sample, parents: Vec<Reference>, children: Vec<Reference>) {
    let mut data = self.data();
    let id = sample.unique_id.clone();
    data.samples.insert(id.clone(), sample);
    data.sample_parents.insert(id.clone(), parents);
    data.sample_children.insert(id, children);
  }

  pub fn add_dataset(
    &self,
    dataset: Dataset,
    parents: Vec<Reference>,
    children: Vec<Reference>,
    samples: Vec<Reference>,
  ) {
    let mut data = self.data();
    let id = dataset.unique_id.clone();
    data.datasets.insert(id.clone(), dataset);
    data.dataset_parents.insert(id.clone(), parents);
    data.dataset_children.insert(id.clone(), children);
    data.dataset_samples.insert(id, samples);
  }

  pub fn set_metadata(&self, id: &str, metadata: ScientificMetadata) {
    self.data().metadata.insert(id.to_string(), metadata);
  }

  pub fn set_thumbnails(&self, id: &str, thumbnails: Vec<Thumbnail>) {
    self.data().thumbnails.insert(id.to_string(), thumbnails);
  }

  pub fn add_project(&self, project: Project, samples: Vec<Sample>, datasets: Vec<Dataset>) {
    let mut data = self.data();
    let id = project.project_id.clone();
    data.projects.push(project);
    data.project_samples.insert(id.clone(), samples);
    data.project_datasets.insert(id, datasets);
  }

  pub fn fail_discovery(&self) {
    self.data().discovery_fails = true;
  }

  /// Make `method` fail with a transport error for `id`.
  pub fn fail(&self, method: &'static str, id: &str) {
    self.data().failing.insert((method, id.to_string()));
  }

  /// Block every call until [`FakeClient::open_gate`] is called.
  pub fn close_gate(&self) {
    *self.gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
  }

  pub fn open_gate(&self) {
    if let Some(gate) = self.gate.lock().unwrap().take() {
      gate.add_permits(Semaphore::MAX_PERMITS / 2);
    }
  }

  pub fn calls(&self, method: &str) -> usize {
    self
      .calls
      .lock()
      .unwrap()
      .iter()
      .filter(|(m, _)| *m == method)
      .count()
  }

  pub fn calls_for(&self, method: &str, id: &str) -> usize {
    self
      .calls
      .lock()
      .unwrap()
      .iter()
      .filter(|(m, i)| *m == method && i == id)
      .count()
  }

  pub fn total_calls(&self) -> usize {
    self.calls.lock().unwrap().len()
  }

  async fn record(&self, method: &'static str, id: &str) -> ClientResult<()> {
    self.calls.lock().unwrap().push((method, id.to_string()));

    let gate = self.gate.lock().unwrap().clone();
    if let Some(gate) = gate {
      let _permit = gate.acquire().await;
    }

    if self.data().failing.contains(&(method, id.to_string())) {
      return Err(ClientError::Http(format!("{} failed for {}", method, id)));
    }
    Ok(())
  }

  fn lookup<T: Clone>(map: &HashMap<String, T>, id: &str) -> ClientResult<T> {
    map
      .get(id)
      .cloned()
      .ok_or_else(|| ClientError::NotFound(id.to_string()))
  }
}

#[async_trait]
impl ResourceClient for FakeClient {
  async fn resolve_type(&self, id: &str) -> ClientResult<ResourceKind> {
    self.record("resolve_type", id).await?;
    let data = self.data();
    if data.discovery_fails {
      return Err(ClientError::Status {
        status: 501,
        message: "type discovery unavailable".to_string(),
      });
    }
    if data.samples.contains_key(id) {
      Ok(ResourceKind::Sample)
    } else if data.datasets.contains_key(id) {
      Ok(ResourceKind::Dataset)
    } else {
      Err(ClientError::NotFound(id.to_string()))
    }
  }

  async fn get_sample(&self, id: &str) -> ClientResult<Sample> {
    self.record("get_sample", id).await?;
    Self::lookup(&self.data().samples, id)
  }

  async fn get_dataset(&self, id: &str) -> ClientResult<Dataset> {
    self.record("get_dataset", id).await?;
    Self::lookup(&self.data().datasets, id)
  }

  async fn get_scientific_metadata(&self, id: &str) -> ClientResult<ScientificMetadata> {
    self.record("get_scientific_metadata", id).await?;
    Self::lookup(&self.data().metadata, id)
  }

  async fn get_thumbnails(&self, id: &str) -> ClientResult<Vec<Thumbnail>> {
    self.record("get_thumbnails", id).await?;
    Ok(self.data().thumbnails.get(id).cloned().unwrap_or_default())
  }

  async fn get_sample_parents(&self, id: &str) -> ClientResult<Vec<Reference>> {
    self.record("get_sample_parents", id).await?;
    Ok(self.data().sample_parents.get(id).cloned().unwrap_or_default())
  }

  async fn get_sample_children(&self, id: &str) -> ClientResult<Vec<Reference>> {
    self.record("get_sample_children", id).await?;
    Ok(self.data().sample_children.get(id).cloned().unwrap_or_default())
  }

  async fn get_dataset_parents(&self, id: &str) -> ClientResult<Vec<Reference>> {
    self.record("get_dataset_parents", id).await?;
    Ok(self.data().dataset_parents.get(id).cloned().unwrap_or_default())
  }

  async fn get_dataset_children(&self, id: &str) -> ClientResult<Vec<Reference>> {
    self.record("get_dataset_children", id).await?;
    Ok(self.data().dataset_children.get(id).cloned().unwrap_or_default())
  }

  async fn get_samples_of_dataset(&self, id: &str) -> ClientResult<Vec<Reference>> {
    self.record("get_samples_of_dataset", id).await?;
    Ok(self.data().dataset_samples.get(id).cloned().unwrap_or_default())
  }

  async fn list_projects(&self) -> ClientResult<Vec<Project>> {
    self.record("list_projects", "").await?;
    Ok(self.data().projects.clone())
  }

  async fn list_samples_of_project(&self, project_id: &str) -> ClientResult<Vec<Sample>> {
    self.record("list_samples_of_project", project_id).await?;
    Self::lookup(&self.data().project_samples, project_id)
  }

  async fn list_datasets_of_project(
    &self,
    project_id: &str,
    _include_metadata: bool,
  ) -> ClientResult<Vec<Dataset>> {
    self.record("list_datasets_of_project", project_id).await?;
    Self::lookup(&self.data().project_datasets, project_id)
  }
}
