//! Collaborator interface for the remote resource API.

use async_trait::async_trait;
use thiserror::Error;

use super::types::{Dataset, Project, Reference, ResourceKind, Sample, ScientificMetadata, Thumbnail};

/// Failure returned by a remote call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("server returned status {status}: {message}")]
  Status { status: u16, message: String },

  #[error("request failed: {0}")]
  Http(String),

  #[error("failed to decode response: {0}")]
  Decode(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Typed calls against the remote API.
///
/// Every call returns either a populated value or an explicit failure.
/// Timeouts and authentication are the implementation's concern.
#[async_trait]
pub trait ResourceClient: Send + Sync {
  /// Discover which kind of record an identifier names.
  async fn resolve_type(&self, id: &str) -> ClientResult<ResourceKind>;

  async fn get_sample(&self, id: &str) -> ClientResult<Sample>;

  async fn get_dataset(&self, id: &str) -> ClientResult<Dataset>;

  async fn get_scientific_metadata(&self, id: &str) -> ClientResult<ScientificMetadata>;

  /// Base64 image payloads attached to a dataset.
  async fn get_thumbnails(&self, id: &str) -> ClientResult<Vec<Thumbnail>>;

  async fn get_sample_parents(&self, id: &str) -> ClientResult<Vec<Reference>>;

  async fn get_sample_children(&self, id: &str) -> ClientResult<Vec<Reference>>;

  async fn get_dataset_parents(&self, id: &str) -> ClientResult<Vec<Reference>>;

  async fn get_dataset_children(&self, id: &str) -> ClientResult<Vec<Reference>>;

  /// Samples linked to a dataset.
  async fn get_samples_of_dataset(&self, id: &str) -> ClientResult<Vec<Reference>>;

  async fn list_projects(&self) -> ClientResult<Vec<Project>>;

  async fn list_samples_of_project(&self, project_id: &str) -> ClientResult<Vec<Sample>>;

  async fn list_datasets_of_project(
    &self,
    project_id: &str,
    include_metadata: bool,
  ) -> ClientResult<Vec<Dataset>>;
}
