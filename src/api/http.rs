use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::config::Config;

use super::api_types::{
  strip_data_uri, ApiDataset, ApiProject, ApiReference, ApiSample, ApiThumbnail, ApiTypeResponse,
};
use super::client::{ClientError, ClientResult, ResourceClient};
use super::types::{Dataset, Project, Reference, ResourceKind, Sample, ScientificMetadata, Thumbnail};

/// HTTP implementation of the remote resource API
#[derive(Clone)]
pub struct HttpResourceClient {
  http: reqwest::Client,
  base: Url,
  api_key: String,
}

impl HttpResourceClient {
  pub fn new(config: &Config) -> Result<Self> {
    let api_key = Config::get_api_key()?;
    Self::with_api_key(config, api_key)
  }

  pub fn with_api_key(config: &Config, api_key: String) -> Result<Self> {
    let base = Url::parse(config.server.url.trim())
      .map_err(|e| eyre!("Invalid server url '{}': {}", config.server.url, e))?;
    if base.cannot_be_a_base() {
      return Err(eyre!("Server url '{}' cannot be a base", config.server.url));
    }

    let http = reqwest::Client::builder()
      .timeout(config.request_timeout())
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base,
      api_key,
    })
  }

  /// Append path segments to the base url, escaping each one
  fn endpoint(&self, segments: &[&str]) -> ClientResult<Url> {
    let mut url = self.base.clone();
    url
      .path_segments_mut()
      .map_err(|_| ClientError::Http(format!("invalid base url {}", self.base)))?
      .pop_if_empty()
      .extend(segments);
    Ok(url)
  }

  async fn get<T: DeserializeOwned>(&self, url: Url) -> ClientResult<T> {
    debug!(%url, "GET");
    let path = url.path().to_string();

    let response = self
      .http
      .get(url.clone())
      .bearer_auth(&self.api_key)
      .send()
      .await
      .map_err(|e| ClientError::Http(e.to_string()))?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND {
      return Err(ClientError::NotFound(path));
    }
    if !status.is_success() {
      let message = response.text().await.unwrap_or_default();
      return Err(ClientError::Status {
        status: status.as_u16(),
        message,
      });
    }

    response
      .json::<T>()
      .await
      .map_err(|e| ClientError::Decode(e.to_string()))
  }

  async fn get_references(&self, segments: &[&str]) -> ClientResult<Vec<Reference>> {
    let refs: Vec<ApiReference> = self.get(self.endpoint(segments)?).await?;
    Ok(refs.into_iter().map(Reference::from).collect())
  }
}

#[async_trait]
impl ResourceClient for HttpResourceClient {
  async fn resolve_type(&self, id: &str) -> ClientResult<ResourceKind> {
    let resp: ApiTypeResponse = self.get(self.endpoint(&["resources", id, "type"])?).await?;
    resp
      .kind()
      .ok_or_else(|| ClientError::Decode(format!("unknown resource type '{}'", resp.kind)))
  }

  async fn get_sample(&self, id: &str) -> ClientResult<Sample> {
    let sample: ApiSample = self.get(self.endpoint(&["samples", id])?).await?;
    Ok(sample.into())
  }

  async fn get_dataset(&self, id: &str) -> ClientResult<Dataset> {
    let dataset: ApiDataset = self.get(self.endpoint(&["datasets", id])?).await?;
    Ok(dataset.into())
  }

  async fn get_scientific_metadata(&self, id: &str) -> ClientResult<ScientificMetadata> {
    self.get(self.endpoint(&["datasets", id, "metadata"])?).await
  }

  async fn get_thumbnails(&self, id: &str) -> ClientResult<Vec<Thumbnail>> {
    let thumbs: Vec<ApiThumbnail> = self
      .get(self.endpoint(&["datasets", id, "thumbnails"])?)
      .await?;
    Ok(
      thumbs
        .iter()
        .map(|t| Thumbnail(strip_data_uri(&t.image).to_string()))
        .collect(),
    )
  }

  async fn get_sample_parents(&self, id: &str) -> ClientResult<Vec<Reference>> {
    self
      .get_references(&["samples", id, "parents"])
      .await
  }

  async fn get_sample_children(&self, id: &str) -> ClientResult<Vec<Reference>> {
    self
      .get_references(&["samples", id, "children"])
      .await
  }

  async fn get_dataset_parents(&self, id: &str) -> ClientResult<Vec<Reference>> {
    self
      .get_references(&["datasets", id, "parents"])
      .await
  }

  async fn get_dataset_children(&self, id: &str) -> ClientResult<Vec<Reference>> {
    self
      .get_references(&["datasets", id, "children"])
      .await
  }

  async fn get_samples_of_dataset(&self, id: &str) -> ClientResult<Vec<Reference>> {
    self
      .get_references(&["datasets", id, "samples"])
      .await
  }

  async fn list_projects(&self) -> ClientResult<Vec<Project>> {
    let projects: Vec<ApiProject> = self.get(self.endpoint(&["projects"])?).await?;
    Ok(projects.into_iter().map(Project::from).collect())
  }

  async fn list_samples_of_project(&self, project_id: &str) -> ClientResult<Vec<Sample>> {
    let samples: Vec<ApiSample> = self
      .get(self.endpoint(&["projects", project_id, "samples"])?)
      .await?;
    Ok(samples.into_iter().map(Sample::from).collect())
  }

  async fn list_datasets_of_project(
    &self,
    project_id: &str,
    include_metadata: bool,
  ) -> ClientResult<Vec<Dataset>> {
    let mut url = self.endpoint(&["projects", project_id, "datasets"])?;
    url
      .query_pairs_mut()
      .append_pair("includeMetadata", if include_metadata { "true" } else { "false" });
    let datasets: Vec<ApiDataset> = self.get(url).await?;
    Ok(datasets.into_iter().map(Dataset::from).collect())
  }
}
