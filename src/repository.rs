//! Resolves an identifier to a fully enriched resource snapshot.

use std::sync::Arc;
use tracing::debug;

use crate::api::{
  normalize_references, ClientResult, Dataset, Reference, Resource, ResourceClient, ResourceKind,
  Sample, Thumbnail,
};
use crate::error::ResourceError;

/// Assembles immutable snapshots from a base fetch plus relation sub-fetches.
///
/// Only the base record is mandatory. A failed relation sub-fetch leaves that
/// field empty and is otherwise ignored. No retries happen here.
#[derive(Clone)]
pub struct ResourceRepository {
  client: Arc<dyn ResourceClient>,
}

impl ResourceRepository {
  pub fn new(client: Arc<dyn ResourceClient>) -> Self {
    Self { client }
  }

  pub fn client(&self) -> &Arc<dyn ResourceClient> {
    &self.client
  }

  /// Fetch the sample or dataset named by `id`.
  pub async fn fetch(&self, id: &str) -> Result<Resource, ResourceError> {
    match self.client.resolve_type(id).await {
      Ok(ResourceKind::Sample) => {
        let base = self
          .client
          .get_sample(id)
          .await
          .map_err(|e| ResourceError::from_client(id, e))?;
        Ok(Resource::Sample(self.enrich_sample(base).await))
      }
      Ok(ResourceKind::Dataset) => {
        let base = self
          .client
          .get_dataset(id)
          .await
          .map_err(|e| ResourceError::from_client(id, e))?;
        Ok(Resource::Dataset(self.enrich_dataset(base).await))
      }
      Err(e) => {
        debug!(id, error = %e, "type discovery failed, probing both kinds");
        self.fetch_without_discovery(id).await
      }
    }
  }

  /// Try sample first, then dataset. The first success wins.
  async fn fetch_without_discovery(&self, id: &str) -> Result<Resource, ResourceError> {
    if let Ok(base) = self.client.get_sample(id).await {
      return Ok(Resource::Sample(self.enrich_sample(base).await));
    }
    if let Ok(base) = self.client.get_dataset(id).await {
      return Ok(Resource::Dataset(self.enrich_dataset(base).await));
    }
    Err(ResourceError::NotFound(id.to_string()))
  }

  async fn enrich_sample(&self, base: Sample) -> Sample {
    let id = base.unique_id.clone();
    let (parents, children) = futures::join!(
      self.client.get_sample_parents(&id),
      self.client.get_sample_children(&id),
    );

    Sample {
      parent_samples: relation(&id, "parent samples", parents),
      child_samples: relation(&id, "child samples", children),
      ..base
    }
  }

  async fn enrich_dataset(&self, base: Dataset) -> Dataset {
    let id = base.unique_id.clone();
    let (metadata, parents, children, samples) = futures::join!(
      self.client.get_scientific_metadata(&id),
      self.client.get_dataset_parents(&id),
      self.client.get_dataset_children(&id),
      self.client.get_samples_of_dataset(&id),
    );

    let scientific_metadata = match metadata {
      Ok(metadata) => Some(metadata),
      Err(e) => {
        debug!(id = %id, error = %e, "scientific metadata unavailable");
        // Keep whatever the base record carried
        base.scientific_metadata.clone()
      }
    };

    Dataset {
      scientific_metadata,
      parent_datasets: relation(&id, "parent datasets", parents),
      child_datasets: relation(&id, "child datasets", children),
      linked_samples: relation(&id, "linked samples", samples),
      ..base
    }
  }

  /// Image payloads for a dataset, empty on any failure.
  pub async fn fetch_thumbnails(&self, dataset_id: &str) -> Vec<Thumbnail> {
    match self.client.get_thumbnails(dataset_id).await {
      Ok(thumbnails) => thumbnails,
      Err(e) => {
        debug!(dataset_id, error = %e, "thumbnails unavailable");
        Vec::new()
      }
    }
  }
}

/// Normalize a relation list, or absorb its failure as an empty list.
fn relation(id: &str, what: &str, result: ClientResult<Vec<Reference>>) -> Vec<Reference> {
  match result {
    Ok(refs) => normalize_references(refs),
    Err(e) => {
      debug!(id, relation = what, error = %e, "relation fetch failed");
      Vec::new()
    }
  }
}
