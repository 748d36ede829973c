//! Serde-deserializable types matching the remote API responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::types::{Dataset, Project, Reference, ResourceKind, Sample, ScientificMetadata};

// ============================================================================
// Type discovery
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiTypeResponse {
  #[serde(rename = "type")]
  pub kind: String,
}

impl ApiTypeResponse {
  pub fn kind(&self) -> Option<ResourceKind> {
    match self.kind.trim().to_lowercase().as_str() {
      "sample" | "samples" => Some(ResourceKind::Sample),
      "dataset" | "datasets" => Some(ResourceKind::Dataset),
      _ => None,
    }
  }
}

// ============================================================================
// Records
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiReference {
  pub unique_id: String,
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub label: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSample {
  pub unique_id: String,
  #[serde(default)]
  pub name: Option<String>,
  pub description: Option<String>,
  pub sample_type: Option<String>,
  pub owner: Option<String>,
  pub project_id: Option<String>,
  pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiDataset {
  pub unique_id: String,
  #[serde(default)]
  pub name: Option<String>,
  pub description: Option<String>,
  pub measurement: Option<String>,
  pub instrument: Option<String>,
  pub owner: Option<String>,
  pub project_id: Option<String>,
  pub created_at: Option<DateTime<Utc>>,
  // Only present when the listing was requested with metadata
  pub scientific_metadata: Option<ScientificMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiProject {
  pub project_id: String,
  pub name: Option<String>,
  pub description: Option<String>,
  pub project_lead_email: Option<String>,
  pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ApiThumbnail {
  /// Base64 payload, optionally prefixed with a data URI header
  pub image: String,
}

// ============================================================================
// Conversions to domain types
// ============================================================================

impl From<ApiReference> for Reference {
  fn from(r: ApiReference) -> Self {
    Reference {
      name: r.name.unwrap_or_else(|| r.unique_id.clone()),
      unique_id: r.unique_id,
      label: r.label,
    }
  }
}

impl From<ApiSample> for Sample {
  fn from(s: ApiSample) -> Self {
    Sample {
      name: s.name.unwrap_or_else(|| s.unique_id.clone()),
      unique_id: s.unique_id,
      description: s.description,
      sample_type: s.sample_type,
      owner: s.owner,
      project_id: s.project_id,
      created_at: s.created_at,
      parent_samples: Vec::new(),
      child_samples: Vec::new(),
    }
  }
}

impl From<ApiDataset> for Dataset {
  fn from(d: ApiDataset) -> Self {
    Dataset {
      name: d.name.unwrap_or_else(|| d.unique_id.clone()),
      unique_id: d.unique_id,
      description: d.description,
      measurement: d.measurement,
      instrument: d.instrument,
      owner: d.owner,
      project_id: d.project_id,
      created_at: d.created_at,
      scientific_metadata: d.scientific_metadata,
      parent_datasets: Vec::new(),
      child_datasets: Vec::new(),
      linked_samples: Vec::new(),
    }
  }
}

impl From<ApiProject> for Project {
  fn from(p: ApiProject) -> Self {
    Project {
      project_id: p.project_id,
      name: p.name,
      description: p.description,
      lead_email: p.project_lead_email,
      created_at: p.created_at,
    }
  }
}

/// Strip a `data:image/...;base64,` prefix if the server sent one
pub fn strip_data_uri(image: &str) -> &str {
  match image.split_once(";base64,") {
    Some((header, payload)) if header.starts_with("data:") => payload,
    _ => image,
  }
}
