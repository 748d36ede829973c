use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The two record kinds an identifier can resolve to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
  Sample,
  Dataset,
}

/// Minimal pointer to a related resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
  pub unique_id: String,
  pub name: String,
  pub label: Option<String>,
}

impl Reference {
  pub fn new(unique_id: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      unique_id: unique_id.into(),
      name: name.into(),
      label: None,
    }
  }

  pub fn with_label(mut self, label: impl Into<String>) -> Self {
    self.label = Some(label.into());
    self
  }
}

/// Deduplicate by `unique_id` and sort ascending by `unique_id`.
///
/// The first occurrence of a duplicated id wins.
pub fn normalize_references(mut refs: Vec<Reference>) -> Vec<Reference> {
  refs.sort_by(|a, b| a.unique_id.cmp(&b.unique_id));
  refs.dedup_by(|later, earlier| later.unique_id == earlier.unique_id);
  refs
}

/// Free-form scientific metadata block attached to a dataset
pub type ScientificMetadata = BTreeMap<String, serde_json::Value>;

/// Physical or logical sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
  pub unique_id: String,
  pub name: String,
  pub description: Option<String>,
  pub sample_type: Option<String>,
  pub owner: Option<String>,
  pub project_id: Option<String>,
  pub created_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub parent_samples: Vec<Reference>,
  #[serde(default)]
  pub child_samples: Vec<Reference>,
}

/// Measured or derived dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
  pub unique_id: String,
  pub name: String,
  pub description: Option<String>,
  pub measurement: Option<String>,
  pub instrument: Option<String>,
  pub owner: Option<String>,
  pub project_id: Option<String>,
  pub created_at: Option<DateTime<Utc>>,
  pub scientific_metadata: Option<ScientificMetadata>,
  #[serde(default)]
  pub parent_datasets: Vec<Reference>,
  #[serde(default)]
  pub child_datasets: Vec<Reference>,
  #[serde(default)]
  pub linked_samples: Vec<Reference>,
}

/// Immutable snapshot of a sample or dataset with its relations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Resource {
  Sample(Sample),
  Dataset(Dataset),
}

impl Resource {
  pub fn unique_id(&self) -> &str {
    match self {
      Resource::Sample(s) => &s.unique_id,
      Resource::Dataset(d) => &d.unique_id,
    }
  }

  pub fn name(&self) -> &str {
    match self {
      Resource::Sample(s) => &s.name,
      Resource::Dataset(d) => &d.name,
    }
  }

  pub fn description(&self) -> Option<&str> {
    match self {
      Resource::Sample(s) => s.description.as_deref(),
      Resource::Dataset(d) => d.description.as_deref(),
    }
  }

  pub fn kind(&self) -> ResourceKind {
    match self {
      Resource::Sample(_) => ResourceKind::Sample,
      Resource::Dataset(_) => ResourceKind::Dataset,
    }
  }

  /// Projection of this resource as a reference
  pub fn to_reference(&self) -> Reference {
    let label = match self {
      Resource::Sample(s) => s.sample_type.clone(),
      Resource::Dataset(d) => d.measurement.clone(),
    };
    Reference {
      unique_id: self.unique_id().to_string(),
      name: self.name().to_string(),
      label,
    }
  }

  /// All relation lists, labelled by section name
  pub fn relations(&self) -> Vec<(&'static str, &[Reference])> {
    match self {
      Resource::Sample(s) => vec![
        ("parent_samples", s.parent_samples.as_slice()),
        ("child_samples", s.child_samples.as_slice()),
      ],
      Resource::Dataset(d) => vec![
        ("parent_datasets", d.parent_datasets.as_slice()),
        ("child_datasets", d.child_datasets.as_slice()),
        ("linked_samples", d.linked_samples.as_slice()),
      ],
    }
  }

  /// Every referenced id across all relation lists, in no particular order
  pub fn referenced_ids(&self) -> impl Iterator<Item = &str> {
    let lists: Vec<&[Reference]> = match self {
      Resource::Sample(s) => vec![s.parent_samples.as_slice(), s.child_samples.as_slice()],
      Resource::Dataset(d) => vec![
        d.parent_datasets.as_slice(),
        d.child_datasets.as_slice(),
        d.linked_samples.as_slice(),
      ],
    };
    lists
      .into_iter()
      .flat_map(|list| list.iter().map(|r| r.unique_id.as_str()))
  }
}

/// Project containing samples and datasets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
  pub project_id: String,
  pub name: Option<String>,
  pub description: Option<String>,
  pub lead_email: Option<String>,
  pub created_at: Option<DateTime<Utc>>,
}

/// Base64-encoded image payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Thumbnail(pub String);

impl Thumbnail {
  pub fn as_base64(&self) -> &str {
    &self.0
  }
}
