//! Disk-backed store of per-project summaries for cold-start display.
//!
//! Everything here is best effort: a failed read behaves like an empty store
//! and a failed write is dropped. Callers serialize their own refresh flows,
//! so at most one writer is assumed and no lock is taken.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::api::{Dataset, Project, Sample};

/// How long persisted summaries stay usable
pub const SUMMARY_TTL_HOURS: i64 = 24;

/// Lightweight aggregate of one project and its collections
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
  pub project_id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub project_name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub project_lead_email: Option<String>,
  #[serde(
    default,
    with = "chrono::serde::ts_milliseconds_option",
    skip_serializing_if = "Option::is_none"
  )]
  pub created_at: Option<DateTime<Utc>>,
  pub sample_count: usize,
  pub dataset_count: usize,
  /// Distinct, sorted
  pub sample_types: Vec<String>,
  /// Distinct, sorted
  pub measurements: Vec<String>,
  #[serde(with = "chrono::serde::ts_milliseconds")]
  pub last_updated: DateTime<Utc>,
}

impl ProjectSummary {
  pub fn compute(
    project: &Project,
    samples: &[Sample],
    datasets: &[Dataset],
    now: DateTime<Utc>,
  ) -> Self {
    Self {
      project_id: project.project_id.clone(),
      project_name: project.name.clone(),
      description: project.description.clone(),
      project_lead_email: project.lead_email.clone(),
      created_at: project.created_at,
      sample_count: samples.len(),
      dataset_count: datasets.len(),
      sample_types: distinct_sorted(samples.iter().map(|s| s.sample_type.as_deref())),
      measurements: distinct_sorted(datasets.iter().map(|d| d.measurement.as_deref())),
      last_updated: now,
    }
  }
}

fn distinct_sorted<'a>(values: impl Iterator<Item = Option<&'a str>>) -> Vec<String> {
  values
    .flatten()
    .map(str::trim)
    .filter(|v| !v.is_empty())
    .map(String::from)
    .collect::<BTreeSet<_>>()
    .into_iter()
    .collect()
}

/// One summary per project, in project order. Projects missing from the maps
/// are summarized as empty.
pub fn summarize(
  projects: &[Project],
  samples_by_project: &HashMap<String, Vec<Sample>>,
  datasets_by_project: &HashMap<String, Vec<Dataset>>,
  now: DateTime<Utc>,
) -> Vec<ProjectSummary> {
  projects
    .iter()
    .map(|project| {
      let samples = samples_by_project
        .get(&project.project_id)
        .map(Vec::as_slice)
        .unwrap_or_default();
      let datasets = datasets_by_project
        .get(&project.project_id)
        .map(Vec::as_slice)
        .unwrap_or_default();
      ProjectSummary::compute(project, samples, datasets, now)
    })
    .collect()
}

/// On-disk document
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryDocument {
  summaries: Vec<ProjectSummary>,
  #[serde(with = "chrono::serde::ts_milliseconds")]
  cached_at: DateTime<Utc>,
}

/// JSON file holding the latest batch of project summaries
#[derive(Debug, Clone)]
pub struct PersistentSummaryStore {
  path: PathBuf,
}

impl PersistentSummaryStore {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Compute and persist one summary per project. Failures are swallowed.
  pub fn save(
    &self,
    projects: &[Project],
    samples_by_project: &HashMap<String, Vec<Sample>>,
    datasets_by_project: &HashMap<String, Vec<Dataset>>,
  ) {
    self.save_at(
      projects,
      samples_by_project,
      datasets_by_project,
      Utc::now().trunc_subsecs(3),
    );
  }

  pub(crate) fn save_at(
    &self,
    projects: &[Project],
    samples_by_project: &HashMap<String, Vec<Sample>>,
    datasets_by_project: &HashMap<String, Vec<Dataset>>,
    now: DateTime<Utc>,
  ) {
    let summaries = summarize(projects, samples_by_project, datasets_by_project, now);
    self.save_summaries(summaries, now);
  }

  /// Persist already computed summaries as one batch. Failures are swallowed.
  pub fn save_summaries(&self, summaries: Vec<ProjectSummary>, cached_at: DateTime<Utc>) {
    let document = SummaryDocument {
      summaries,
      cached_at,
    };
    let _ = self.write(&document);
  }

  fn write(&self, document: &SummaryDocument) -> std::io::Result<()> {
    let data = serde_json::to_vec(document)?;
    if let Some(parent) = self.path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    // Readers never see a half-written file
    let tmp = self.path.with_extension("json.tmp");
    let result = std::fs::write(&tmp, data).and_then(|_| std::fs::rename(&tmp, &self.path));
    if result.is_err() {
      let _ = std::fs::remove_file(&tmp);
    }
    result
  }

  fn read(&self) -> Option<SummaryDocument> {
    let data = std::fs::read(&self.path).ok()?;
    serde_json::from_slice(&data).ok()
  }

  /// Summaries if present and younger than the TTL.
  ///
  /// A stale file is deleted as a side effect.
  pub fn load(&self) -> Option<Vec<ProjectSummary>> {
    let document = self.read()?;
    if Utc::now() - document.cached_at > Duration::hours(SUMMARY_TTL_HOURS) {
      self.clear();
      return None;
    }
    Some(document.summaries)
  }

  pub fn clear(&self) {
    let _ = std::fs::remove_file(&self.path);
  }

  /// Whole hours since the batch was written.
  pub fn age_hours(&self) -> Option<i64> {
    self
      .read()
      .map(|document| (Utc::now() - document.cached_at).num_hours())
  }
}
