//! Observable state of the resource screen.

use std::sync::Arc;

use crate::api::{Resource, Thumbnail};

/// The state published by [`crate::controller::ResourceController`]
#[derive(Debug, Clone, PartialEq, Default)]
pub enum UiState {
  /// Nothing requested yet
  #[default]
  Idle,
  /// Fetching with nothing to show
  Loading,
  /// A resource is on screen; `is_refreshing` while a newer fetch is in flight
  Success {
    resource: Arc<Resource>,
    thumbnails: Vec<Thumbnail>,
    is_refreshing: bool,
  },
  /// The last fetch failed
  Error(String),
}

impl UiState {
  pub fn is_loading(&self) -> bool {
    matches!(self, UiState::Loading)
  }

  pub fn is_success(&self) -> bool {
    matches!(self, UiState::Success { .. })
  }

  pub fn is_error(&self) -> bool {
    matches!(self, UiState::Error(_))
  }

  pub fn is_refreshing(&self) -> bool {
    matches!(
      self,
      UiState::Success {
        is_refreshing: true,
        ..
      }
    )
  }

  pub fn resource(&self) -> Option<&Arc<Resource>> {
    match self {
      UiState::Success { resource, .. } => Some(resource),
      _ => None,
    }
  }

  pub fn thumbnails(&self) -> &[Thumbnail] {
    match self {
      UiState::Success { thumbnails, .. } => thumbnails,
      _ => &[],
    }
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      UiState::Error(e) => Some(e),
      _ => None,
    }
  }

  /// The same payload marked as refreshing, if this is a success.
  pub fn refreshing(&self) -> Option<UiState> {
    match self {
      UiState::Success {
        resource,
        thumbnails,
        ..
      } => Some(UiState::Success {
        resource: Arc::clone(resource),
        thumbnails: thumbnails.clone(),
        is_refreshing: true,
      }),
      _ => None,
    }
  }
}
