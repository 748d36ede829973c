use thiserror::Error;

use crate::api::ClientError;

/// Failure of a foreground resource fetch.
///
/// Sub-fetch failures (relations, thumbnails, prefetch) are absorbed and never
/// produce one of these.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResourceError {
  #[error("no sample or dataset found for '{0}'")]
  NotFound(String),

  #[error("{0}")]
  Transport(String),
}

impl ResourceError {
  /// Map a client failure for `id` into the resource error taxonomy.
  pub fn from_client(id: &str, err: ClientError) -> Self {
    match err {
      ClientError::NotFound(_) => ResourceError::NotFound(id.to_string()),
      other => ResourceError::Transport(other.to_string()),
    }
  }
}
