//! Remote resource API: the collaborator trait, its HTTP implementation and
//! the domain types it produces.

pub mod api_types;
mod client;
mod http;
pub mod types;

pub use client::{ClientError, ClientResult, ResourceClient};
pub use http::HttpResourceClient;
pub use types::{
  normalize_references, Dataset, Project, Reference, Resource, ResourceKind, Sample,
  ScientificMetadata, Thumbnail,
};
