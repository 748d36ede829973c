//! Cache, prefetch and fetch orchestration for browsing linked samples and
//! datasets served by a slow remote API.

pub mod api;
pub mod cache;
pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod projects;
pub mod repository;
pub mod state;

#[cfg(test)]
mod testing;

pub use controller::{ResourceController, SiblingDirection};
pub use error::ResourceError;
pub use projects::ProjectService;
pub use repository::ResourceRepository;
pub use state::UiState;
