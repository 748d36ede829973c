use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use labscan::api::HttpResourceClient;
use labscan::cache::{InMemoryCache, PersistentSummaryStore};
use labscan::config::Config;
use labscan::{ProjectService, ResourceController, ResourceRepository, UiState};

#[derive(Parser, Debug)]
#[command(name = "labscan")]
#[command(about = "Browse linked samples and datasets of a lab data server")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/labscan/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Show a sample or dataset with its relations
  Show { id: String },
  /// Drop the cached copy of a resource and fetch it again
  Refresh { id: String },
  /// List projects
  Projects {
    /// Reload everything and rewrite the persisted summaries
    #[arg(long)]
    refresh: bool,
  },
  /// Print persisted project summaries without touching the network
  Summaries,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let config = Config::load(args.config.as_deref())?;
  let _guard = labscan::logging::init(&config.cache_dir()?.join("logs"))?;

  let client = Arc::new(HttpResourceClient::new(&config)?);
  let cache = Arc::new(InMemoryCache::new());

  match args.command {
    Command::Show { id } => {
      let controller = ResourceController::new(ResourceRepository::new(client), cache);
      controller.fetch_by_identifier(&id).await;
      print_state(&controller.state())?;
    }
    Command::Refresh { id } => {
      let controller = ResourceController::new(ResourceRepository::new(client), cache);
      controller.refresh(&id).await;
      print_state(&controller.state())?;
    }
    Command::Projects { refresh } => {
      let store = PersistentSummaryStore::new(config.summary_path()?);
      let service = ProjectService::new(client, cache, store);
      if refresh {
        let summaries = service.refresh_all().await?;
        print_json(&summaries)?;
      } else {
        let projects = service.projects(false).await?;
        print_json(&projects)?;
      }
    }
    Command::Summaries => {
      let store = PersistentSummaryStore::new(config.summary_path()?);
      match store.load() {
        Some(summaries) => {
          if let Some(hours) = store.age_hours() {
            eprintln!("cached {}h ago", hours);
          }
          print_json(&summaries)?;
        }
        None => eprintln!("no cached summaries"),
      }
    }
  }

  Ok(())
}

fn print_state(state: &UiState) -> Result<()> {
  match state {
    UiState::Success {
      resource,
      thumbnails,
      ..
    } => {
      print_json(resource.as_ref())?;
      if !thumbnails.is_empty() {
        eprintln!("{} thumbnail(s)", thumbnails.len());
      }
      Ok(())
    }
    UiState::Error(message) => Err(eyre!("{}", message)),
    UiState::Idle | UiState::Loading => Err(eyre!("fetch did not complete")),
  }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}
