use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub server: ServerConfig,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  /// Base URL of the remote API, e.g. "https://lims.example.org/api/v1"
  pub url: String,
  /// Per-request timeout enforced by the HTTP client
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
  30
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfig {
  /// Directory for persisted project summaries (defaults to the user cache dir)
  pub dir: Option<PathBuf>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./labscan.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/labscan/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/labscan/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("labscan.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("labscan").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    if config.server.url.trim().is_empty() {
      return Err(eyre!("server.url must not be empty"));
    }
    Ok(config)
  }

  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.server.timeout_secs)
  }

  /// Get the API key from environment variables.
  ///
  /// Checks LABSCAN_API_KEY first, then LABSCAN_TOKEN as fallback.
  pub fn get_api_key() -> Result<String> {
    std::env::var("LABSCAN_API_KEY")
      .or_else(|_| std::env::var("LABSCAN_TOKEN"))
      .map_err(|_| {
        eyre!("API key not found. Set LABSCAN_API_KEY or LABSCAN_TOKEN environment variable.")
      })
  }

  /// Directory holding persisted summaries and log files.
  pub fn cache_dir(&self) -> Result<PathBuf> {
    if let Some(dir) = &self.cache.dir {
      return Ok(dir.clone());
    }
    let base = dirs::cache_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".cache")))
      .ok_or_else(|| eyre!("Could not determine cache directory"))?;
    Ok(base.join("labscan"))
  }

  /// Summary file path, unique per server so two servers never share summaries.
  pub fn summary_path(&self) -> Result<PathBuf> {
    Ok(
      self
        .cache_dir()?
        .join(format!("summaries-{}.json", server_fingerprint(&self.server.url))),
    )
  }
}

/// Short stable hash of a server URL.
fn server_fingerprint(url: &str) -> String {
  let normalized = url.trim().trim_end_matches('/').to_lowercase();
  let mut hasher = Sha256::new();
  hasher.update(normalized.as_bytes());
  let digest = hex::encode(hasher.finalize());
  digest[..16].to_string()
}
