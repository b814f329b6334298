use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  pub base_url: String,
  /// URL template for a single event; `:id` is substituted
  #[serde(default = "default_event_path")]
  pub event_path: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// When false, nothing is cached and fallback always finds nothing
  #[serde(default = "default_true")]
  pub enabled: bool,
  #[serde(default = "default_namespace")]
  pub namespace: String,
  /// Validity window of written records
  #[serde(default = "default_max_age_secs")]
  pub max_age_secs: u64,
  /// Override for the cache directory (defaults to the platform cache dir)
  pub dir: Option<PathBuf>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      namespace: default_namespace(),
      max_age_secs: default_max_age_secs(),
      dir: None,
    }
  }
}

fn default_event_path() -> String {
  "/events/:id".to_string()
}

fn default_timeout_secs() -> u64 {
  10
}

fn default_true() -> bool {
  true
}

fn default_namespace() -> String {
  "events".to_string()
}

fn default_max_age_secs() -> u64 {
  24 * 60 * 60
}

/// Longest validity window honoured, roughly a century.
const MAX_AGE_CAP_SECS: u64 = 100 * 365 * 24 * 60 * 60;

impl ApiConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

impl CacheConfig {
  pub fn max_age(&self) -> chrono::Duration {
    chrono::Duration::seconds(self.max_age_secs.min(MAX_AGE_CAP_SECS) as i64)
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./huddle.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/huddle/config.yaml
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
        "No configuration file found. Create one at ~/.config/huddle/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("huddle.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("huddle").join("config.yaml");
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

  /// Parse configuration from YAML text.
  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  /// Get the API token from environment variables.
  ///
  /// Checks HUDDLE_API_TOKEN first, then API_TOKEN as fallback. A missing
  /// token is not an error; requests are then sent unauthenticated.
  pub fn get_api_token() -> Option<String> {
    std::env::var("HUDDLE_API_TOKEN")
      .or_else(|_| std::env::var("API_TOKEN"))
      .ok()
      .filter(|t| !t.trim().is_empty())
  }
}
