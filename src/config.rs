use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

/// Environment variable that supplies (or overrides) `api.base_url`
pub const BASE_URL_ENV: &str = "OFFICESHIFT_BE_URL";

/// Page sizes offered by the table views
pub const PAGE_SIZES: &[usize] = &[10, 20, 30, 40, 50];

const APP_DIR: &str = "officeshift";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  /// Custom title for header (defaults to the backend host if not set)
  pub title: Option<String>,
  #[serde(default = "default_page_size")]
  pub page_size: usize,
  #[serde(default)]
  pub login: LoginConfig,
  /// Log file path (defaults to $XDG_DATA_HOME/officeshift/officeshift.log)
  pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiConfig {
  #[serde(default)]
  pub base_url: String,
  /// Per-request timeout; none by default
  pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginConfig {
  /// Prefills the login form
  pub email: Option<String>,
}

fn default_page_size() -> usize {
  PAGE_SIZES[0]
}

impl Default for Config {
  fn default() -> Self {
    Self {
      api: ApiConfig::default(),
      title: None,
      page_size: default_page_size(),
      login: LoginConfig::default(),
      log_file: None,
    }
  }
}

impl Config {
  /// Load configuration from file and environment.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./officeshift.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/officeshift/config.yaml
  ///
  /// Without a file, everything is defaulted and `OFFICESHIFT_BE_URL` must
  /// provide the backend URL. Call `validated` once command line overrides
  /// are applied.
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

    let config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };

    Ok(config.with_base_url_override(std::env::var(BASE_URL_ENV).ok()))
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("officeshift.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join(APP_DIR).join("config.yaml");
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

  fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
    // An empty file deserializes to unit, not an empty map
    if contents.trim().is_empty() {
      return Ok(Config::default());
    }
    serde_yaml::from_str(contents)
  }

  /// Replace the backend URL when `base_url` is set and non-blank.
  pub fn with_base_url_override(mut self, base_url: Option<String>) -> Self {
    if let Some(url) = base_url.filter(|u| !u.trim().is_empty()) {
      self.api.base_url = url.trim().to_string();
    }
    self
  }

  pub fn validated(self) -> Result<Self> {
    if self.api.base_url.trim().is_empty() {
      return Err(eyre!(
        "No backend URL configured. Set {} or api.base_url in ~/.config/{}/config.yaml",
        BASE_URL_ENV,
        APP_DIR
      ));
    }

    let url = Url::parse(&self.api.base_url)
      .map_err(|e| eyre!("Invalid backend URL {}: {}", self.api.base_url, e))?;
    if !matches!(url.scheme(), "http" | "https") {
      return Err(eyre!(
        "Backend URL must use http or https: {}",
        self.api.base_url
      ));
    }

    if !PAGE_SIZES.contains(&self.page_size) {
      return Err(eyre!(
        "page_size must be one of {:?}, got {}",
        PAGE_SIZES,
        self.page_size
      ));
    }

    Ok(self)
  }

  /// Header title: configured title, else the backend host.
  pub fn display_title(&self) -> String {
    if let Some(title) = &self.title {
      return title.clone();
    }
    Url::parse(&self.api.base_url)
      .ok()
      .and_then(|u| u.host_str().map(String::from))
      .unwrap_or_else(|| "officeshift".to_string())
  }

  pub fn log_path(&self) -> PathBuf {
    if let Some(path) = &self.log_file {
      return path.clone();
    }
    dirs::data_dir()
      .unwrap_or_else(std::env::temp_dir)
      .join(APP_DIR)
      .join("officeshift.log")
  }
}
