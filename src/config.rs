//! Configuration management.
//!
//! `Settings` holds resolved runtime values. `Config` is the file shape,
//! every field optional, layered onto the defaults by
//! [`load_settings_with_options`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scrapers::{builtin_sites, SiteConfig, SiteProfile};

/// Config file stem searched for in the working directory.
const CONFIG_STEM: &str = "flyerscout";
/// Extensions tried, in order, during discovery.
const CONFIG_EXTENSIONS: &[&str] = &["toml", "json", "yaml", "yml"];

/// Default catalog API prefix.
pub const DEFAULT_CATALOG_URL: &str = "http://localhost:5000/api";

/// Environment override for the catalog API prefix.
pub const ENV_CATALOG_URL: &str = "FLYERSCOUT_CATALOG_URL";
/// Environment override for the data directory.
pub const ENV_DATA_DIR: &str = "FLYERSCOUT_DATA_DIR";

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("unknown site '{0}' (see `flyerscout sites`)")]
    UnknownSite(String),
}

/// What to do with a candidate whose payload is not a PDF.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotAPdfPolicy {
    /// Count it as skipped.
    #[default]
    Skip,
    /// Count it as an error.
    Error,
}

/// Classification and fallback rules applied by the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub not_a_pdf: NotAPdfPolicy,
    /// Capcode used when a site has none, instead of sampling a city.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_cap: Option<String>,
}

/// Request timeouts, in seconds in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub page: Duration,
    pub api: Duration,
    pub download: Duration,
    pub upload: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            page: Duration::from_secs(20),
            api: Duration::from_secs(5),
            download: Duration::from_secs(60),
            upload: Duration::from_secs(60),
        }
    }
}

/// Timeout overrides as written in the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_secs: Option<u64>,
}

impl TimeoutsConfig {
    fn apply(&self, timeouts: &mut Timeouts) {
        if let Some(s) = self.page_secs {
            timeouts.page = Duration::from_secs(s);
        }
        if let Some(s) = self.api_secs {
            timeouts.api = Duration::from_secs(s);
        }
        if let Some(s) = self.download_secs {
            timeouts.download = Duration::from_secs(s);
        }
        if let Some(s) = self.upload_secs {
            timeouts.upload = Duration::from_secs(s);
        }
    }
}

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory; each site writes to `{data_dir}/{site_id}`.
    pub data_dir: PathBuf,
    /// Catalog API prefix, e.g. `http://localhost:5000/api`.
    pub catalog_url: String,
    /// Default user agent for sites without their own (None = built-in).
    pub user_agent: Option<String>,
    pub timeouts: Timeouts,
    /// Minimum interval between requests to one host.
    pub request_delay: Duration,
    /// Secondary pages followed per seed.
    pub max_secondary_pages: usize,
    pub policy: PolicyConfig,
    /// Probe the catalog before discovery when uploading.
    pub health_check: bool,
}

impl Default for Settings {
    fn default() -> Self {
        // Documents dir -> Home dir -> Current dir
        let data_dir = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("flyerscout");

        Self {
            data_dir,
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            user_agent: None,
            timeouts: Timeouts::default(),
            request_delay: Duration::from_millis(1500),
            max_secondary_pages: crate::scrapers::extract::DEFAULT_MAX_SECONDARY_PAGES,
            policy: PolicyConfig::default(),
            health_check: true,
        }
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            ..Default::default()
        }
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_secondary_pages: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<PolicyConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check: Option<bool>,
    /// Site tables; an id matching a built-in site replaces it.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sites: BTreeMap<String, SiteConfig>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Look for `flyerscout.{toml,json,yaml,yml}` in `dir`.
    pub fn find_config_file(dir: &Path) -> Option<PathBuf> {
        CONFIG_EXTENSIONS
            .iter()
            .map(|ext| dir.join(format!("{}.{}", CONFIG_STEM, ext)))
            .find(|p| p.is_file())
    }

    /// Config file found by `prefer` in the standard locations.
    pub async fn discover() -> Option<PathBuf> {
        match prefer::load(CONFIG_STEM).await {
            Ok(found) => found.source_path().map(|p| p.to_path_buf()),
            Err(_) => None,
        }
    }

    /// Load configuration from a specific file path.
    /// The parser is picked by file extension; unknown extensions are read as JSON.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let mut config = Self::parse(path, &contents)?;
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    fn parse(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let parsed = match ext {
            "toml" => toml::from_str(contents).map_err(|e| e.to_string()),
            "yaml" | "yml" => serde_yaml::from_str(contents).map_err(|e| e.to_string()),
            _ => serde_json::from_str(contents).map_err(|e| e.to_string()),
        };
        parsed.map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved against `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            settings.data_dir = self.resolve_path(data_dir, base_dir);
        }
        if let Some(ref url) = self.catalog_url {
            settings.catalog_url = url.clone();
        }
        if let Some(ref user_agent) = self.user_agent {
            settings.user_agent = Some(user_agent.clone());
        }
        self.timeouts.apply(&mut settings.timeouts);
        if let Some(delay) = self.request_delay_ms {
            settings.request_delay = Duration::from_millis(delay);
        }
        if let Some(max) = self.max_secondary_pages {
            settings.max_secondary_pages = max;
        }
        if let Some(ref policy) = self.policy {
            settings.policy = policy.clone();
        }
        if let Some(check) = self.health_check {
            settings.health_check = check;
        }
    }

    /// Built-in sites merged with the configured ones, as raw tables.
    pub fn site_configs(&self) -> BTreeMap<String, SiteConfig> {
        let mut sites = builtin_sites();
        for (id, site) in &self.sites {
            if sites.insert(id.clone(), site.clone()).is_some() {
                tracing::debug!("Config replaces built-in site '{}'", id);
            }
        }
        sites
    }

    /// Every site resolved into a profile, sorted by id.
    pub fn site_profiles(&self, settings: &Settings) -> Result<Vec<SiteProfile>, ConfigError> {
        self.site_configs()
            .into_iter()
            .map(|(id, site)| site.into_profile(&id, settings))
            .collect()
    }

    /// One site resolved into a profile.
    pub fn site_profile(&self, id: &str, settings: &Settings) -> Result<SiteProfile, ConfigError> {
        let site = self
            .site_configs()
            .remove(id)
            .ok_or_else(|| ConfigError::UnknownSite(id.to_string()))?;
        site.into_profile(id, settings)
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides discovery).
    pub config_path: Option<PathBuf>,
    /// Data directory (--data-dir flag).
    pub data_dir: Option<PathBuf>,
    /// Catalog API prefix (--catalog-url flag).
    pub catalog_url: Option<String>,
}

fn env_override(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

/// Load settings with explicit options.
///
/// Precedence, lowest first: defaults, config file, environment, flags.
/// An explicit config path that cannot be loaded is an error; a missing
/// discovered file just means defaults.
pub async fn load_settings_with_options(
    options: LoadOptions,
) -> Result<(Settings, Config), ConfigError> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    let config = match locate_config(&options, &cwd, Config::discover()).await {
        Some(path) => {
            tracing::debug!("Loading config from {}", path.display());
            Config::load_from_path(&path).await?
        }
        None => Config::default(),
    };

    let mut settings = Settings::default();
    let base_dir = config.base_dir().unwrap_or_else(|| cwd.clone());
    config.apply_to_settings(&mut settings, &base_dir);

    if let Some(url) = env_override(ENV_CATALOG_URL) {
        tracing::debug!("Using {} from environment: {}", ENV_CATALOG_URL, url);
        settings.catalog_url = url;
    }
    if let Some(dir) = env_override(ENV_DATA_DIR) {
        tracing::debug!("Using {} from environment: {}", ENV_DATA_DIR, dir);
        settings.data_dir = config.resolve_path(&dir, &cwd);
    }

    if let Some(url) = options.catalog_url {
        settings.catalog_url = url;
    }
    if let Some(dir) = options.data_dir {
        settings.data_dir = config.resolve_path(&dir.to_string_lossy(), &cwd);
    }

    validate_catalog_url(&settings.catalog_url)?;
    Ok((settings, config))
}

/// Pick the config file: `--config`, then the working directory, then
/// whatever `discover` finds in the standard locations.
async fn locate_config<D>(options: &LoadOptions, cwd: &Path, discover: D) -> Option<PathBuf>
where
    D: std::future::Future<Output = Option<PathBuf>>,
{
    if let Some(ref path) = options.config_path {
        return Some(path.clone());
    }
    if let Some(path) = Config::find_config_file(cwd) {
        return Some(path);
    }
    discover.await
}

fn validate_catalog_url(raw: &str) -> Result<(), ConfigError> {
    match url::Url::parse(raw) {
        Ok(u) if matches!(u.scheme(), "http" | "https") => Ok(()),
        Ok(u) => Err(ConfigError::Invalid(format!(
            "catalog URL must be http or https, got {}",
            u.scheme()
        ))),
        Err(e) => Err(ConfigError::Invalid(format!(
            "catalog URL '{}' is not a URL: {}",
            raw, e
        ))),
    }
}
