//! Configuration loading and management
//!
//! Handles parsing of `ocwatch.toml`. Every field has a default, so an absent
//! file is a valid configuration. Credentials never live here; they come from
//! the environment (`API_KEY`, `GITHUB_TOKEN`).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Default config file name, resolved against the working directory.
pub const CONFIG_FILE: &str = "ocwatch.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Faction API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Persistence backend configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Compliance scan tuning
    #[serde(default)]
    pub scan: ScanConfig,

    /// Run scheduling and exclusion
    #[serde(default)]
    pub run: RunConfig,

    /// Diagnostics sink
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

/// Faction API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,

    /// Faction whose member roster is polled; 0 uses the key's own faction
    #[serde(default = "default_faction_id")]
    pub faction_id: u64,

    /// Request comment shown in the API key's access log
    #[serde(default = "default_comment")]
    pub comment: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_base_url() -> String {
    "https://api.torn.com/v2".to_string()
}

fn default_faction_id() -> u64 {
    35840
}

fn default_comment() -> String {
    "AutoTurtle".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            faction_id: default_faction_id(),
            comment: default_comment(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Which document store backs the three databases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Local,
    Github,
}

/// Persistence configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: Backend,

    #[serde(default)]
    pub local: LocalStoreConfig,

    #[serde(default)]
    pub github: GithubStoreConfig,
}

/// File names for the three stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorePaths {
    pub users: String,
    pub crimes: String,
    pub naughty: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalStoreConfig {
    #[serde(default = "default_local_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_local_paths")]
    pub files: StorePaths,
}

fn default_local_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_local_paths() -> StorePaths {
    StorePaths {
        users: "local-oc-data.json".to_string(),
        crimes: "local-crimes-data.json".to_string(),
        naughty: "local-naughty-list.json".to_string(),
    }
}

impl Default for LocalStoreConfig {
    fn default() -> Self {
        Self {
            dir: default_local_dir(),
            files: default_local_paths(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubStoreConfig {
    #[serde(default = "default_github_api_url")]
    pub api_url: String,

    #[serde(default)]
    pub owner: String,

    #[serde(default)]
    pub repo: String,

    #[serde(default = "default_branch")]
    pub branch: String,

    #[serde(default = "default_github_paths")]
    pub paths: StorePaths,
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_github_paths() -> StorePaths {
    StorePaths {
        users: "BC_cron.JSON".to_string(),
        crimes: "BC_OC.JSON".to_string(),
        naughty: "BC_naughty.JSON".to_string(),
    }
}

impl Default for GithubStoreConfig {
    fn default() -> Self {
        Self {
            api_url: default_github_api_url(),
            owner: String::new(),
            repo: String::new(),
            branch: default_branch(),
            paths: default_github_paths(),
        }
    }
}

/// Compliance scan configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Minimum pending window (seconds) before a crime is scored
    #[serde(default = "default_min_window_secs")]
    pub min_window_secs: i64,

    /// Sampling step of the per-minute scan (seconds)
    #[serde(default = "default_step_secs")]
    pub step_secs: i64,
}

fn default_min_window_secs() -> i64 {
    300
}

fn default_step_secs() -> i64 {
    60
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            min_window_secs: default_min_window_secs(),
            step_secs: default_step_secs(),
        }
    }
}

/// Run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Upper bound of the randomized startup delay
    #[serde(default = "default_startup_jitter_ms")]
    pub startup_jitter_ms: u64,

    /// Minimum age of the crimes store before crimes and the naughty list
    /// are refreshed; 0 refreshes every run
    #[serde(default)]
    pub crime_refresh_secs: u64,

    /// Optional host-local lock file held for the duration of a run
    #[serde(default)]
    pub lock_file: Option<PathBuf>,
}

fn default_startup_jitter_ms() -> u64 {
    5000
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            startup_jitter_ms: default_startup_jitter_ms(),
            crime_refresh_secs: 0,
            lock_file: None,
        }
    }
}

/// Diagnostics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    /// Append-only error log; `None` disables the file sink
    #[serde(default = "default_error_log")]
    pub error_log: Option<PathBuf>,
}

fn default_error_log() -> Option<PathBuf> {
    Some(PathBuf::from("api_error_log.txt"))
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            error_log: default_error_log(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration if the file exists, or return defaults.
    ///
    /// Unlike a missing file, an unreadable or invalid one is an error: a
    /// batch job silently falling back to defaults would write to the wrong
    /// store.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(Error::InvalidConfig("api.base_url cannot be empty".to_string()));
        }
        if self.api.timeout_secs == 0 {
            return Err(Error::InvalidConfig("api.timeout_secs must be > 0".to_string()));
        }
        if self.scan.step_secs <= 0 {
            return Err(Error::InvalidConfig("scan.step_secs must be > 0".to_string()));
        }
        if self.scan.min_window_secs < 0 {
            return Err(Error::InvalidConfig(
                "scan.min_window_secs must be >= 0".to_string(),
            ));
        }
        validate_paths(&self.store.local.files, "store.local.files")?;
        validate_paths(&self.store.github.paths, "store.github.paths")?;
        if self.store.backend == Backend::Github {
            let github = &self.store.github;
            if github.owner.trim().is_empty() || github.repo.trim().is_empty() {
                return Err(Error::InvalidConfig(
                    "store.github.owner and store.github.repo are required for the github backend"
                        .to_string(),
                ));
            }
            if github.branch.trim().is_empty() {
                return Err(Error::InvalidConfig(
                    "store.github.branch cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

fn validate_paths(paths: &StorePaths, field: &str) -> Result<()> {
    let entries = [
        ("users", &paths.users),
        ("crimes", &paths.crimes),
        ("naughty", &paths.naughty),
    ];
    for (name, value) in entries {
        if value.trim().is_empty() {
            return Err(Error::InvalidConfig(format!("{field}.{name} cannot be empty")));
        }
    }
    if paths.users == paths.crimes || paths.users == paths.naughty || paths.crimes == paths.naughty
    {
        return Err(Error::InvalidConfig(format!(
            "{field}: each store needs its own file"
        )));
    }
    Ok(())
}
