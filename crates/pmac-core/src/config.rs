use crate::error::{PmacError, Result};
use crate::paths;
use crate::sync::issues::DEFAULT_ISSUE_LIMIT;
use crate::tracker::{ApiMode, TrackerConfig, DEFAULT_API_URL};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// TrackerSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerSettings {
    /// `owner/name`. Empty until set by `init --repo` or overridden.
    #[serde(default)]
    pub repo: String,
    #[serde(default)]
    pub mode: ApiMode,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_true")]
    pub verify_ssl: bool,
    /// Project board owner. Defaults to the repository owner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default = "default_issue_limit")]
    pub issue_limit: usize,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_issue_limit() -> usize {
    DEFAULT_ISSUE_LIMIT
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            repo: String::new(),
            mode: ApiMode::default(),
            api_url: default_api_url(),
            timeout_secs: default_timeout_secs(),
            verify_ssl: true,
            owner: None,
            issue_limit: default_issue_limit(),
        }
    }
}

// ---------------------------------------------------------------------------
// BoardSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Provision the standard custom fields on the board's project.
    #[serde(default)]
    pub fields: bool,
}

impl Default for BoardSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            fields: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub tracker: TrackerSettings,
    #[serde(default)]
    pub board: BoardSettings,
}

fn default_version() -> u32 {
    1
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(paths::DEFAULT_DATA_DIR)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            data_dir: default_data_dir(),
            tracker: TrackerSettings::default(),
            board: BoardSettings::default(),
        }
    }
}

impl Config {
    pub fn new(repo: impl Into<String>) -> Self {
        let mut cfg = Self::default();
        cfg.tracker.repo = repo.into();
        cfg
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(PmacError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    pub fn load_or_default(root: &Path) -> Result<Self> {
        match Self::load(root) {
            Err(PmacError::NotInitialized) => Ok(Self::default()),
            other => other,
        }
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn data_dir(&self, root: &Path) -> PathBuf {
        paths::data_dir(root, &self.data_dir)
    }

    /// Board owner: explicit `tracker.owner`, else the repository owner.
    pub fn owner(&self) -> &str {
        match &self.tracker.owner {
            Some(owner) if !owner.is_empty() => owner.as_str(),
            _ => self.tracker.repo.split('/').next().unwrap_or_default(),
        }
    }

    /// Backend configuration for [`crate::tracker::connect`]. The token is
    /// supplied by the caller and never stored in the file.
    pub fn tracker_config(&self, token: Option<String>) -> Result<TrackerConfig> {
        let settings = &self.tracker;
        if settings.repo.is_empty() {
            return Err(PmacError::InvalidConfig(
                "no repository configured: pass --repo or set tracker.repo".to_string(),
            ));
        }
        let mut config = TrackerConfig::new(&settings.repo, settings.mode).with_token(token);
        config.api_url = settings.api_url.clone();
        config.timeout_secs = settings.timeout_secs;
        config.verify_ssl = settings.verify_ssl;
        config.validate()?;
        Ok(config)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let tracker = &self.tracker;

        if tracker.repo.is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "tracker.repo is not set".to_string(),
            });
        } else {
            let parts: Vec<&str> = tracker.repo.split('/').collect();
            if parts.len() != 2 || parts.iter().any(|p| p.is_empty()) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!(
                        "tracker.repo '{}' must be in 'owner/name' form",
                        tracker.repo
                    ),
                });
            }
        }

        if tracker.timeout_secs == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "tracker.timeout_secs is 0; every request will time out".to_string(),
            });
        }

        if tracker.issue_limit == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "tracker.issue_limit is 0; existing issues will never be discovered"
                    .to_string(),
            });
        }

        if !tracker.verify_ssl {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "tracker.verify_ssl is disabled".to_string(),
            });
        }

        if self.board.fields && !self.board.enabled {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "board.fields has no effect while board.enabled is false".to_string(),
            });
        }

        warnings
    }
}
