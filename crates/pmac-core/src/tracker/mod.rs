//! The issue tracker as seen by the reconcilers.
//!
//! [`Tracker`] is the only surface the sync engine touches. Two backends
//! implement it: [`gh::GhCliTracker`] drives an authenticated `gh` binary and
//! [`rest::RestTracker`] talks to the REST and GraphQL endpoints with a
//! bearer token. [`connect`] picks one from a [`TrackerConfig`] and verifies
//! credentials before handing it out.

pub mod gh;
pub mod rest;

#[cfg(test)]
pub mod fake;

use crate::error::{PmacError, TrackerError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type Result<T> = std::result::Result<T, TrackerError>;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
}

impl IssueState {
    /// Accepts both REST (`open`) and gh (`OPEN`) spellings.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "open" => Some(IssueState::Open),
            "closed" => Some(IssueState::Closed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueStateFilter {
    Open,
    Closed,
    All,
}

impl IssueStateFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueStateFilter::Open => "open",
            IssueStateFilter::Closed => "closed",
            IssueStateFilter::All => "all",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub labels: Vec<String>,
    pub state: IssueState,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Issue {
    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|l| l == name)
    }
}

/// Payload for [`Tracker::create_issue`].
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct NewIssue {
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub assignees: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestone: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSpec {
    pub name: String,
    /// Hex colour without the leading `#`.
    pub color: String,
    pub description: String,
}

impl LabelSpec {
    pub fn new(
        name: impl Into<String>,
        color: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub description: String,
}

impl From<&LabelSpec> for Label {
    fn from(spec: &LabelSpec) -> Self {
        Label {
            name: spec.name.clone(),
            color: spec.color.clone(),
            description: spec.description.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub number: u64,
    pub title: String,
    pub owner: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoInfo {
    pub name: String,
    pub owner: String,
    #[serde(default)]
    pub description: Option<String>,
    pub url: String,
    pub private: bool,
    #[serde(default)]
    pub default_branch: Option<String>,
}

/// Custom field on a project board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Number,
    SingleSelect { options: Vec<SelectOption> },
}

impl FieldKind {
    /// GraphQL `ProjectV2CustomFieldType` name.
    pub fn data_type(&self) -> &'static str {
        match self {
            FieldKind::Text => "TEXT",
            FieldKind::Number => "NUMBER",
            FieldKind::SingleSelect { .. } => "SINGLE_SELECT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub name: String,
    pub description: String,
    /// GraphQL `ProjectV2SingleSelectFieldOptionColor`, e.g. `GRAY`.
    pub color: String,
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

/// Capabilities the reconcilers need from an issue tracker.
///
/// Calls are blocking round trips. Implementations report "label already
/// exists" as [`TrackerError::AlreadyExists`] so callers can fall back to an
/// update.
pub trait Tracker {
    fn check_auth(&self) -> Result<()>;

    fn repo_info(&self) -> Result<RepoInfo>;

    fn list_issues(&self, state: IssueStateFilter, limit: usize) -> Result<Vec<Issue>>;

    fn create_issue(&self, issue: &NewIssue) -> Result<Issue>;

    fn get_issue(&self, number: u64) -> Result<Issue>;

    fn create_label(&self, label: &LabelSpec) -> Result<Label>;

    fn update_label(&self, label: &LabelSpec) -> Result<Label>;

    fn list_projects(&self, owner: &str) -> Result<Vec<Project>>;

    fn create_project(&self, title: &str, owner: &str) -> Result<Project>;

    fn add_issue_to_project(&self, project: u64, issue: u64, owner: &str) -> Result<bool>;

    fn list_project_fields(&self, project: u64, owner: &str) -> Result<Vec<String>>;

    fn create_project_field(&self, project: u64, owner: &str, field: &FieldSpec) -> Result<()>;
}

// ---------------------------------------------------------------------------
// TrackerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiMode {
    #[default]
    Cli,
    Rest,
}

impl fmt::Display for ApiMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiMode::Cli => f.write_str("cli"),
            ApiMode::Rest => f.write_str("rest"),
        }
    }
}

impl std::str::FromStr for ApiMode {
    type Err = PmacError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "cli" | "gh" => Ok(ApiMode::Cli),
            "rest" | "api" => Ok(ApiMode::Rest),
            other => Err(PmacError::InvalidConfig(format!(
                "unknown tracker mode '{other}' (expected 'cli' or 'rest')"
            ))),
        }
    }
}

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Everything a backend needs, resolved up front. Backends never read the
/// environment themselves.
#[derive(Clone)]
pub struct TrackerConfig {
    /// `owner/name`.
    pub repo: String,
    pub token: Option<String>,
    pub api_url: String,
    pub mode: ApiMode,
    pub timeout_secs: u64,
    pub verify_ssl: bool,
}

impl fmt::Debug for TrackerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackerConfig")
            .field("repo", &self.repo)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("api_url", &self.api_url)
            .field("mode", &self.mode)
            .field("timeout_secs", &self.timeout_secs)
            .field("verify_ssl", &self.verify_ssl)
            .finish()
    }
}

impl TrackerConfig {
    pub fn new(repo: impl Into<String>, mode: ApiMode) -> Self {
        Self {
            repo: repo.into(),
            token: None,
            api_url: DEFAULT_API_URL.to_string(),
            mode,
            timeout_secs: 30,
            verify_ssl: true,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        let Some((owner, name)) = self.repo.split_once('/') else {
            return Err(PmacError::InvalidConfig(format!(
                "invalid repository '{}': expected 'owner/repo'",
                self.repo
            )));
        };
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return Err(PmacError::InvalidConfig(format!(
                "invalid repository '{}': expected 'owner/repo'",
                self.repo
            )));
        }
        if self.mode == ApiMode::Rest && self.token.is_none() {
            return Err(PmacError::InvalidConfig(
                "a GitHub token is required for rest mode".to_string(),
            ));
        }
        Ok(())
    }

    /// Owner half of `owner/name`; the default owner for projects.
    pub fn owner(&self) -> &str {
        self.repo.split('/').next().unwrap_or_default()
    }

    pub fn repo_name(&self) -> &str {
        self.repo.split('/').nth(1).unwrap_or_default()
    }
}

/// Build the backend selected by `config.mode` and verify it is
/// authenticated. Auth failure comes back as [`TrackerError::Auth`].
pub fn connect(config: TrackerConfig) -> crate::error::Result<Box<dyn Tracker>> {
    config.validate()?;
    let mode = config.mode;
    let tracker: Box<dyn Tracker> = match mode {
        ApiMode::Cli => Box::new(gh::GhCliTracker::new(config)?),
        ApiMode::Rest => Box::new(rest::RestTracker::new(config)?),
    };
    tracker.check_auth().map_err(|e| match e {
        TrackerError::Auth(_) => e,
        other => TrackerError::Auth(other.to_string()),
    })?;
    tracing::info!(%mode, "authenticated with GitHub");
    Ok(tracker)
}
