//! [`Tracker`] backed by the GitHub CLI.
//!
//! Every call spawns `gh` with `--json`/`--format json` output and parses the
//! result with serde. The binary handles its own credentials; a configured
//! token is passed through as `GH_TOKEN` for the child only.

use super::{
    FieldKind, FieldSpec, Issue, IssueState, IssueStateFilter, Label, LabelSpec, NewIssue,
    Project, RepoInfo, Result, Tracker, TrackerConfig,
};
use crate::error::TrackerError;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Command;
use std::sync::OnceLock;

const ISSUE_FIELDS: &str = "number,title,state,labels,url,body,createdAt,updatedAt";

pub struct GhCliTracker {
    bin: PathBuf,
    repo: String,
    token: Option<String>,
}

impl GhCliTracker {
    pub fn new(config: TrackerConfig) -> crate::error::Result<Self> {
        let bin = which::which("gh").map_err(|_| TrackerError::CliNotInstalled)?;
        Ok(Self {
            bin,
            repo: config.repo,
            token: config.token,
        })
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new(&self.bin);
        cmd.args(args);
        if let Some(token) = &self.token {
            cmd.env("GH_TOKEN", token);
        }
        tracing::debug!(args = ?args, "gh");
        let output = cmd
            .output()
            .map_err(|e| TrackerError::Command(format!("failed to run gh: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(stderr.trim()));
        }
        String::from_utf8(output.stdout).map_err(|e| TrackerError::Parse(e.to_string()))
    }
}

impl Tracker for GhCliTracker {
    fn check_auth(&self) -> Result<()> {
        self.run(&["auth", "status"]).map(|_| ()).map_err(|e| match e {
            TrackerError::Command(msg) => TrackerError::Auth(msg),
            other => other,
        })
    }

    fn repo_info(&self) -> Result<RepoInfo> {
        let out = self.run(&[
            "repo",
            "view",
            &self.repo,
            "--json",
            "name,owner,description,url,isPrivate,defaultBranchRef",
        ])?;
        parse_repo_info(&out)
    }

    fn list_issues(&self, state: IssueStateFilter, limit: usize) -> Result<Vec<Issue>> {
        let limit = limit.to_string();
        let out = self.run(&[
            "issue",
            "list",
            "--repo",
            &self.repo,
            "--state",
            state.as_str(),
            "--limit",
            &limit,
            "--json",
            ISSUE_FIELDS,
        ])?;
        parse_issue_list(&out)
    }

    fn create_issue(&self, issue: &NewIssue) -> Result<Issue> {
        let mut args: Vec<String> = vec![
            "issue".into(),
            "create".into(),
            "--repo".into(),
            self.repo.clone(),
            "--title".into(),
            issue.title.clone(),
            "--body".into(),
            issue.body.clone(),
        ];
        for label in &issue.labels {
            args.push("--label".into());
            args.push(label.clone());
        }
        for assignee in &issue.assignees {
            args.push("--assignee".into());
            args.push(assignee.clone());
        }
        if let Some(milestone) = issue.milestone {
            args.push("--milestone".into());
            args.push(milestone.to_string());
        }
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let out = self.run(&args)?;
        let number = issue_number_from_url(&out).ok_or_else(|| {
            TrackerError::Parse(format!("could not find issue number in gh output: {}", out.trim()))
        })?;
        self.get_issue(number)
    }

    fn get_issue(&self, number: u64) -> Result<Issue> {
        let n = number.to_string();
        let out = self.run(&[
            "issue",
            "view",
            &n,
            "--repo",
            &self.repo,
            "--json",
            ISSUE_FIELDS,
        ])?;
        let raw: GhIssue = serde_json::from_str(&out).map_err(parse_err)?;
        raw.into_issue()
    }

    fn create_label(&self, label: &LabelSpec) -> Result<Label> {
        self.run(&[
            "label",
            "create",
            &label.name,
            "--repo",
            &self.repo,
            "--color",
            &label.color,
            "--description",
            &label.description,
        ])?;
        Ok(Label::from(label))
    }

    fn update_label(&self, label: &LabelSpec) -> Result<Label> {
        self.run(&[
            "label",
            "edit",
            &label.name,
            "--repo",
            &self.repo,
            "--color",
            &label.color,
            "--description",
            &label.description,
        ])?;
        Ok(Label::from(label))
    }

    fn list_projects(&self, owner: &str) -> Result<Vec<Project>> {
        match self.run(&["project", "list", "--owner", owner, "--format", "json"]) {
            Ok(out) => parse_project_list(&out, owner),
            Err(TrackerError::Command(msg)) if msg.to_lowercase().contains("no projects found") => {
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    fn create_project(&self, title: &str, owner: &str) -> Result<Project> {
        let out = self.run(&[
            "project", "create", "--title", title, "--owner", owner, "--format", "json",
        ])?;
        if let Ok(created) = serde_json::from_str::<GhProject>(&out) {
            return Ok(created.into_project(owner));
        }
        let number = project_number_from_output(&out).ok_or_else(|| {
            TrackerError::Parse(format!(
                "could not find project number in gh output: {}",
                out.trim()
            ))
        })?;
        Ok(Project {
            number,
            title: title.to_string(),
            owner: owner.to_string(),
            url: None,
        })
    }

    fn add_issue_to_project(&self, project: u64, issue: u64, owner: &str) -> Result<bool> {
        let url = format!("https://github.com/{}/issues/{issue}", self.repo);
        let project = project.to_string();
        self.run(&["project", "item-add", &project, "--owner", owner, "--url", &url])?;
        Ok(true)
    }

    fn list_project_fields(&self, project: u64, owner: &str) -> Result<Vec<String>> {
        let project = project.to_string();
        let out = self.run(&[
            "project", "field-list", &project, "--owner", owner, "--format", "json",
        ])?;
        parse_field_names(&out)
    }

    fn create_project_field(&self, project: u64, owner: &str, field: &FieldSpec) -> Result<()> {
        let project = project.to_string();
        let options = match &field.kind {
            FieldKind::SingleSelect { options } => Some(
                options
                    .iter()
                    .map(|o| o.name.as_str())
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            _ => None,
        };
        let mut args = vec![
            "project",
            "field-create",
            project.as_str(),
            "--owner",
            owner,
            "--name",
            field.name.as_str(),
            "--data-type",
            field.kind.data_type(),
        ];
        if let Some(options) = &options {
            args.push("--single-select-options");
            args.push(options);
        }
        self.run(&args)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Output parsing
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GhIssue {
    number: u64,
    title: String,
    #[serde(default)]
    body: String,
    state: String,
    #[serde(default)]
    labels: Vec<GhName>,
    #[serde(default)]
    url: String,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct GhName {
    name: String,
}

#[derive(Deserialize)]
struct GhLogin {
    login: String,
}

impl GhIssue {
    fn into_issue(self) -> Result<Issue> {
        let state = IssueState::parse(&self.state)
            .ok_or_else(|| TrackerError::Parse(format!("unknown issue state '{}'", self.state)))?;
        Ok(Issue {
            number: self.number,
            title: self.title,
            body: self.body,
            labels: self.labels.into_iter().map(|l| l.name).collect(),
            state,
            url: self.url,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Deserialize)]
struct GhProjectList {
    #[serde(default)]
    projects: Vec<GhProject>,
}

#[derive(Deserialize)]
struct GhProject {
    number: u64,
    title: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    closed: bool,
}

impl GhProject {
    fn into_project(self, owner: &str) -> Project {
        Project {
            number: self.number,
            title: self.title,
            owner: owner.to_string(),
            url: self.url,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GhRepo {
    name: String,
    owner: GhLogin,
    #[serde(default)]
    description: Option<String>,
    url: String,
    #[serde(default)]
    is_private: bool,
    #[serde(default)]
    default_branch_ref: Option<GhName>,
}

#[derive(Deserialize)]
struct GhFieldList {
    #[serde(default)]
    fields: Vec<GhName>,
}

fn parse_err(e: serde_json::Error) -> TrackerError {
    TrackerError::Parse(format!("unexpected gh output: {e}"))
}

fn parse_issue_list(out: &str) -> Result<Vec<Issue>> {
    let raw: Vec<GhIssue> = serde_json::from_str(out).map_err(parse_err)?;
    raw.into_iter().map(GhIssue::into_issue).collect()
}

fn parse_project_list(out: &str, owner: &str) -> Result<Vec<Project>> {
    if out.trim().is_empty() {
        return Ok(Vec::new());
    }
    let list: GhProjectList = serde_json::from_str(out).map_err(parse_err)?;
    Ok(list
        .projects
        .into_iter()
        .filter(|p| !p.closed)
        .map(|p| p.into_project(owner))
        .collect())
}

fn parse_repo_info(out: &str) -> Result<RepoInfo> {
    let raw: GhRepo = serde_json::from_str(out).map_err(parse_err)?;
    Ok(RepoInfo {
        name: raw.name,
        owner: raw.owner.login,
        description: raw.description.filter(|d| !d.is_empty()),
        url: raw.url,
        private: raw.is_private,
        default_branch: raw.default_branch_ref.map(|b| b.name),
    })
}

fn parse_field_names(out: &str) -> Result<Vec<String>> {
    let list: GhFieldList = serde_json::from_str(out).map_err(parse_err)?;
    Ok(list.fields.into_iter().map(|f| f.name).collect())
}

/// Trailing number of an issue URL printed by `gh issue create`.
fn issue_number_from_url(out: &str) -> Option<u64> {
    out.trim().rsplit('/').next()?.parse().ok()
}

static PROJECT_NUMBER_RES: OnceLock<Vec<Regex>> = OnceLock::new();
static HTTP_STATUS_RE: OnceLock<Regex> = OnceLock::new();

fn project_number_res() -> &'static [Regex] {
    PROJECT_NUMBER_RES.get_or_init(|| {
        [
            r"Created project [#]?(\d+)",
            r"github\.com/[^/\s]+/[^/\s]+/projects/(\d+)",
            r"/projects/(\d+)",
        ]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
    })
}

fn http_status_re() -> &'static Regex {
    HTTP_STATUS_RE.get_or_init(|| Regex::new(r"HTTP (\d{3})").unwrap())
}

/// Project number from `gh project create` text output: either
/// "Created project #N" or a `.../projects/N` URL.
fn project_number_from_output(out: &str) -> Option<u64> {
    project_number_res()
        .iter()
        .find_map(|re| re.captures(out)?.get(1)?.as_str().parse().ok())
}

/// Status code from a gh error line such as `HTTP 403: ...`.
fn http_status(stderr: &str) -> Option<u16> {
    http_status_re().captures(stderr)?.get(1)?.as_str().parse().ok()
}

/// Map gh stderr to the closest [`TrackerError`].
fn classify_failure(stderr: &str) -> TrackerError {
    let lower = stderr.to_lowercase();
    if lower.contains("api rate limit exceeded") {
        TrackerError::RateLimited {
            message: stderr.to_string(),
            status: http_status(stderr).unwrap_or(429),
            reset_time: None,
        }
    } else if lower.contains("already exists") {
        TrackerError::AlreadyExists(stderr.to_string())
    } else if lower.contains("gh auth login") || lower.contains("not logged") {
        TrackerError::Auth(stderr.to_string())
    } else if lower.contains("could not resolve")
        || (lower.contains("not found") && !lower.contains("no projects found"))
    {
        TrackerError::NotFound(stderr.to_string())
    } else {
        TrackerError::Command(stderr.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_list_output_parses() {
        let out = r#"[
            {"number": 12, "title": "Login form", "state": "OPEN",
             "labels": [{"name": "S-1", "color": "FEF2C0"}, {"name": "points:3"}],
             "url": "https://github.com/acme/backlog/issues/12", "body": "text",
             "createdAt": "2024-03-01T10:00:00Z", "updatedAt": "2024-03-02T10:00:00Z"},
            {"number": 13, "title": "Old", "state": "CLOSED", "labels": [], "url": "", "body": "",
             "createdAt": null, "updatedAt": null}
        ]"#;
        let issues = parse_issue_list(out).unwrap();
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].labels, vec!["S-1", "points:3"]);
        assert_eq!(issues[0].state, IssueState::Open);
        assert!(issues[0].created_at.is_some());
        assert_eq!(issues[1].state, IssueState::Closed);
    }

    #[test]
    fn issue_number_comes_from_url_tail() {
        assert_eq!(
            issue_number_from_url("https://github.com/acme/backlog/issues/42\n"),
            Some(42)
        );
        assert_eq!(issue_number_from_url("created"), None);
    }

    #[test]
    fn project_number_from_text_or_url() {
        assert_eq!(project_number_from_output("Created project #7"), Some(7));
        assert_eq!(project_number_from_output("Created project 8"), Some(8));
        assert_eq!(
            project_number_from_output("https://github.com/orgs/acme/projects/9"),
            Some(9)
        );
        assert_eq!(project_number_from_output("done"), None);
        assert!(std::ptr::eq(project_number_res(), project_number_res()));
    }

    #[test]
    fn project_list_skips_closed() {
        let out = r#"{"projects": [
            {"number": 1, "title": "Team Board", "url": "https://github.com/users/acme/projects/1", "closed": false},
            {"number": 2, "title": "Archive", "closed": true}
        ], "totalCount": 2}"#;
        let projects = parse_project_list(out, "acme").unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].title, "Team Board");
        assert_eq!(projects[0].owner, "acme");
        assert!(parse_project_list("", "acme").unwrap().is_empty());
    }

    #[test]
    fn repo_view_output_parses() {
        let out = r#"{"name": "backlog", "owner": {"login": "acme"}, "description": "",
            "url": "https://github.com/acme/backlog", "isPrivate": true,
            "defaultBranchRef": {"name": "main"}}"#;
        let info = parse_repo_info(out).unwrap();
        assert_eq!(info.owner, "acme");
        assert!(info.private);
        assert_eq!(info.description, None);
        assert_eq!(info.default_branch.as_deref(), Some("main"));
    }

    #[test]
    fn field_list_output_parses() {
        let out = r#"{"fields": [{"id": "F1", "name": "Title", "type": "ProjectV2Field"},
            {"id": "F2", "name": "Status", "type": "ProjectV2SingleSelectField"}], "totalCount": 2}"#;
        assert_eq!(parse_field_names(out).unwrap(), vec!["Title", "Status"]);
    }

    #[test]
    fn stderr_is_classified() {
        let limited = classify_failure("HTTP 403: API rate limit exceeded for user");
        assert!(limited.is_rate_limited());
        assert_eq!(limited.status(), Some(403));
        assert_eq!(
            classify_failure("API rate limit exceeded").status(),
            Some(429)
        );
        assert!(matches!(
            classify_failure("label with name \"S-1\" already exists; use `--force`"),
            TrackerError::AlreadyExists(_)
        ));
        assert!(classify_failure("To get started with GitHub CLI, please run:  gh auth login").is_auth());
        assert!(matches!(
            classify_failure("GraphQL: Could not resolve to an issue"),
            TrackerError::NotFound(_)
        ));
        assert!(matches!(
            classify_failure("no projects found for acme"),
            TrackerError::Command(_)
        ));
        assert!(matches!(classify_failure("boom"), TrackerError::Command(_)));
    }
}
