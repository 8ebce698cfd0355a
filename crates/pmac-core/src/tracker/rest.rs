//! [`Tracker`] over the GitHub REST and GraphQL APIs.
//!
//! Issues, labels and repository metadata go through REST. Projects (v2),
//! their fields and item linking only exist in GraphQL.

use super::{
    FieldKind, FieldSpec, Issue, IssueState, IssueStateFilter, Label, LabelSpec, NewIssue,
    Project, RepoInfo, Result, Tracker, TrackerConfig,
};
use crate::error::{PmacError, TrackerError};
use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const MAX_PER_PAGE: usize = 100;

pub struct RestTracker {
    client: Client,
    base: Url,
    owner: String,
    name: String,
}

impl RestTracker {
    pub fn new(config: TrackerConfig) -> crate::error::Result<Self> {
        let token = config.token.as_deref().ok_or_else(|| {
            PmacError::InvalidConfig("a GitHub token is required for rest mode".to_string())
        })?;

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| PmacError::InvalidConfig("token contains invalid characters".into()))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("pmac"));
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static("2022-11-28"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()
            .map_err(|e| TrackerError::Transport(e.to_string()))?;

        let base = Url::parse(config.api_url.trim_end_matches('/')).map_err(|e| {
            PmacError::InvalidConfig(format!("invalid api_url '{}': {e}", config.api_url))
        })?;

        let owner = config.owner().to_string();
        let name = config.repo_name().to_string();
        Ok(Self {
            client,
            base,
            owner,
            name,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| TrackerError::Transport(format!("cannot use '{}' as a base URL", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn repo_url(&self, rest: &[&str]) -> Result<Url> {
        let mut segments = vec!["repos", self.owner.as_str(), self.name.as_str()];
        segments.extend_from_slice(rest);
        self.url(&segments)
    }

    fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request
            .send()
            .map_err(|e| TrackerError::Transport(e.to_string()))?;
        check_status(response)
    }

    fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        self.send(request)?
            .json()
            .map_err(|e| TrackerError::Parse(e.to_string()))
    }

    /// Run a GraphQL document, returning `data` or the joined `errors`.
    fn graphql(&self, query: &str, variables: Value) -> Result<Value> {
        let url = self.url(&["graphql"])?;
        let body: GraphqlResponse = self.send_json(
            self.client
                .post(url)
                .json(&json!({ "query": query, "variables": variables })),
        )?;
        if let Some(errors) = body.errors.filter(|e| !e.is_empty()) {
            let message = errors
                .iter()
                .filter_map(|e| e.get("message").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(TrackerError::Api {
                message: format!("GraphQL error: {message}"),
                status: None,
                response: Some(Value::Array(errors)),
            });
        }
        body.data
            .ok_or_else(|| TrackerError::Parse("GraphQL response has no data".into()))
    }

    fn owner_id(&self, owner: &str) -> Result<String> {
        let data = self.graphql(
            "query OwnerId($owner: String!) { repositoryOwner(login: $owner) { id } }",
            json!({ "owner": owner }),
        )?;
        str_at(&data, "/repositoryOwner/id")
            .map(str::to_string)
            .ok_or_else(|| TrackerError::NotFound(format!("owner {owner}")))
    }

    fn project_id(&self, owner: &str, number: u64) -> Result<String> {
        let data = self.graphql(
            "query ProjectId($owner: String!, $number: Int!) {
                repositoryOwner(login: $owner) {
                    ... on User { projectV2(number: $number) { id } }
                    ... on Organization { projectV2(number: $number) { id } }
                }
            }",
            json!({ "owner": owner, "number": number }),
        )?;
        str_at(&data, "/repositoryOwner/projectV2/id")
            .map(str::to_string)
            .ok_or_else(|| TrackerError::NotFound(format!("project #{number} for {owner}")))
    }
}

impl Tracker for RestTracker {
    fn check_auth(&self) -> Result<()> {
        let url = self.url(&["user"])?;
        self.send(self.client.get(url)).map(|_| ()).map_err(|e| match e {
            TrackerError::Auth(_) => e,
            other => TrackerError::Auth(other.to_string()),
        })
    }

    fn repo_info(&self) -> Result<RepoInfo> {
        let url = self.repo_url(&[])?;
        let raw: RestRepo = self.send_json(self.client.get(url))?;
        Ok(RepoInfo {
            name: raw.name,
            owner: raw.owner.login,
            description: raw.description,
            url: raw.html_url,
            private: raw.private,
            default_branch: raw.default_branch,
        })
    }

    fn list_issues(&self, state: IssueStateFilter, limit: usize) -> Result<Vec<Issue>> {
        let per_page = limit.clamp(1, MAX_PER_PAGE);
        let mut issues = Vec::new();
        let mut page = 1usize;
        while issues.len() < limit {
            let url = self.repo_url(&["issues"])?;
            let batch: Vec<RestIssue> = self.send_json(self.client.get(url).query(&[
                ("state", state.as_str().to_string()),
                ("per_page", per_page.to_string()),
                ("page", page.to_string()),
            ]))?;
            let fetched = batch.len();
            for raw in batch {
                if raw.pull_request.is_some() {
                    continue;
                }
                if issues.len() == limit {
                    break;
                }
                issues.push(raw.into_issue()?);
            }
            if fetched < per_page {
                break;
            }
            page += 1;
        }
        tracing::debug!(count = issues.len(), pages = page, "listed issues");
        Ok(issues)
    }

    fn create_issue(&self, issue: &NewIssue) -> Result<Issue> {
        let url = self.repo_url(&["issues"])?;
        let raw: RestIssue = self.send_json(self.client.post(url).json(issue))?;
        raw.into_issue()
    }

    fn get_issue(&self, number: u64) -> Result<Issue> {
        let n = number.to_string();
        let url = self.repo_url(&["issues", &n])?;
        let raw: RestIssue = self.send_json(self.client.get(url))?;
        raw.into_issue()
    }

    fn create_label(&self, label: &LabelSpec) -> Result<Label> {
        let url = self.repo_url(&["labels"])?;
        self.send_json(self.client.post(url).json(label))
            .map_err(|e| match e {
                TrackerError::Api {
                    status: Some(422), ..
                } => TrackerError::AlreadyExists(label.name.clone()),
                other => other,
            })
    }

    fn update_label(&self, label: &LabelSpec) -> Result<Label> {
        let url = self.repo_url(&["labels", &label.name])?;
        self.send_json(self.client.patch(url).json(&json!({
            "color": label.color,
            "description": label.description,
        })))
    }

    fn list_projects(&self, owner: &str) -> Result<Vec<Project>> {
        let data = self.graphql(
            "query Projects($owner: String!) {
                repositoryOwner(login: $owner) {
                    ... on User { projectsV2(first: 100) { nodes { number title url closed } } }
                    ... on Organization { projectsV2(first: 100) { nodes { number title url closed } } }
                }
            }",
            json!({ "owner": owner }),
        )?;
        if data.pointer("/repositoryOwner").map_or(true, Value::is_null) {
            return Err(TrackerError::NotFound(format!("owner {owner}")));
        }
        let nodes = data
            .pointer("/repositoryOwner/projectsV2/nodes")
            .cloned()
            .unwrap_or(Value::Array(Vec::new()));
        let nodes: Vec<ProjectNode> =
            serde_json::from_value(nodes).map_err(|e| TrackerError::Parse(e.to_string()))?;
        Ok(nodes
            .into_iter()
            .filter(|p| !p.closed)
            .map(|p| p.into_project(owner))
            .collect())
    }

    fn create_project(&self, title: &str, owner: &str) -> Result<Project> {
        let owner_id = self.owner_id(owner)?;
        let data = self.graphql(
            "mutation CreateProject($ownerId: ID!, $title: String!) {
                createProjectV2(input: {ownerId: $ownerId, title: $title}) {
                    projectV2 { number title url closed }
                }
            }",
            json!({ "ownerId": owner_id, "title": title }),
        )?;
        let node = data
            .pointer("/createProjectV2/projectV2")
            .cloned()
            .ok_or_else(|| TrackerError::Parse("createProjectV2 returned no project".into()))?;
        let node: ProjectNode =
            serde_json::from_value(node).map_err(|e| TrackerError::Parse(e.to_string()))?;
        Ok(node.into_project(owner))
    }

    fn add_issue_to_project(&self, project: u64, issue: u64, owner: &str) -> Result<bool> {
        let project_id = self.project_id(owner, project)?;
        let data = self.graphql(
            "query IssueId($owner: String!, $name: String!, $number: Int!) {
                repository(owner: $owner, name: $name) { issue(number: $number) { id } }
            }",
            json!({ "owner": self.owner, "name": self.name, "number": issue }),
        )?;
        let issue_id = str_at(&data, "/repository/issue/id")
            .ok_or_else(|| TrackerError::NotFound(format!("issue #{issue}")))?;
        let data = self.graphql(
            "mutation AddItem($projectId: ID!, $contentId: ID!) {
                addProjectV2ItemById(input: {projectId: $projectId, contentId: $contentId}) {
                    item { id }
                }
            }",
            json!({ "projectId": project_id, "contentId": issue_id }),
        )?;
        Ok(str_at(&data, "/addProjectV2ItemById/item/id").is_some())
    }

    fn list_project_fields(&self, project: u64, owner: &str) -> Result<Vec<String>> {
        let data = self.graphql(
            "query Fields($owner: String!, $number: Int!) {
                repositoryOwner(login: $owner) {
                    ... on User { projectV2(number: $number) { fields(first: 100) { nodes { ... on ProjectV2FieldCommon { name } } } } }
                    ... on Organization { projectV2(number: $number) { fields(first: 100) { nodes { ... on ProjectV2FieldCommon { name } } } } }
                }
            }",
            json!({ "owner": owner, "number": project }),
        )?;
        let nodes = data
            .pointer("/repositoryOwner/projectV2/fields/nodes")
            .and_then(Value::as_array)
            .ok_or_else(|| TrackerError::NotFound(format!("project #{project} for {owner}")))?;
        Ok(nodes
            .iter()
            .filter_map(|n| n.get("name").and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }

    fn create_project_field(&self, project: u64, owner: &str, field: &FieldSpec) -> Result<()> {
        let project_id = self.project_id(owner, project)?;
        let mut input = json!({
            "projectId": project_id,
            "dataType": field.kind.data_type(),
            "name": field.name,
        });
        if let FieldKind::SingleSelect { options } = &field.kind {
            input["singleSelectOptions"] = json!(options);
        }
        self.graphql(
            "mutation CreateField($input: CreateProjectV2FieldInput!) {
                createProjectV2Field(input: $input) {
                    projectV2Field { ... on ProjectV2FieldCommon { name } }
                }
            }",
            json!({ "input": input }),
        )?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Response handling
// ---------------------------------------------------------------------------

fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let headers = response.headers().clone();
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let body: Option<Value> = response.text().ok().and_then(|t| serde_json::from_str(&t).ok());
    let message = body
        .as_ref()
        .and_then(|b| b.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());

    let exhausted = header("x-ratelimit-remaining").as_deref() == Some("0");
    if status == StatusCode::TOO_MANY_REQUESTS || (status == StatusCode::FORBIDDEN && exhausted) {
        return Err(TrackerError::RateLimited {
            message,
            status: status.as_u16(),
            reset_time: header("x-ratelimit-reset").and_then(|v| v.parse().ok()),
        });
    }
    Err(match status {
        StatusCode::UNAUTHORIZED => TrackerError::Auth(message),
        StatusCode::NOT_FOUND => TrackerError::NotFound(message),
        _ => TrackerError::Api {
            message,
            status: Some(status.as_u16()),
            response: body,
        },
    })
}

fn str_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value.pointer(pointer).and_then(Value::as_str)
}

#[derive(Deserialize)]
struct GraphqlResponse {
    data: Option<Value>,
    errors: Option<Vec<Value>>,
}

#[derive(Deserialize)]
struct RestIssue {
    number: u64,
    title: String,
    #[serde(default)]
    body: Option<String>,
    state: String,
    #[serde(default)]
    labels: Vec<RestLabel>,
    #[serde(default)]
    html_url: String,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pull_request: Option<Value>,
}

#[derive(Deserialize)]
struct RestLabel {
    name: String,
}

impl RestIssue {
    fn into_issue(self) -> Result<Issue> {
        let state = IssueState::parse(&self.state)
            .ok_or_else(|| TrackerError::Parse(format!("unknown issue state '{}'", self.state)))?;
        Ok(Issue {
            number: self.number,
            title: self.title,
            body: self.body.unwrap_or_default(),
            labels: self.labels.into_iter().map(|l| l.name).collect(),
            state,
            url: self.html_url,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Deserialize)]
struct RestOwner {
    login: String,
}

#[derive(Deserialize)]
struct RestRepo {
    name: String,
    owner: RestOwner,
    description: Option<String>,
    html_url: String,
    #[serde(default)]
    private: bool,
    default_branch: Option<String>,
}

#[derive(Deserialize)]
struct ProjectNode {
    number: u64,
    title: String,
    url: Option<String>,
    #[serde(default)]
    closed: bool,
}

impl ProjectNode {
    fn into_project(self, owner: &str) -> Project {
        Project {
            number: self.number,
            title: self.title,
            owner: owner.to_string(),
            url: self.url,
        }
    }
}
