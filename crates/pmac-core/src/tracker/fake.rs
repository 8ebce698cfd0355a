//! In-memory [`Tracker`] for tests. Records every mutating call so tests can
//! assert that a dry run touched nothing.

use super::{
    FieldSpec, Issue, IssueState, IssueStateFilter, Label, LabelSpec, NewIssue, Project, RepoInfo,
    Result, Tracker,
};
use crate::error::TrackerError;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateIssue(String),
    CreateLabel(String),
    UpdateLabel(String),
    CreateProject(String),
    AddItem { project: u64, issue: u64 },
    CreateField(String),
}

#[derive(Default)]
struct State {
    issues: Vec<Issue>,
    labels: BTreeMap<String, Label>,
    projects: Vec<Project>,
    items: Vec<(u64, u64)>,
    fields: HashMap<u64, Vec<String>>,
    calls: Vec<Call>,
    list_issue_calls: usize,
}

#[derive(Default)]
pub struct FakeTracker {
    state: RefCell<State>,
    /// Issue titles whose creation fails.
    pub fail_issue_titles: HashSet<String>,
    /// Label names whose create and update both fail.
    pub fail_labels: HashSet<String>,
    /// Issue numbers that cannot be linked to a project.
    pub fail_links: HashSet<u64>,
    pub fail_create_project: bool,
    pub fail_list_projects: bool,
    pub fail_auth: bool,
    pub fail_list_issues: bool,
}

impl FakeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_issue(self, title: &str, labels: &[&str]) -> Self {
        {
            let mut state = self.state.borrow_mut();
            let number = state.issues.len() as u64 + 1;
            state.issues.push(Issue {
                number,
                title: title.to_string(),
                body: String::new(),
                labels: labels.iter().map(|l| l.to_string()).collect(),
                state: IssueState::Open,
                url: format!("https://github.com/acme/backlog/issues/{number}"),
                created_at: None,
                updated_at: None,
            });
        }
        self
    }

    pub fn with_label(self, name: &str) -> Self {
        self.state.borrow_mut().labels.insert(
            name.to_string(),
            Label {
                name: name.to_string(),
                color: "ededed".into(),
                description: String::new(),
            },
        );
        self
    }

    pub fn with_project(self, title: &str, number: u64) -> Self {
        self.state.borrow_mut().projects.push(Project {
            number,
            title: title.to_string(),
            owner: "acme".into(),
            url: None,
        });
        self
    }

    pub fn with_field(self, project: u64, name: &str) -> Self {
        self.state
            .borrow_mut()
            .fields
            .entry(project)
            .or_default()
            .push(name.to_string());
        self
    }

    pub fn failing_auth(mut self) -> Self {
        self.fail_auth = true;
        self
    }

    pub fn failing_create_project(mut self) -> Self {
        self.fail_create_project = true;
        self
    }

    pub fn failing_list_projects(mut self) -> Self {
        self.fail_list_projects = true;
        self
    }

    /// `list_issues` fails with a rate limit on every call.
    pub fn failing_list_issues(mut self) -> Self {
        self.fail_list_issues = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub fn mutation_count(&self) -> usize {
        self.state.borrow().calls.len()
    }

    pub fn issues(&self) -> Vec<Issue> {
        self.state.borrow().issues.clone()
    }

    pub fn label(&self, name: &str) -> Option<Label> {
        self.state.borrow().labels.get(name).cloned()
    }

    pub fn items(&self) -> Vec<(u64, u64)> {
        self.state.borrow().items.clone()
    }

    pub fn list_issue_calls(&self) -> usize {
        self.state.borrow().list_issue_calls
    }

    fn record(&self, call: Call) {
        self.state.borrow_mut().calls.push(call);
    }
}

impl Tracker for FakeTracker {
    fn check_auth(&self) -> Result<()> {
        if self.fail_auth {
            return Err(TrackerError::Auth("bad credentials".into()));
        }
        Ok(())
    }

    fn repo_info(&self) -> Result<RepoInfo> {
        self.check_auth()?;
        Ok(RepoInfo {
            name: "backlog".into(),
            owner: "acme".into(),
            description: None,
            url: "https://github.com/acme/backlog".into(),
            private: false,
            default_branch: Some("main".into()),
        })
    }

    fn list_issues(&self, state: IssueStateFilter, limit: usize) -> Result<Vec<Issue>> {
        self.check_auth()?;
        let mut s = self.state.borrow_mut();
        s.list_issue_calls += 1;
        if self.fail_list_issues {
            return Err(TrackerError::RateLimited {
                message: "API rate limit exceeded".into(),
                status: 403,
                reset_time: Some(1_700_000_000),
            });
        }
        Ok(s.issues
            .iter()
            .filter(|i| match state {
                IssueStateFilter::All => true,
                IssueStateFilter::Open => i.state == IssueState::Open,
                IssueStateFilter::Closed => i.state == IssueState::Closed,
            })
            .take(limit)
            .cloned()
            .collect())
    }

    fn create_issue(&self, issue: &NewIssue) -> Result<Issue> {
        self.check_auth()?;
        self.record(Call::CreateIssue(issue.title.clone()));
        if self.fail_issue_titles.contains(&issue.title) {
            return Err(TrackerError::api("Validation Failed", Some(422)));
        }
        let mut s = self.state.borrow_mut();
        let number = s.issues.len() as u64 + 1;
        let created = Issue {
            number,
            title: issue.title.clone(),
            body: issue.body.clone(),
            labels: issue.labels.clone(),
            state: IssueState::Open,
            url: format!("https://github.com/acme/backlog/issues/{number}"),
            created_at: None,
            updated_at: None,
        };
        s.issues.push(created.clone());
        Ok(created)
    }

    fn get_issue(&self, number: u64) -> Result<Issue> {
        self.state
            .borrow()
            .issues
            .iter()
            .find(|i| i.number == number)
            .cloned()
            .ok_or_else(|| TrackerError::NotFound(format!("issue #{number}")))
    }

    fn create_label(&self, label: &LabelSpec) -> Result<Label> {
        self.check_auth()?;
        self.record(Call::CreateLabel(label.name.clone()));
        if self.fail_labels.contains(&label.name) {
            return Err(TrackerError::api("label rejected", Some(500)));
        }
        let mut s = self.state.borrow_mut();
        if s.labels.contains_key(&label.name) {
            return Err(TrackerError::AlreadyExists(label.name.clone()));
        }
        s.labels.insert(label.name.clone(), Label::from(label));
        Ok(Label::from(label))
    }

    fn update_label(&self, label: &LabelSpec) -> Result<Label> {
        self.record(Call::UpdateLabel(label.name.clone()));
        if self.fail_labels.contains(&label.name) {
            return Err(TrackerError::api("label rejected", Some(500)));
        }
        self.state
            .borrow_mut()
            .labels
            .insert(label.name.clone(), Label::from(label));
        Ok(Label::from(label))
    }

    fn list_projects(&self, owner: &str) -> Result<Vec<Project>> {
        self.check_auth()?;
        if self.fail_list_projects {
            return Err(TrackerError::Transport("connection reset".into()));
        }
        Ok(self
            .state
            .borrow()
            .projects
            .iter()
            .filter(|p| p.owner == owner)
            .cloned()
            .collect())
    }

    fn create_project(&self, title: &str, owner: &str) -> Result<Project> {
        self.check_auth()?;
        self.record(Call::CreateProject(title.to_string()));
        if self.fail_create_project {
            return Err(TrackerError::api("project creation disabled", Some(403)));
        }
        let mut s = self.state.borrow_mut();
        let number = s.projects.iter().map(|p| p.number).max().unwrap_or(0) + 1;
        let project = Project {
            number,
            title: title.to_string(),
            owner: owner.to_string(),
            url: None,
        };
        s.projects.push(project.clone());
        Ok(project)
    }

    fn add_issue_to_project(&self, project: u64, issue: u64, _owner: &str) -> Result<bool> {
        self.check_auth()?;
        self.record(Call::AddItem { project, issue });
        if self.fail_links.contains(&issue) {
            return Err(TrackerError::NotFound(format!("issue #{issue}")));
        }
        self.state.borrow_mut().items.push((project, issue));
        Ok(true)
    }

    fn list_project_fields(&self, project: u64, _owner: &str) -> Result<Vec<String>> {
        Ok(self
            .state
            .borrow()
            .fields
            .get(&project)
            .cloned()
            .unwrap_or_default())
    }

    fn create_project_field(&self, project: u64, _owner: &str, field: &FieldSpec) -> Result<()> {
        self.record(Call::CreateField(field.name.clone()));
        self.state
            .borrow_mut()
            .fields
            .entry(project)
            .or_default()
            .push(field.name.clone());
        Ok(())
    }
}
