//! Story → issue reconciliation.
//!
//! Discovery is by id label first, then exact title. The repository's issue
//! list is fetched once per reconciler and issues created during the run are
//! appended to it, so a story seen twice is only created once.

use super::labels::{self, epic_label, points_label, LabelReport};
use crate::error::TrackerError;
use crate::model::{Epic, Story};
use crate::tracker::{Issue, IssueStateFilter, NewIssue, Tracker};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;

pub const DEFAULT_ISSUE_LIMIT: usize = 1000;

#[derive(Debug, Clone, Copy)]
pub struct IssueSettings {
    /// Upper bound on issues fetched for discovery.
    pub issue_limit: usize,
}

impl Default for IssueSettings {
    fn default() -> Self {
        Self {
            issue_limit: DEFAULT_ISSUE_LIMIT,
        }
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct IssueItem {
    pub story_id: String,
    /// `None` for a dry-run would-create.
    pub issue_number: Option<u64>,
    pub title: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssueFailure {
    pub story_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IssueSyncSummary {
    pub created: usize,
    pub existing: usize,
    pub failed: usize,
    pub total: usize,
    pub created_issues: Vec<IssueItem>,
    pub existing_issues: Vec<IssueItem>,
    pub failed_issues: Vec<IssueFailure>,
    pub labels: LabelReport,
    pub dry_run: bool,
}

impl IssueSyncSummary {
    /// Story id → issue number for every story that has a real issue.
    pub fn issues_map(&self) -> BTreeMap<String, u64> {
        self.created_issues
            .iter()
            .chain(&self.existing_issues)
            .filter_map(|item| Some((item.story_id.clone(), item.issue_number?)))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// Issue payload for `story`. Pure; the epic only contributes its title to
/// the body.
pub fn story_to_issue_payload(story: &Story, epic: Option<&Epic>) -> NewIssue {
    let mut issue_labels = story.labels.clone();
    issue_labels.push(story.id.clone());
    if story.has_epic() {
        issue_labels.push(epic_label(&story.epic_id));
    }
    if story.story_points > 0 {
        issue_labels.push(points_label(story.story_points));
    }
    let mut seen = std::collections::HashSet::new();
    issue_labels.retain(|l| seen.insert(l.clone()));

    let mut body = format!("{}\n\n## Metadata\n", story.description);
    let _ = writeln!(body, "- **ID:** {}", story.id);
    let _ = writeln!(body, "- **Epic:** {}", story.epic_id);
    if let Some(epic) = epic {
        let _ = writeln!(body, "- **Epic Title:** {}", epic.title);
    }
    let _ = writeln!(body, "- **Story Points:** {}", story.story_points);
    let _ = writeln!(body, "- **Status:** {}", story.status);
    if !story.labels.is_empty() {
        body.push_str("\n## Labels\n");
        for label in &story.labels {
            let _ = writeln!(body, "- {label}");
        }
    }

    NewIssue {
        title: story.summary.clone(),
        body,
        labels: issue_labels,
        ..NewIssue::default()
    }
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

pub struct IssueReconciler<'a> {
    tracker: &'a dyn Tracker,
    settings: IssueSettings,
    known: Option<Result<Vec<Issue>, TrackerError>>,
}

impl<'a> IssueReconciler<'a> {
    pub fn new(tracker: &'a dyn Tracker, settings: IssueSettings) -> Self {
        Self {
            tracker,
            settings,
            known: None,
        }
    }

    /// The discovery list, fetched on first use. A failed fetch is kept and
    /// handed back to every later caller without asking the tracker again.
    fn known_issues(&mut self) -> Result<&mut Vec<Issue>, TrackerError> {
        let tracker = self.tracker;
        let limit = self.settings.issue_limit;
        let known = self.known.get_or_insert_with(|| {
            let fetched = tracker.list_issues(IssueStateFilter::All, limit);
            match &fetched {
                Ok(issues) => tracing::debug!(count = issues.len(), "fetched issues for discovery"),
                Err(e) => tracing::error!(error = %e, "failed to fetch issues for discovery"),
            }
            fetched
        });
        match known {
            Ok(issues) => Ok(issues),
            Err(e) => Err(e.clone()),
        }
    }

    /// Existing issue for `story`: first one carrying the story id as a
    /// label, else first one whose title equals the summary.
    pub fn find_existing_issue(&mut self, story: &Story) -> Result<Option<Issue>, TrackerError> {
        let issues = self.known_issues()?;
        if let Some(issue) = issues.iter().find(|i| i.has_label(&story.id)) {
            tracing::debug!(story = %story.id, issue = issue.number, "found issue by id label");
            return Ok(Some(issue.clone()));
        }
        if let Some(issue) = issues.iter().find(|i| i.title == story.summary) {
            tracing::debug!(story = %story.id, issue = issue.number, "found issue by title");
            return Ok(Some(issue.clone()));
        }
        Ok(None)
    }

    /// Returns the issue (if one exists or was made) and whether it is new.
    /// A dry run reports a would-create as `(None, true)`.
    pub fn create_or_update_issue(
        &mut self,
        story: &Story,
        epic: Option<&Epic>,
        dry_run: bool,
    ) -> Result<(Option<Issue>, bool), TrackerError> {
        if let Some(existing) = self.find_existing_issue(story)? {
            tracing::info!(story = %story.id, issue = existing.number, "issue already exists");
            return Ok((Some(existing), false));
        }

        let payload = story_to_issue_payload(story, epic);
        if dry_run {
            tracing::info!(story = %story.id, title = %payload.title, "would create issue");
            return Ok((None, true));
        }

        tracing::info!(story = %story.id, title = %payload.title, "creating issue");
        let issue = self.tracker.create_issue(&payload)?;
        tracing::info!(story = %story.id, issue = issue.number, "created issue");
        self.known_issues()?.push(issue.clone());
        Ok((Some(issue), true))
    }

    /// Reconcile every story. Per-story failures land in `failed_issues`;
    /// only an auth failure aborts.
    pub fn sync_stories_to_issues(
        &mut self,
        stories: &[Story],
        epics: &[Epic],
        dry_run: bool,
    ) -> Result<IssueSyncSummary, TrackerError> {
        let mut summary = IssueSyncSummary {
            total: stories.len(),
            dry_run,
            ..IssueSyncSummary::default()
        };
        if !dry_run {
            summary.labels = labels::ensure_labels_exist(self.tracker, stories, epics)?;
        }

        let epic_map: HashMap<&str, &Epic> = epics.iter().map(|e| (e.id.as_str(), e)).collect();
        for story in stories {
            let epic = epic_map.get(story.epic_id.as_str()).copied();
            match self.create_or_update_issue(story, epic, dry_run) {
                Ok((issue, is_new)) => {
                    let item = IssueItem {
                        story_id: story.id.clone(),
                        issue_number: issue.as_ref().map(|i| i.number),
                        title: issue
                            .map(|i| i.title)
                            .unwrap_or_else(|| story.summary.clone()),
                    };
                    if is_new {
                        summary.created_issues.push(item);
                    } else {
                        summary.existing_issues.push(item);
                    }
                }
                Err(e) if e.is_auth() => return Err(e),
                Err(e) => {
                    tracing::error!(story = %story.id, error = %e, "failed to sync story");
                    summary.failed_issues.push(IssueFailure {
                        story_id: story.id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        summary.created = summary.created_issues.len();
        summary.existing = summary.existing_issues.len();
        summary.failed = summary.failed_issues.len();
        tracing::info!(
            created = summary.created,
            existing = summary.existing,
            failed = summary.failed,
            total = summary.total,
            dry_run,
            "issue sync finished"
        );
        Ok(summary)
    }
}
