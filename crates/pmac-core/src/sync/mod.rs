//! Reconciliation of a [`DataSet`] against a [`Tracker`].
//!
//! A run is the issue pass, then the board pass fed with the issue numbers
//! the first pass produced, then optionally the project field pass.

pub mod fields;
pub mod issues;
pub mod labels;
pub mod projects;

use crate::error::TrackerError;
use crate::model::DataSet;
use crate::tracker::Tracker;
use fields::FieldsSummary;
use issues::{IssueReconciler, IssueSettings, IssueSyncSummary};
use projects::{BoardSummary, ProjectReconciler};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub dry_run: bool,
    /// Owner of the project board, usually the repository owner.
    pub owner: String,
    pub board: bool,
    pub fields: bool,
    pub issues: IssueSettings,
}

impl SyncOptions {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            dry_run: false,
            owner: owner.into(),
            board: true,
            fields: false,
            issues: IssueSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub dry_run: bool,
    pub issues: IssueSyncSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub board: Option<BoardSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldsSummary>,
}

impl SyncReport {
    /// True when any entity in any pass failed.
    pub fn has_failures(&self) -> bool {
        self.issues.failed > 0
            || !self.issues.labels.failed.is_empty()
            || self
                .board
                .as_ref()
                .is_some_and(|b| !b.success || b.failed > 0)
            || self
                .fields
                .as_ref()
                .is_some_and(|f| !f.success || !f.failed.is_empty())
    }
}

pub fn run_sync(
    tracker: &dyn Tracker,
    data: &DataSet,
    options: &SyncOptions,
) -> Result<SyncReport, TrackerError> {
    let dry_run = options.dry_run;
    tracing::info!(
        stories = data.stories.len(),
        epics = data.epics.len(),
        dry_run,
        "starting sync"
    );

    let issues = IssueReconciler::new(tracker, options.issues).sync_stories_to_issues(
        &data.stories,
        &data.epics,
        dry_run,
    )?;

    let board = if options.board {
        let reconciler = ProjectReconciler::new(tracker, options.owner.as_str());
        Some(reconciler.create_board_from_model(&data.board, &issues.issues_map(), dry_run)?)
    } else {
        None
    };

    let project_number = board
        .as_ref()
        .filter(|b| b.success)
        .and_then(|b| b.project_number);
    let fields = match (options.fields, project_number) {
        (true, Some(number)) => Some(fields::ensure_project_fields(
            tracker,
            number,
            &options.owner,
            &fields::default_fields(),
            dry_run,
        )?),
        (true, None) => {
            tracing::info!("no project to provision fields on");
            None
        }
        _ => None,
    };

    Ok(SyncReport {
        dry_run,
        issues,
        board,
        fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::tracker::fake::FakeTracker;
    use crate::validate::{relationship_errors, Validator};
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn dangling_epic_is_caught_then_valid_stories_sync() {
        let dir = TempDir::new().unwrap();
        fixtures::write_data_dir(dir.path());
        fixtures::write_json(
            dir.path(),
            crate::paths::STORIES_FILE,
            json!([
                fixtures::story_json("S-1", "Login form", "E-1", 3),
                fixtures::story_json("S-2", "Password reset", "E-1", 0),
                fixtures::story_json("S-3", "Invoice export", "E-9", 5),
            ]),
        );

        let report = Validator::new(dir.path()).validate_all();
        assert!(!report.valid);
        assert_eq!(
            report.relationships.errors,
            vec!["Story S-3 references non-existent epic E-9".to_string()]
        );

        let mut data = DataSet::load(dir.path()).unwrap();
        data.stories.retain(|s| s.id != "S-3");
        let tracker = FakeTracker::new();
        let report = run_sync(&tracker, &data, &SyncOptions::new("acme")).unwrap();

        assert_eq!(report.issues.created, 2);
        let board = report.board.unwrap();
        assert_eq!((board.added, board.failed), (2, 0));
        assert!(!board.added_issues.iter().any(|i| i.story_id == "S-3"));
        assert!(report.fields.is_none());
    }

    #[test]
    fn full_run_then_rerun_is_stable() {
        let data = fixtures::data_set();
        assert!(relationship_errors(&data).is_empty());
        let tracker = FakeTracker::new();
        let mut options = SyncOptions::new("acme");
        options.fields = true;

        let first = run_sync(&tracker, &data, &options).unwrap();
        assert!(!first.has_failures());
        assert_eq!(first.issues.created, 3);
        assert_eq!(first.board.as_ref().unwrap().added, 3);
        assert_eq!(first.fields.as_ref().unwrap().created.len(), 4);

        let second = run_sync(&tracker, &data, &options).unwrap();
        assert_eq!(second.issues.existing, 3);
        let board = second.board.unwrap();
        assert!(!board.is_new);
        assert_eq!(board.project_number, first.board.unwrap().project_number);
        assert!(second.fields.unwrap().created.is_empty());
        assert_eq!(tracker.issues().len(), 3);
    }

    #[test]
    fn dry_run_makes_no_mutations() {
        let data = fixtures::data_set();
        let tracker = FakeTracker::new().with_issue("Login form", &["S-1"]);
        let mut options = SyncOptions::new("acme");
        options.dry_run = true;
        options.fields = true;

        let report = run_sync(&tracker, &data, &options).unwrap();
        assert_eq!(tracker.mutation_count(), 0);
        assert_eq!((report.issues.created, report.issues.existing), (2, 1));
        let board = report.board.unwrap();
        assert!(board.is_new && board.project_number.is_none());
        assert!(report.fields.is_none());
    }

    #[test]
    fn board_pass_can_be_disabled() {
        let data = fixtures::data_set();
        let tracker = FakeTracker::new();
        let mut options = SyncOptions::new("acme");
        options.board = false;
        let report = run_sync(&tracker, &data, &options).unwrap();
        assert!(report.board.is_none());
        assert!(tracker.items().is_empty());
    }

    #[test]
    fn auth_failure_aborts_run() {
        let data = fixtures::data_set();
        let tracker = FakeTracker::new().failing_auth();
        let err = run_sync(&tracker, &data, &SyncOptions::new("acme")).unwrap_err();
        assert!(err.is_auth());
    }
}
