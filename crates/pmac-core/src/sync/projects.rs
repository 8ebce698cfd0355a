//! Board → project reconciliation.
//!
//! The project is discovered by exact title under the owner. Items are
//! linked column by column in the board's declared order; stories without
//! an issue are skipped without a trace.

use crate::error::TrackerError;
use crate::model::Board;
use crate::tracker::{Project, Tracker};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkItem {
    pub story_id: String,
    pub issue_number: u64,
    pub column: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkFailure {
    pub story_id: String,
    pub issue_number: u64,
    pub column: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BoardSummary {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub project_name: String,
    pub project_number: Option<u64>,
    pub is_new: bool,
    pub added: usize,
    pub failed: usize,
    pub added_issues: Vec<LinkItem>,
    pub failed_issues: Vec<LinkFailure>,
    pub dry_run: bool,
}

impl BoardSummary {
    fn failure(board: &Board, message: String, dry_run: bool) -> Self {
        Self {
            success: false,
            message: Some(message),
            project_name: board.name.clone(),
            dry_run,
            ..Self::default()
        }
    }
}

pub struct ProjectReconciler<'a> {
    tracker: &'a dyn Tracker,
    owner: String,
}

impl<'a> ProjectReconciler<'a> {
    pub fn new(tracker: &'a dyn Tracker, owner: impl Into<String>) -> Self {
        Self {
            tracker,
            owner: owner.into(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn find_existing_project(&self, name: &str) -> Result<Option<Project>, TrackerError> {
        let found = self
            .tracker
            .list_projects(&self.owner)?
            .into_iter()
            .find(|p| p.title == name);
        match &found {
            Some(p) => tracing::debug!(project = %name, number = p.number, "found project"),
            None => tracing::debug!(project = %name, "no project with that title"),
        }
        Ok(found)
    }

    /// Reuse the project titled `name` or create it. A dry run reports a
    /// would-create as `(None, true)`.
    pub fn create_project(
        &self,
        name: &str,
        dry_run: bool,
    ) -> Result<(Option<Project>, bool), TrackerError> {
        if let Some(existing) = self.find_existing_project(name)? {
            tracing::info!(project = %name, number = existing.number, "project already exists");
            return Ok((Some(existing), false));
        }
        if dry_run {
            tracing::info!(project = %name, "would create project");
            return Ok((None, true));
        }
        let project = self.tracker.create_project(name, &self.owner)?;
        tracing::info!(project = %name, number = project.number, "created project");
        Ok((Some(project), true))
    }

    /// Make sure the board's project exists and link every assigned story
    /// that has an issue. Failures other than auth end up in the summary.
    pub fn create_board_from_model(
        &self,
        board: &Board,
        issues_map: &BTreeMap<String, u64>,
        dry_run: bool,
    ) -> Result<BoardSummary, TrackerError> {
        let (project, is_new) = match self.create_project(&board.name, dry_run) {
            Ok(found) => found,
            Err(e) if e.is_auth() => return Err(e),
            Err(e) => {
                tracing::error!(project = %board.name, error = %e, "failed to create project");
                return Ok(BoardSummary::failure(
                    board,
                    format!("Failed to create project: {e}"),
                    dry_run,
                ));
            }
        };

        let mut summary = BoardSummary {
            success: true,
            project_name: board.name.clone(),
            project_number: project.as_ref().map(|p| p.number),
            is_new,
            dry_run,
            ..BoardSummary::default()
        };

        if let (Some(project), false) = (&project, dry_run) {
            for (column, story_ids) in board.initial_assignments.iter() {
                for story_id in story_ids {
                    let Some(&issue_number) = issues_map.get(story_id) else {
                        continue;
                    };
                    let outcome =
                        self.tracker
                            .add_issue_to_project(project.number, issue_number, &self.owner);
                    let error = match outcome {
                        Ok(true) => None,
                        Ok(false) => Some("item was not added".to_string()),
                        Err(e) if e.is_auth() => return Err(e),
                        Err(e) => Some(e.to_string()),
                    };
                    match error {
                        None => {
                            tracing::debug!(story = %story_id, issue = issue_number, column, "added issue to project");
                            summary.added_issues.push(LinkItem {
                                story_id: story_id.clone(),
                                issue_number,
                                column: column.to_string(),
                            });
                        }
                        Some(error) => {
                            tracing::warn!(story = %story_id, issue = issue_number, %error, "failed to add issue to project");
                            summary.failed_issues.push(LinkFailure {
                                story_id: story_id.clone(),
                                issue_number,
                                column: column.to_string(),
                                error,
                            });
                        }
                    }
                }
            }
        }

        summary.added = summary.added_issues.len();
        summary.failed = summary.failed_issues.len();
        tracing::info!(
            project = %board.name,
            is_new,
            added = summary.added,
            failed = summary.failed,
            dry_run,
            "board sync finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::tracker::fake::{Call, FakeTracker};

    fn issues_map(pairs: &[(&str, u64)]) -> BTreeMap<String, u64> {
        pairs.iter().map(|(s, n)| (s.to_string(), *n)).collect()
    }

    #[test]
    fn existing_project_is_found_by_exact_title() {
        let tracker = FakeTracker::new()
            .with_project("team board", 1)
            .with_project("Team Board", 2);
        let reconciler = ProjectReconciler::new(&tracker, "acme");
        let found = reconciler.find_existing_project("Team Board").unwrap();
        assert_eq!(found.map(|p| p.number), Some(2));
        assert!(reconciler.find_existing_project("Other").unwrap().is_none());
    }

    #[test]
    fn project_is_reused_or_created() {
        let tracker = FakeTracker::new().with_project("Team Board", 4);
        let reconciler = ProjectReconciler::new(&tracker, "acme");

        let (project, is_new) = reconciler.create_project("Team Board", false).unwrap();
        assert_eq!((project.map(|p| p.number), is_new), (Some(4), false));

        let (project, is_new) = reconciler.create_project("Roadmap", true).unwrap();
        assert_eq!((project, is_new), (None, true));
        assert_eq!(tracker.mutation_count(), 0);

        let (project, is_new) = reconciler.create_project("Roadmap", false).unwrap();
        assert!(is_new);
        assert_eq!(project.unwrap().number, 5);
    }

    #[test]
    fn board_links_mapped_stories_and_skips_the_rest() {
        let data = fixtures::data_set();
        let tracker = FakeTracker::new();
        let summary = ProjectReconciler::new(&tracker, "acme")
            .create_board_from_model(&data.board, &issues_map(&[("S-1", 11), ("S-2", 12)]), false)
            .unwrap();

        assert!(summary.success);
        assert!(summary.is_new);
        assert_eq!(summary.project_number, Some(1));
        assert_eq!((summary.added, summary.failed), (2, 0));
        assert_eq!(
            summary.added_issues,
            vec![
                LinkItem {
                    story_id: "S-1".into(),
                    issue_number: 11,
                    column: "To Do".into()
                },
                LinkItem {
                    story_id: "S-2".into(),
                    issue_number: 12,
                    column: "In Progress".into()
                },
            ]
        );
        assert_eq!(tracker.items(), vec![(1, 11), (1, 12)]);
    }

    #[test]
    fn link_failures_are_recorded() {
        let data = fixtures::data_set();
        let mut tracker = FakeTracker::new().with_project("Team Board", 3);
        tracker.fail_links.insert(13);
        let summary = ProjectReconciler::new(&tracker, "acme")
            .create_board_from_model(
                &data.board,
                &issues_map(&[("S-1", 11), ("S-2", 12), ("S-3", 13)]),
                false,
            )
            .unwrap();

        assert!(!summary.is_new);
        assert_eq!((summary.added, summary.failed), (2, 1));
        let failure = &summary.failed_issues[0];
        assert_eq!(failure.story_id, "S-3");
        assert_eq!(failure.column, "To Do");
        assert!(failure.error.contains("issue #13"));
    }

    #[test]
    fn dry_run_links_nothing() {
        let data = fixtures::data_set();
        let tracker = FakeTracker::new().with_project("Team Board", 3);
        let summary = ProjectReconciler::new(&tracker, "acme")
            .create_board_from_model(&data.board, &issues_map(&[("S-1", 11)]), true)
            .unwrap();

        assert!(summary.success && summary.dry_run);
        assert_eq!(summary.project_number, Some(3));
        assert_eq!(summary.added + summary.failed, 0);
        assert_eq!(tracker.mutation_count(), 0);
    }

    #[test]
    fn creation_failure_is_reported_not_raised() {
        let data = fixtures::data_set();
        let tracker = FakeTracker::new().failing_create_project();
        let summary = ProjectReconciler::new(&tracker, "acme")
            .create_board_from_model(&data.board, &issues_map(&[("S-1", 11)]), false)
            .unwrap();
        assert!(!summary.success);
        assert!(summary.message.unwrap().starts_with("Failed to create project"));
        assert_eq!(tracker.calls(), vec![Call::CreateProject("Team Board".into())]);
    }

    #[test]
    fn discovery_failure_is_reported_not_raised() {
        let data = fixtures::data_set();
        let tracker = FakeTracker::new().failing_list_projects();
        let summary = ProjectReconciler::new(&tracker, "acme")
            .create_board_from_model(&data.board, &BTreeMap::new(), false)
            .unwrap();
        assert!(!summary.success);
        assert_eq!(tracker.mutation_count(), 0);
    }
}
