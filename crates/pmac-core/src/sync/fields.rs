//! Custom field provisioning on a project board.

use crate::error::TrackerError;
use crate::tracker::{FieldKind, FieldSpec, SelectOption, Tracker};
use serde::Serialize;

fn option(name: &str, description: &str, color: &str) -> SelectOption {
    SelectOption {
        name: name.to_string(),
        description: description.to_string(),
        color: color.to_string(),
    }
}

/// Status, Sprint, Story Points and Priority.
pub fn default_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec {
            name: "Status".into(),
            kind: FieldKind::SingleSelect {
                options: vec![
                    option("Backlog", "To be worked on", "GRAY"),
                    option("Selected for Development", "Planned for sprint", "BLUE"),
                    option("In Progress", "Actively being worked on", "YELLOW"),
                    option("In Review", "Under code review", "PURPLE"),
                    option("Done", "Work is completed", "GREEN"),
                ],
            },
        },
        FieldSpec {
            name: "Sprint".into(),
            kind: FieldKind::Text,
        },
        FieldSpec {
            name: "Story Points".into(),
            kind: FieldKind::Number,
        },
        FieldSpec {
            name: "Priority".into(),
            kind: FieldKind::SingleSelect {
                options: vec![
                    option("Low", "Low priority task", "GRAY"),
                    option("Medium", "Moderate importance", "YELLOW"),
                    option("High", "Must be completed soon", "RED"),
                ],
            },
        },
    ]
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldFailure {
    pub name: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FieldsSummary {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub project_number: u64,
    /// Created, or would be created in a dry run.
    pub created: Vec<String>,
    pub existing: Vec<String>,
    pub failed: Vec<FieldFailure>,
    pub dry_run: bool,
}

/// Create every field in `fields` that the project does not have yet.
pub fn ensure_project_fields(
    tracker: &dyn Tracker,
    project_number: u64,
    owner: &str,
    fields: &[FieldSpec],
    dry_run: bool,
) -> Result<FieldsSummary, TrackerError> {
    let mut summary = FieldsSummary {
        success: true,
        project_number,
        dry_run,
        ..FieldsSummary::default()
    };

    let present = match tracker.list_project_fields(project_number, owner) {
        Ok(names) => names,
        Err(e) if e.is_auth() => return Err(e),
        Err(e) => {
            tracing::error!(project = project_number, error = %e, "failed to list project fields");
            summary.success = false;
            summary.message = Some(format!("Failed to list project fields: {e}"));
            return Ok(summary);
        }
    };

    for field in fields {
        if present.iter().any(|p| p == &field.name) {
            tracing::debug!(field = %field.name, "field already exists");
            summary.existing.push(field.name.clone());
            continue;
        }
        if dry_run {
            tracing::info!(field = %field.name, "would create field");
            summary.created.push(field.name.clone());
            continue;
        }
        match tracker.create_project_field(project_number, owner, field) {
            Ok(()) => {
                tracing::info!(field = %field.name, project = project_number, "created field");
                summary.created.push(field.name.clone());
            }
            Err(e) if e.is_auth() => return Err(e),
            Err(e) => {
                tracing::warn!(field = %field.name, error = %e, "failed to create field");
                summary.failed.push(FieldFailure {
                    name: field.name.clone(),
                    error: e.to_string(),
                });
            }
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::fake::{Call, FakeTracker};

    #[test]
    fn default_field_set() {
        let fields = default_fields();
        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Status", "Sprint", "Story Points", "Priority"]);
        match &fields[0].kind {
            FieldKind::SingleSelect { options } => {
                assert_eq!(options.len(), 5);
                assert_eq!(options[1].name, "Selected for Development");
                assert_eq!(options[4].color, "GREEN");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(fields[2].kind.data_type(), "NUMBER");
    }

    #[test]
    fn only_missing_fields_are_created() {
        let tracker = FakeTracker::new().with_field(2, "Status").with_field(2, "Title");
        let summary = ensure_project_fields(&tracker, 2, "acme", &default_fields(), false).unwrap();

        assert!(summary.success);
        assert_eq!(summary.existing, vec!["Status"]);
        assert_eq!(summary.created, vec!["Sprint", "Story Points", "Priority"]);
        assert_eq!(
            tracker.calls(),
            vec![
                Call::CreateField("Sprint".into()),
                Call::CreateField("Story Points".into()),
                Call::CreateField("Priority".into()),
            ]
        );

        let again = ensure_project_fields(&tracker, 2, "acme", &default_fields(), false).unwrap();
        assert!(again.created.is_empty());
        assert_eq!(again.existing.len(), 4);
    }

    #[test]
    fn dry_run_creates_nothing() {
        let tracker = FakeTracker::new();
        let summary = ensure_project_fields(&tracker, 2, "acme", &default_fields(), true).unwrap();
        assert_eq!(summary.created.len(), 4);
        assert_eq!(tracker.mutation_count(), 0);
    }
}
