//! Label provisioning for story, epic, points and tag labels.

use crate::error::TrackerError;
use crate::model::{Epic, Story};
use crate::tracker::{LabelSpec, Tracker};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

/// Point labels `points:1` through `points:N` are always provisioned.
pub const MAX_SEEDED_POINTS: u32 = 10;

pub const STORY_LABEL_COLOR: &str = "FEF2C0";
pub const EPIC_LABEL_COLOR: &str = "0366D6";
pub const POINTS_LABEL_COLOR: &str = "C2E0C6";
pub const TAG_LABEL_COLOR: &str = "D4C5F9";

pub fn epic_label(epic_id: &str) -> String {
    format!("epic:{epic_id}")
}

pub fn points_label(points: u32) -> String {
    format!("points:{points}")
}

#[derive(Debug, Clone, Serialize)]
pub struct LabelFailure {
    pub name: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LabelReport {
    pub ensured: Vec<String>,
    pub failed: Vec<LabelFailure>,
}

/// Every label the issue payloads for `stories` can reference, de-duplicated
/// by name with the first definition winning.
pub fn required_labels(stories: &[Story], epics: &[Epic]) -> Vec<LabelSpec> {
    let mut labels = Vec::new();

    for story in stories {
        labels.push(LabelSpec::new(
            &story.id,
            STORY_LABEL_COLOR,
            format!("Story ID: {}", story.id),
        ));
    }
    for epic in epics {
        labels.push(LabelSpec::new(
            epic_label(&epic.id),
            EPIC_LABEL_COLOR,
            &epic.title,
        ));
    }

    let mut points: BTreeSet<u32> = (1..=MAX_SEEDED_POINTS).collect();
    points.extend(stories.iter().map(|s| s.story_points).filter(|p| *p > 0));
    for n in points {
        labels.push(LabelSpec::new(
            points_label(n),
            POINTS_LABEL_COLOR,
            format!("{n} story points"),
        ));
    }

    let tags: BTreeSet<&str> = stories
        .iter()
        .flat_map(|s| s.labels.iter().map(String::as_str))
        .collect();
    for tag in tags {
        labels.push(LabelSpec::new(tag, TAG_LABEL_COLOR, format!("Tag: {tag}")));
    }

    let mut seen = HashSet::new();
    labels.retain(|l| seen.insert(l.name.clone()));
    labels
}

/// Create each required label, updating it in place when it already
/// exists. Only an auth failure stops the pass.
pub fn ensure_labels_exist(
    tracker: &dyn Tracker,
    stories: &[Story],
    epics: &[Epic],
) -> Result<LabelReport, TrackerError> {
    let mut report = LabelReport::default();
    for label in required_labels(stories, epics) {
        let outcome = match tracker.create_label(&label) {
            Err(TrackerError::AlreadyExists(_)) => tracker.update_label(&label),
            other => other,
        };
        match outcome {
            Ok(_) => {
                tracing::debug!(label = %label.name, "label ensured");
                report.ensured.push(label.name);
            }
            Err(e) if e.is_auth() => return Err(e),
            Err(e) => {
                tracing::warn!(label = %label.name, error = %e, "failed to create/update label");
                report.failed.push(LabelFailure {
                    name: label.name,
                    error: e.to_string(),
                });
            }
        }
    }
    Ok(report)
}
