//! Two-phase validation of a data directory.
//!
//! The structural phase checks every file against its schema independently.
//! The relationship phase only runs when every file passed, and reports
//! every dangling reference it finds. Nothing is repaired; callers decide
//! whether to proceed.

use crate::io::read_json;
use crate::model::DataSet;
use crate::paths;
use crate::schema;
use crate::sync::labels::MAX_SEEDED_POINTS;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub file: String,
    pub valid: bool,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchemaReport {
    pub valid: bool,
    pub files: Vec<FileReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelationshipReport {
    pub valid: bool,
    /// False when the structural phase failed and relationships were skipped.
    pub checked: bool,
    pub errors: Vec<String>,
}

impl RelationshipReport {
    fn skipped() -> Self {
        Self {
            valid: false,
            checked: false,
            errors: Vec::new(),
        }
    }

    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            checked: true,
            errors,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub schema: SchemaReport,
    pub relationships: RelationshipReport,
    /// Suspicious but tolerated data. Never affects `valid`.
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// Every error from both phases, prefixed with its origin.
    pub fn all_errors(&self) -> Vec<String> {
        let mut out = Vec::new();
        for file in &self.schema.files {
            for e in &file.errors {
                out.push(format!("{}: {e}", file.file));
            }
        }
        out.extend(self.relationships.errors.iter().cloned());
        out
    }
}

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

pub struct Validator {
    data_dir: PathBuf,
}

impl Validator {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Check a single data file against its schema.
    pub fn validate_file(&self, file: &str) -> FileReport {
        let errors = match schema::schema_for(file) {
            None => vec![format!("No schema defined for {file}")],
            Some(schema) => match read_json(&paths::data_file(&self.data_dir, file)) {
                Ok(value) => schema::check(&value, schema),
                Err(crate::error::PmacError::DataFile { message, .. }) => vec![message],
                Err(e) => vec![e.to_string()],
            },
        };
        FileReport {
            file: file.to_string(),
            valid: errors.is_empty(),
            errors,
        }
    }

    /// Structural phase over every required file, plus `project_plan.json`
    /// when one is present.
    pub fn validate_all_files(&self) -> SchemaReport {
        let mut files: Vec<FileReport> = paths::REQUIRED_DATA_FILES
            .iter()
            .map(|f| self.validate_file(f))
            .collect();
        if paths::data_file(&self.data_dir, paths::PROJECT_PLAN_FILE).exists() {
            files.push(self.validate_file(paths::PROJECT_PLAN_FILE));
        }
        SchemaReport {
            valid: files.iter().all(|f| f.valid),
            files,
        }
    }

    /// Relationship phase, loading the data set from disk.
    pub fn validate_relationships(&self) -> RelationshipReport {
        match DataSet::load(&self.data_dir) {
            Ok(data) => RelationshipReport::from_errors(relationship_errors(&data)),
            Err(e) => RelationshipReport::from_errors(vec![format!(
                "Error validating relationships: {e}"
            )]),
        }
    }

    pub fn validate_all(&self) -> ValidationReport {
        let schema = self.validate_all_files();
        if !schema.valid {
            return ValidationReport {
                valid: false,
                schema,
                relationships: RelationshipReport::skipped(),
                warnings: Vec::new(),
            };
        }

        let (relationships, warnings) = match DataSet::load(&self.data_dir) {
            Ok(data) => (
                RelationshipReport::from_errors(relationship_errors(&data)),
                data_warnings(&data),
            ),
            Err(e) => (
                RelationshipReport::from_errors(vec![format!(
                    "Error validating relationships: {e}"
                )]),
                Vec::new(),
            ),
        };

        tracing::debug!(
            files = schema.files.len(),
            relationship_errors = relationships.errors.len(),
            "validation finished"
        );

        ValidationReport {
            valid: relationships.valid,
            schema,
            relationships,
            warnings,
        }
    }
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

/// Every dangling cross-file reference in `data`. Checks never short-circuit.
pub fn relationship_errors(data: &DataSet) -> Vec<String> {
    let mut errors = Vec::new();
    let story_ids: HashSet<&str> = data.stories.iter().map(|s| s.id.as_str()).collect();
    let epic_ids: HashSet<&str> = data.epics.iter().map(|e| e.id.as_str()).collect();

    for epic in &data.epics {
        for story_id in &epic.stories {
            if !story_ids.contains(story_id.as_str()) {
                errors.push(format!(
                    "Epic {} references non-existent story {story_id}",
                    epic.id
                ));
            }
        }
    }

    for story in &data.stories {
        if story.has_epic() && !epic_ids.contains(story.epic_id.as_str()) {
            errors.push(format!(
                "Story {} references non-existent epic {}",
                story.id, story.epic_id
            ));
        }
    }

    for sprint in &data.sprints {
        for story_id in &sprint.stories {
            if !story_ids.contains(story_id.as_str()) {
                errors.push(format!(
                    "Sprint {} references non-existent story {story_id}",
                    sprint.name
                ));
            }
        }
    }

    let board = &data.board;
    for (column, assigned) in board.initial_assignments.iter() {
        if !board.has_column(column) {
            errors.push(format!(
                "Board initial assignment references non-existent column {column}"
            ));
        }
        for story_id in assigned {
            if !story_ids.contains(story_id.as_str()) {
                errors.push(format!(
                    "Board initial assignment for column {column} references non-existent story {story_id}"
                ));
            }
        }
    }

    errors
}

/// Data that passes validation but is probably a mistake.
pub fn data_warnings(data: &DataSet) -> Vec<String> {
    let mut warnings = Vec::new();
    for sprint in &data.sprints {
        if sprint.end_date < sprint.start_date {
            warnings.push(format!(
                "Sprint {} ends ({}) before it starts ({})",
                sprint.name, sprint.end_date, sprint.start_date
            ));
        }
    }
    for story in &data.stories {
        if story.story_points > MAX_SEEDED_POINTS {
            warnings.push(format!(
                "Story {} has {} story points, above the pre-seeded range 1-{MAX_SEEDED_POINTS}",
                story.id, story.story_points
            ));
        }
    }
    warnings
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
