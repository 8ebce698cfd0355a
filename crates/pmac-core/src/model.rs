//! Domain entities read from the data directory.
//!
//! These are plain read-only inputs to reconciliation. Construction never
//! checks cross-file references; that is the validator's job.

use crate::error::Result;
use crate::io::read_json_as;
use crate::paths;
use chrono::NaiveDate;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Status {
    #[default]
    #[serde(rename = "To Do")]
    ToDo,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Review")]
    Review,
    #[serde(rename = "Done")]
    Done,
}

impl Status {
    pub fn all() -> &'static [Status] {
        &[Status::ToDo, Status::InProgress, Status::Review, Status::Done]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::ToDo => "To Do",
            Status::InProgress => "In Progress",
            Status::Review => "Review",
            Status::Done => "Done",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Epic / Story
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Epic {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Story ids this epic claims to own, in declared order.
    #[serde(default)]
    pub stories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub id: String,
    pub summary: String,
    #[serde(default)]
    pub description: String,
    /// Empty when the story belongs to no epic.
    #[serde(default)]
    pub epic_id: String,
    #[serde(default)]
    pub story_points: u32,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub status: Status,
}

impl Story {
    pub fn has_epic(&self) -> bool {
        !self.epic_id.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Sprint
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sprint {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub stories: Vec<String>,
}

// ---------------------------------------------------------------------------
// Board
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardType {
    #[default]
    Scrum,
    Kanban,
}

impl fmt::Display for BoardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoardType::Scrum => f.write_str("scrum"),
            BoardType::Kanban => f.write_str("kanban"),
        }
    }
}

/// Column name → story ids, kept in the order the columns were declared in
/// the source file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assignments(Vec<(String, Vec<String>)>);

impl Assignments {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(c, ids)| (c.as_str(), ids.as_slice()))
    }

    pub fn get(&self, column: &str) -> Option<&[String]> {
        self.0
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, ids)| ids.as_slice())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(c, _)| c.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<C: Into<String>> FromIterator<(C, Vec<String>)> for Assignments {
    fn from_iter<I: IntoIterator<Item = (C, Vec<String>)>>(iter: I) -> Self {
        let mut out: Vec<(String, Vec<String>)> = Vec::new();
        for (column, ids) in iter {
            let column = column.into();
            match out.iter_mut().find(|(c, _)| *c == column) {
                Some((_, existing)) => *existing = ids,
                None => out.push((column, ids)),
            }
        }
        Assignments(out)
    }
}

impl Serialize for Assignments {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (column, ids) in &self.0 {
            map.serialize_entry(column, ids)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Assignments {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct AssignmentsVisitor;

        impl<'de> Visitor<'de> for AssignmentsVisitor {
            type Value = Assignments;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of column name to story ids")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Assignments, A::Error> {
                let mut entries: Vec<(String, Vec<String>)> = Vec::new();
                while let Some((column, ids)) = access.next_entry::<String, Vec<String>>()? {
                    entries.push((column, ids));
                }
                Ok(entries.into_iter().collect())
            }
        }

        deserializer.deserialize_map(AssignmentsVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub name: String,
    #[serde(rename = "type", default)]
    pub board_type: BoardType,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub initial_assignments: Assignments,
}

impl Board {
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

/// On-disk shape of `scrum_board.json`: the board sits under a `board` key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardFile {
    pub board: Board,
}

// ---------------------------------------------------------------------------
// View / ProjectMeta
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct View {
    #[serde(rename = "type")]
    pub view_type: String,
    pub name: String,
    #[serde(default)]
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectMeta {
    pub project_key: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

// ---------------------------------------------------------------------------
// DataSet
// ---------------------------------------------------------------------------

/// Everything declared in a data directory, loaded fresh on every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSet {
    pub project: ProjectMeta,
    pub epics: Vec<Epic>,
    pub stories: Vec<Story>,
    pub sprints: Vec<Sprint>,
    pub board: Board,
    pub views: Vec<View>,
}

impl DataSet {
    pub fn load(data_dir: &Path) -> Result<Self> {
        let board: BoardFile = load_file(data_dir, paths::BOARD_FILE)?;
        Ok(Self {
            project: load_file(data_dir, paths::PROJECT_META_FILE)?,
            epics: load_file(data_dir, paths::EPICS_FILE)?,
            stories: load_file(data_dir, paths::STORIES_FILE)?,
            sprints: load_file(data_dir, paths::SPRINTS_FILE)?,
            board: board.board,
            views: load_file(data_dir, paths::VIEWS_FILE)?,
        })
    }

    pub fn epic(&self, id: &str) -> Option<&Epic> {
        self.epics.iter().find(|e| e.id == id)
    }

    pub fn story(&self, id: &str) -> Option<&Story> {
        self.stories.iter().find(|s| s.id == id)
    }

    pub fn epic_map(&self) -> HashMap<&str, &Epic> {
        self.epics.iter().map(|e| (e.id.as_str(), e)).collect()
    }
}

fn load_file<T: serde::de::DeserializeOwned>(data_dir: &Path, file: &str) -> Result<T> {
    read_json_as(&paths::data_file(data_dir, file))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
