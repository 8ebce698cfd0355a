//! Shared test data: a small, fully consistent data set.

use crate::model::{Board, BoardFile, BoardType, DataSet};
use crate::paths;
use serde_json::{json, Value};
use std::path::Path;

pub fn story_json(id: &str, summary: &str, epic_id: &str, points: u32) -> Value {
    json!({
        "id": id,
        "summary": summary,
        "description": format!("Description of {summary}"),
        "epic_id": epic_id,
        "story_points": points,
        "labels": ["backend"],
        "status": "To Do",
    })
}

pub fn board(assignments: &[(&str, &[&str])]) -> Board {
    Board {
        name: "Team Board".to_string(),
        board_type: BoardType::Scrum,
        columns: vec!["To Do".into(), "In Progress".into(), "Done".into()],
        initial_assignments: assignments
            .iter()
            .map(|(column, ids)| (*column, ids.iter().map(|id| id.to_string()).collect()))
            .collect(),
    }
}

/// Board file as a JSON value. Values sort their keys, so use this only
/// when column order does not matter.
pub fn board_json(assignments: &[(&str, &[&str])]) -> Value {
    serde_json::to_value(BoardFile {
        board: board(assignments),
    })
    .unwrap()
}

fn default_board() -> Board {
    board(&[("To Do", &["S-1", "S-3"]), ("In Progress", &["S-2"])])
}

fn files() -> Vec<(&'static str, Value)> {
    vec![
        (
            paths::EPICS_FILE,
            json!([
                {
                    "id": "E-1",
                    "title": "Accounts",
                    "description": "User accounts",
                    "stories": ["S-1", "S-2"],
                },
                {
                    "id": "E-2",
                    "title": "Billing",
                    "description": "Invoices and payments",
                    "stories": ["S-3"],
                }
            ]),
        ),
        (
            paths::STORIES_FILE,
            json!([
                story_json("S-1", "Login form", "E-1", 3),
                story_json("S-2", "Password reset", "E-1", 0),
                story_json("S-3", "Invoice export", "E-2", 5),
            ]),
        ),
        (
            paths::SPRINTS_FILE,
            json!([{
                "name": "Sprint 1",
                "start_date": "2024-03-01",
                "end_date": "2024-03-14",
                "stories": ["S-1", "S-2"],
            }]),
        ),
        (
            paths::VIEWS_FILE,
            json!([{
                "type": "board",
                "name": "Sprint view",
                "columns": ["To Do", "In Progress", "Done"],
            }]),
        ),
        (
            paths::PROJECT_META_FILE,
            json!({
                "project_key": "PMAC",
                "name": "PMaC Demo",
                "description": "Demo project",
            }),
        ),
    ]
}

pub fn write_json(dir: &Path, file: &str, value: Value) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(
        dir.join(file),
        serde_json::to_string_pretty(&value).unwrap(),
    )
    .unwrap();
}

pub fn write_data_dir(dir: &Path) {
    for (file, value) in files() {
        write_json(dir, file, value);
    }
    let board = serde_json::to_string_pretty(&BoardFile {
        board: default_board(),
    })
    .unwrap();
    std::fs::write(dir.join(paths::BOARD_FILE), board).unwrap();
}

pub fn data_set() -> DataSet {
    let mut files: std::collections::HashMap<&str, Value> = files().into_iter().collect();
    let mut take = |f: &str| files.remove(f).unwrap();
    DataSet {
        project: serde_json::from_value(take(paths::PROJECT_META_FILE)).unwrap(),
        epics: serde_json::from_value(take(paths::EPICS_FILE)).unwrap(),
        stories: serde_json::from_value(take(paths::STORIES_FILE)).unwrap(),
        sprints: serde_json::from_value(take(paths::SPRINTS_FILE)).unwrap(),
        board: default_board(),
        views: serde_json::from_value(take(paths::VIEWS_FILE)).unwrap(),
    }
}
