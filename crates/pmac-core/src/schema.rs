//! Structural schemas for the data files.
//!
//! Each schema is a static tree of [`Schema`] nodes; [`check`] walks a parsed
//! JSON document against it and collects every violation rather than
//! stopping at the first one. Unknown properties are allowed.

use crate::paths;
use chrono::NaiveDate;
use serde_json::Value;

#[derive(Debug)]
pub enum Schema {
    String,
    /// `YYYY-MM-DD`.
    Date,
    Integer { minimum: Option<i64> },
    Enum(&'static [&'static str]),
    Array(&'static Schema),
    Object(&'static [Field]),
    /// Object whose every value must match the inner schema.
    Map(&'static Schema),
}

#[derive(Debug)]
pub struct Field {
    pub name: &'static str,
    pub required: bool,
    pub schema: Schema,
}

impl Field {
    const fn required(name: &'static str, schema: Schema) -> Self {
        Field {
            name,
            required: true,
            schema,
        }
    }

    const fn optional(name: &'static str, schema: Schema) -> Self {
        Field {
            name,
            required: false,
            schema,
        }
    }
}

const STRING_LIST: Schema = Schema::Array(&Schema::String);

pub const STATUS_VALUES: &[&str] = &["To Do", "In Progress", "Review", "Done"];
pub const BOARD_TYPES: &[&str] = &["scrum", "kanban"];

const EPIC_FIELDS: &[Field] = &[
    Field::required("id", Schema::String),
    Field::required("title", Schema::String),
    Field::required("description", Schema::String),
    Field::required("stories", STRING_LIST),
];

const STORY_FIELDS: &[Field] = &[
    Field::required("id", Schema::String),
    Field::required("summary", Schema::String),
    Field::required("description", Schema::String),
    Field::required("epic_id", Schema::String),
    Field::required("story_points", Schema::Integer { minimum: Some(0) }),
    Field::optional("labels", STRING_LIST),
    Field::required("status", Schema::Enum(STATUS_VALUES)),
];

const SPRINT_FIELDS: &[Field] = &[
    Field::required("name", Schema::String),
    Field::required("start_date", Schema::Date),
    Field::required("end_date", Schema::Date),
    Field::required("stories", STRING_LIST),
];

const BOARD_FIELDS: &[Field] = &[
    Field::required("type", Schema::Enum(BOARD_TYPES)),
    Field::required("name", Schema::String),
    Field::required("columns", STRING_LIST),
    Field::required("initial_assignments", Schema::Map(&STRING_LIST)),
];

const VIEW_FIELDS: &[Field] = &[
    Field::required("type", Schema::String),
    Field::required("name", Schema::String),
    Field::required("columns", STRING_LIST),
];

const PROJECT_META_FIELDS: &[Field] = &[
    Field::required("project_key", Schema::String),
    Field::required("name", Schema::String),
    Field::required("description", Schema::String),
];

const BOARD_ROOT_FIELDS: &[Field] = &[Field::required("board", Schema::Object(BOARD_FIELDS))];

const PROJECT_PLAN_FIELDS: &[Field] = &[
    Field::required("project", Schema::Object(PROJECT_META_FIELDS)),
    Field::required("epics", Schema::Array(&Schema::Object(EPIC_FIELDS))),
    Field::required("stories", Schema::Array(&Schema::Object(STORY_FIELDS))),
    Field::required("sprints", Schema::Array(&Schema::Object(SPRINT_FIELDS))),
    Field::required("views", Schema::Array(&Schema::Object(VIEW_FIELDS))),
];

pub static EPICS: Schema = Schema::Array(&Schema::Object(EPIC_FIELDS));
pub static STORIES: Schema = Schema::Array(&Schema::Object(STORY_FIELDS));
pub static SPRINTS: Schema = Schema::Array(&Schema::Object(SPRINT_FIELDS));
pub static BOARD: Schema = Schema::Object(BOARD_ROOT_FIELDS);
pub static VIEWS: Schema = Schema::Array(&Schema::Object(VIEW_FIELDS));
pub static PROJECT_META: Schema = Schema::Object(PROJECT_META_FIELDS);
pub static PROJECT_PLAN: Schema = Schema::Object(PROJECT_PLAN_FIELDS);

/// Schema registered for a data file name.
pub fn schema_for(file: &str) -> Option<&'static Schema> {
    match file {
        paths::EPICS_FILE => Some(&EPICS),
        paths::STORIES_FILE => Some(&STORIES),
        paths::SPRINTS_FILE => Some(&SPRINTS),
        paths::BOARD_FILE => Some(&BOARD),
        paths::VIEWS_FILE => Some(&VIEWS),
        paths::PROJECT_META_FILE => Some(&PROJECT_META),
        paths::PROJECT_PLAN_FILE => Some(&PROJECT_PLAN),
        _ => None,
    }
}

/// Check `value` against `schema`, returning every violation as
/// `path: message` (or just `message` at the document root).
pub fn check(value: &Value, schema: &Schema) -> Vec<String> {
    let mut errors = Vec::new();
    check_at(value, schema, "", &mut errors);
    errors
}

fn check_at(value: &Value, schema: &Schema, path: &str, errors: &mut Vec<String>) {
    match schema {
        Schema::String => {
            if !value.is_string() {
                push(errors, path, format!("{} is not of type 'string'", render(value)));
            }
        }
        Schema::Date => match value.as_str() {
            Some(s) if NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok() => {}
            Some(s) => push(errors, path, format!("'{s}' is not a 'date'")),
            None => push(errors, path, format!("{} is not of type 'string'", render(value))),
        },
        Schema::Integer { minimum } => match integer_value(value) {
            Some(n) => {
                if let Some(min) = minimum {
                    if n < i128::from(*min) {
                        push(errors, path, format!("{n} is less than the minimum of {min}"));
                    }
                }
            }
            None => push(errors, path, format!("{} is not of type 'integer'", render(value))),
        },
        Schema::Enum(allowed) => match value.as_str() {
            Some(s) if allowed.contains(&s) => {}
            _ => push(errors, path, format!(
                "{} is not one of [{}]",
                render(value),
                allowed
                    .iter()
                    .map(|a| format!("'{a}'"))
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
        },
        Schema::Array(item) => match value.as_array() {
            Some(items) => {
                for (i, v) in items.iter().enumerate() {
                    check_at(v, item, &format!("{path}[{i}]"), errors);
                }
            }
            None => push(errors, path, format!("{} is not of type 'array'", render(value))),
        },
        Schema::Object(fields) => match value.as_object() {
            Some(obj) => {
                for field in fields.iter() {
                    match obj.get(field.name) {
                        Some(v) => check_at(v, &field.schema, &join(path, field.name), errors),
                        None if field.required => push(
                            errors,
                            path,
                            format!("'{}' is a required property", field.name),
                        ),
                        None => {}
                    }
                }
            }
            None => push(errors, path, format!("{} is not of type 'object'", render(value))),
        },
        Schema::Map(inner) => match value.as_object() {
            Some(obj) => {
                for (k, v) in obj {
                    check_at(v, inner, &join(path, k), errors);
                }
            }
            None => push(errors, path, format!("{} is not of type 'object'", render(value))),
        },
    }
}

fn push(errors: &mut Vec<String>, path: &str, message: String) {
    if path.is_empty() {
        errors.push(message);
    } else {
        errors.push(format!("{path}: {message}"));
    }
}

fn integer_value(value: &Value) -> Option<i128> {
    value
        .as_i64()
        .map(i128::from)
        .or_else(|| value.as_u64().map(i128::from))
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{s}'"),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn valid_stories_pass() {
        let doc = json!([{
            "id": "S-1",
            "summary": "Login",
            "description": "",
            "epic_id": "E-1",
            "story_points": 3,
            "labels": ["frontend"],
            "status": "To Do",
        }]);
        assert!(check(&doc, &STORIES).is_empty());
    }

    #[test]
    fn story_violations_accumulate_with_paths() {
        let doc = json!([
            {
                "id": "S-1",
                "summary": "Login",
                "description": "",
                "epic_id": "E-1",
                "story_points": -2,
                "status": "Blocked",
            },
            { "id": 7 }
        ]);
        let errors = check(&doc, &STORIES);
        assert!(errors.contains(&"[0].story_points: -2 is less than the minimum of 0".to_string()));
        assert!(errors
            .iter()
            .any(|e| e.starts_with("[0].status: 'Blocked' is not one of")));
        assert!(errors.contains(&"[1].id: 7 is not of type 'string'".to_string()));
        assert!(errors.contains(&"[1]: 'summary' is a required property".to_string()));
    }

    #[test]
    fn root_type_mismatch_has_no_path() {
        let errors = check(&json!({"id": "E-1"}), &EPICS);
        assert_eq!(errors, vec!["{\"id\":\"E-1\"} is not of type 'array'".to_string()]);
    }

    #[test]
    fn sprint_dates_must_be_iso() {
        let doc = json!([{
            "name": "Sprint 1",
            "start_date": "2024-02-30",
            "end_date": "2024-03-14",
            "stories": [],
        }]);
        let errors = check(&doc, &SPRINTS);
        assert_eq!(errors, vec!["[0].start_date: '2024-02-30' is not a 'date'".to_string()]);
    }

    #[test]
    fn board_assignments_must_be_string_lists() {
        let doc = json!({
            "board": {
                "type": "scrum",
                "name": "Board",
                "columns": ["To Do"],
                "initial_assignments": { "To Do": ["S-1", 2] },
            }
        });
        let errors = check(&doc, &BOARD);
        assert_eq!(
            errors,
            vec!["board.initial_assignments.To Do[1]: 2 is not of type 'string'".to_string()]
        );
    }

    #[test]
    fn every_required_file_has_a_schema() {
        for file in paths::REQUIRED_DATA_FILES {
            assert!(schema_for(file).is_some(), "{file}");
        }
        assert!(schema_for("notes.json").is_none());
    }
}
