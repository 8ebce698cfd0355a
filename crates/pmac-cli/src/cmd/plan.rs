use super::{load_config, Overrides};
use crate::output::{print_json, print_table};
use anyhow::Context;
use pmac_core::model::DataSet;
use pmac_core::sync::issues::story_to_issue_payload;
use pmac_core::sync::labels::required_labels;
use pmac_core::tracker::NewIssue;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct PlannedIssue<'a> {
    story_id: &'a str,
    #[serde(flatten)]
    issue: NewIssue,
}

#[derive(Serialize)]
struct PlannedLink<'a> {
    story_id: &'a str,
    column: &'a str,
}

pub fn run(root: &Path, overrides: &Overrides, json: bool) -> anyhow::Result<()> {
    let config = load_config(root, overrides)?;
    let data_dir = config.data_dir(root);
    let data = DataSet::load(&data_dir)
        .with_context(|| format!("failed to load data from {}", data_dir.display()))?;

    let epics = data.epic_map();
    let issues: Vec<PlannedIssue> = data
        .stories
        .iter()
        .map(|story| PlannedIssue {
            story_id: &story.id,
            issue: story_to_issue_payload(story, epics.get(story.epic_id.as_str()).copied()),
        })
        .collect();
    let labels = required_labels(&data.stories, &data.epics);
    let links: Vec<PlannedLink> = data
        .board
        .initial_assignments
        .iter()
        .flat_map(|(column, ids)| {
            ids.iter().map(move |id| PlannedLink {
                story_id: id,
                column,
            })
        })
        .collect();

    if json {
        print_json(&serde_json::json!({
            "repo": config.tracker.repo,
            "issues": issues,
            "labels": labels,
            "board": {
                "name": data.board.name,
                "owner": config.owner(),
                "items": links,
            },
        }))?;
        return Ok(());
    }

    println!("Issues ({})", issues.len());
    let rows = issues
        .iter()
        .map(|p| {
            vec![
                p.story_id.to_string(),
                p.issue.title.clone(),
                p.issue.labels.join(", "),
            ]
        })
        .collect();
    print_table(&["STORY", "TITLE", "LABELS"], rows);

    println!();
    println!("Labels ({})", labels.len());
    let rows = labels
        .iter()
        .map(|l| vec![l.name.clone(), l.color.clone(), l.description.clone()])
        .collect();
    print_table(&["NAME", "COLOR", "DESCRIPTION"], rows);

    println!();
    println!("Board '{}' ({} items)", data.board.name, links.len());
    let rows = links
        .iter()
        .map(|l| vec![l.column.to_string(), l.story_id.to_string()])
        .collect();
    print_table(&["COLUMN", "STORY"], rows);
    Ok(())
}
