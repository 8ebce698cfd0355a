use super::{load_config, Overrides};
use crate::output::{print_json, print_table};
use anyhow::Context;
use pmac_core::tracker;
use std::path::Path;

pub fn run(
    root: &Path,
    overrides: &Overrides,
    token: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let config = load_config(root, overrides)?;
    let tracker_config = config.tracker_config(token)?;
    let mode = tracker_config.mode;
    let tracker = tracker::connect(tracker_config).context("failed to connect to GitHub")?;
    let repo = tracker.repo_info().context("failed to read repository")?;

    if json {
        print_json(&serde_json::json!({
            "authenticated": true,
            "mode": mode.to_string(),
            "repo": repo,
        }))?;
        return Ok(());
    }

    let rows = vec![
        vec!["repository".to_string(), format!("{}/{}", repo.owner, repo.name)],
        vec!["url".to_string(), repo.url.clone()],
        vec!["visibility".to_string(), if repo.private { "private" } else { "public" }.to_string()],
        vec![
            "default branch".to_string(),
            repo.default_branch.clone().unwrap_or_else(|| "-".to_string()),
        ],
        vec!["mode".to_string(), mode.to_string()],
        vec!["board owner".to_string(), config.owner().to_string()],
    ];
    print_table(&["KEY", "VALUE"], rows);
    Ok(())
}
