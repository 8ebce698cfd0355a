use super::{load_config, Overrides};
use crate::output::{print_json, print_table};
use anyhow::Context;
use pmac_core::model::DataSet;
use pmac_core::sync::issues::IssueSettings;
use pmac_core::sync::{run_sync, SyncOptions, SyncReport};
use pmac_core::tracker;
use pmac_core::validate::Validator;
use std::path::Path;

pub struct SyncArgs {
    pub dry_run: bool,
    pub force: bool,
    pub no_board: bool,
    pub fields: bool,
}

pub fn run(
    root: &Path,
    overrides: &Overrides,
    token: Option<String>,
    args: SyncArgs,
    json: bool,
) -> anyhow::Result<()> {
    let config = load_config(root, overrides)?;
    let data_dir = config.data_dir(root);

    let validation = Validator::new(&data_dir).validate_all();
    if !validation.valid {
        let errors = validation.all_errors();
        if !args.force {
            if !json {
                super::validate::print_report(&validation);
            }
            anyhow::bail!(
                "data validation failed with {} error(s); fix them or pass --force",
                errors.len()
            );
        }
        tracing::warn!(errors = errors.len(), "data is invalid, syncing anyway (--force)");
    }
    for w in &validation.warnings {
        tracing::warn!("{w}");
    }

    let data = DataSet::load(&data_dir)
        .with_context(|| format!("failed to load data from {}", data_dir.display()))?;

    let tracker_config = config.tracker_config(token)?;
    let tracker = tracker::connect(tracker_config).context("failed to connect to GitHub")?;

    let options = SyncOptions {
        dry_run: args.dry_run,
        owner: config.owner().to_string(),
        board: config.board.enabled && !args.no_board,
        fields: config.board.fields || args.fields,
        issues: IssueSettings {
            issue_limit: config.tracker.issue_limit,
        },
    };
    let report = run_sync(tracker.as_ref(), &data, &options).context("sync aborted")?;

    if json {
        print_json(&report)?;
    } else {
        print_sync_report(&report);
    }

    if report.has_failures() {
        anyhow::bail!("sync finished with failures");
    }
    Ok(())
}

fn print_sync_report(report: &SyncReport) {
    let prefix = if report.dry_run { "[dry run] " } else { "" };
    let issues = &report.issues;

    println!(
        "{prefix}Issues: {} created, {} existing, {} failed ({} stories)",
        issues.created, issues.existing, issues.failed, issues.total
    );
    let mut rows: Vec<Vec<String>> = Vec::new();
    for (outcome, items) in [("created", &issues.created_issues), ("existing", &issues.existing_issues)] {
        for item in items {
            rows.push(vec![
                item.story_id.clone(),
                item.issue_number
                    .map(|n| format!("#{n}"))
                    .unwrap_or_else(|| "-".to_string()),
                outcome.to_string(),
                item.title.clone(),
            ]);
        }
    }
    for failure in &issues.failed_issues {
        rows.push(vec![
            failure.story_id.clone(),
            "-".to_string(),
            "failed".to_string(),
            failure.error.clone(),
        ]);
    }
    if !rows.is_empty() {
        print_table(&["STORY", "ISSUE", "OUTCOME", "DETAIL"], rows);
    }

    if !report.dry_run {
        println!(
            "Labels: {} ensured, {} failed",
            issues.labels.ensured.len(),
            issues.labels.failed.len()
        );
        for f in &issues.labels.failed {
            println!("  - {}: {}", f.name, f.error);
        }
    }

    if let Some(board) = &report.board {
        println!();
        if !board.success {
            println!(
                "{prefix}Board '{}': {}",
                board.project_name,
                board.message.as_deref().unwrap_or("failed")
            );
        } else {
            let number = board
                .project_number
                .map(|n| format!("#{n}"))
                .unwrap_or_else(|| "new".to_string());
            let state = match (board.is_new, report.dry_run) {
                (true, true) => "would be created",
                (true, false) => "created",
                (false, _) => "reused",
            };
            println!(
                "{prefix}Board '{}' ({number}, {state}): {} added, {} failed",
                board.project_name, board.added, board.failed
            );
            for f in &board.failed_issues {
                println!("  - {} (#{}) in {}: {}", f.story_id, f.issue_number, f.column, f.error);
            }
        }
    }

    if let Some(fields) = &report.fields {
        println!();
        match &fields.message {
            Some(message) => println!("{prefix}Fields: {message}"),
            None => println!(
                "{prefix}Fields: {} created, {} existing, {} failed",
                fields.created.len(),
                fields.existing.len(),
                fields.failed.len()
            ),
        }
    }
}
