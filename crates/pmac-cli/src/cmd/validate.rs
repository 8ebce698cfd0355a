use super::{load_config, Overrides};
use crate::output::{print_json, print_table, print_warnings};
use pmac_core::validate::{ValidationReport, Validator};
use std::path::Path;

pub fn run(root: &Path, overrides: &Overrides, json: bool) -> anyhow::Result<()> {
    let config = load_config(root, overrides)?;
    let data_dir = config.data_dir(root);
    let report = Validator::new(&data_dir).validate_all();

    if json {
        print_json(&report)?;
    } else {
        println!("Validating {}", data_dir.display());
        print_report(&report);
        print_warnings(&config.validate());
    }

    if !report.valid {
        anyhow::bail!("validation failed");
    }
    Ok(())
}

/// Human rendering shared with `sync`.
pub fn print_report(report: &ValidationReport) {
    let rows = report
        .schema
        .files
        .iter()
        .map(|f| {
            vec![
                f.file.clone(),
                if f.valid { "ok" } else { "invalid" }.to_string(),
                f.errors.len().to_string(),
            ]
        })
        .collect();
    print_table(&["FILE", "STATUS", "ERRORS"], rows);

    for file in report.schema.files.iter().filter(|f| !f.valid) {
        println!();
        println!("{}:", file.file);
        for e in &file.errors {
            println!("  - {e}");
        }
    }

    println!();
    if !report.relationships.checked {
        println!("Relationships: not checked (fix schema errors first)");
    } else if report.relationships.valid {
        println!("Relationships: ok");
    } else {
        println!("Relationships: {} error(s)", report.relationships.errors.len());
        for e in &report.relationships.errors {
            println!("  - {e}");
        }
    }

    for w in &report.warnings {
        println!("[warning] {w}");
    }
}
