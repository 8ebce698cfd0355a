use super::{load_config, Overrides};
use crate::output::{print_json, print_warnings};
use anyhow::Context;
use pmac_core::{config::Config, io, paths};
use std::path::Path;

pub fn run(root: &Path, overrides: &Overrides, force: bool, json: bool) -> anyhow::Result<()> {
    let config_path = paths::config_path(root);
    let exists = config_path.exists();

    let config = if exists && !force {
        load_config(root, overrides)?
    } else {
        let mut config = Config::default();
        overrides.apply(&mut config);
        config.save(root).context("failed to write config.yaml")?;
        config
    };
    let written = !exists || force;

    let data_dir = config.data_dir(root);
    io::ensure_dir(&data_dir)
        .with_context(|| format!("failed to create {}", data_dir.display()))?;

    let warnings = config.validate();
    if json {
        print_json(&serde_json::json!({
            "root": root,
            "config": config_path,
            "written": written,
            "data_dir": data_dir,
            "config_values": config,
            "warnings": warnings,
        }))?;
        return Ok(());
    }

    println!("Initializing pmac in: {}", root.display());
    if written {
        println!("  created: {}", paths::CONFIG_FILE);
    } else {
        println!("  exists:  {} (use --force to overwrite)", paths::CONFIG_FILE);
    }
    println!("  data:    {}", data_dir.display());
    print_warnings(&warnings);
    Ok(())
}
