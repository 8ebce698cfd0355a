pub mod init;
pub mod plan;
pub mod status;
pub mod sync;
pub mod validate;

use anyhow::Context;
use pmac_core::config::Config;
use pmac_core::tracker::ApiMode;
use std::path::{Path, PathBuf};

/// Command-line values that take precedence over `.pmac/config.yaml`.
#[derive(Debug, Default)]
pub struct Overrides {
    pub data_dir: Option<PathBuf>,
    pub repo: Option<String>,
    pub mode: Option<ApiMode>,
}

impl Overrides {
    pub fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(repo) = self.repo.as_deref().filter(|r| !r.is_empty()) {
            config.tracker.repo = repo.to_string();
        }
        if let Some(mode) = self.mode {
            config.tracker.mode = mode;
        }
    }
}

/// Config from disk (or defaults when absent) with overrides applied.
pub fn load_config(root: &Path, overrides: &Overrides) -> anyhow::Result<Config> {
    let mut config = Config::load_or_default(root).context("failed to load config")?;
    overrides.apply(&mut config);
    Ok(config)
}
