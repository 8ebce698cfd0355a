use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const PMAC_DIR: &str = ".pmac";
pub const CONFIG_FILE: &str = ".pmac/config.yaml";
pub const DEFAULT_DATA_DIR: &str = "data";

// ---------------------------------------------------------------------------
// Data files
// ---------------------------------------------------------------------------

pub const EPICS_FILE: &str = "epics.json";
pub const STORIES_FILE: &str = "stories.json";
pub const SPRINTS_FILE: &str = "sprints.json";
pub const BOARD_FILE: &str = "scrum_board.json";
pub const VIEWS_FILE: &str = "views.json";
pub const PROJECT_META_FILE: &str = "project_meta.json";
pub const PROJECT_PLAN_FILE: &str = "project_plan.json";

/// Files every data set must provide, in validation order.
pub const REQUIRED_DATA_FILES: &[&str] = &[
    EPICS_FILE,
    STORIES_FILE,
    SPRINTS_FILE,
    BOARD_FILE,
    VIEWS_FILE,
    PROJECT_META_FILE,
];

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn pmac_dir(root: &Path) -> PathBuf {
    root.join(PMAC_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Resolve the data directory. Relative paths are anchored at `root`.
pub fn data_dir(root: &Path, configured: &Path) -> PathBuf {
    if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        root.join(configured)
    }
}

pub fn data_file(data_dir: &Path, file: &str) -> PathBuf {
    data_dir.join(file)
}
