use crate::error::{PmacError, Result};
use serde::de::DeserializeOwned;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Atomically write `data` to `path` using a tempfile in the same directory.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Create a directory and all parents, idempotent.
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)?;
    Ok(())
}

/// Read and parse a JSON data file. Missing files and malformed JSON both
/// come back as [`PmacError::DataFile`] naming the file.
pub fn read_json(path: &Path) -> Result<serde_json::Value> {
    read_json_as(path)
}

/// Like [`read_json`], but deserializes straight from the file text so
/// object key order reaches the target type intact.
pub fn read_json_as<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = file_label(path);
    let data = std::fs::read_to_string(path).map_err(|e| PmacError::DataFile {
        file: file.clone(),
        message: if e.kind() == std::io::ErrorKind::NotFound {
            "file not found".to_string()
        } else {
            e.to_string()
        },
    })?;
    serde_json::from_str(&data).map_err(|e| PmacError::DataFile {
        message: if e.is_syntax() || e.is_eof() {
            format!("invalid JSON: {e}")
        } else {
            e.to_string()
        },
        file,
    })
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/config.yaml");
        atomic_write(&path, b"version: 1").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "version: 1");
    }

    #[test]
    fn read_json_reports_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = read_json(&dir.path().join("epics.json")).unwrap_err();
        assert_eq!(err.to_string(), "data file epics.json: file not found");
    }

    #[test]
    fn read_json_reports_malformed_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stories.json");
        std::fs::write(&path, "[{\"id\": ").unwrap();
        let err = read_json(&path).unwrap_err();
        assert!(err.to_string().starts_with("data file stories.json: invalid JSON"));
    }
}
