use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SweepError};
use crate::settings::SETTINGS_DIR;
use crate::slurm::job::RESULTS_DIR;

pub const NODE_FILE: &str = "node.json";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Contains further sweep directories, one per list value
    Sweep,
    /// Owns scripts, submission scripts and results
    Leaf,
}

/// Written to `.glurmo/node.json` once setup has finished a directory
#[derive(Debug, Deserialize, Serialize)]
struct NodeMarker {
    kind: NodeKind,
    created: DateTime<Utc>,
}

fn marker_path(dir: &Path) -> PathBuf {
    dir.join(SETTINGS_DIR).join(NODE_FILE)
}

pub fn record_kind(dir: &Path, kind: NodeKind) -> Result<()> {
    let path = marker_path(dir);
    let marker = NodeMarker { kind, created: Utc::now() };
    let json = serde_json::to_string_pretty(&marker)
        .map_err(|err| SweepError::parse("node marker", err.to_string()))?;
    fs::write(&path, json).map_err(|err| SweepError::io(&path, err))
}

/// Kind of a sweep directory
///
/// Uses the marker written by setup; directories without one are leaves exactly when they have a
/// `results` subdirectory.
pub fn node_kind(dir: &Path) -> Result<NodeKind> {
    let path = marker_path(dir);
    if path.is_file() {
        let json = fs::read_to_string(&path).map_err(|err| SweepError::io(&path, err))?;
        let marker: NodeMarker = serde_json::from_str(&json)
            .map_err(|err| SweepError::parse(path.display().to_string(), err.to_string()))?;
        return Ok(marker.kind);
    }

    debug!("No node marker in {}, probing for {}", dir.display(), RESULTS_DIR);
    match dir.join(RESULTS_DIR).is_dir() {
        true => Ok(NodeKind::Leaf),
        false => Ok(NodeKind::Sweep),
    }
}

/// Sweep subdirectories of `dir` in directory listing order, skipping the settings directory
pub fn child_nodes(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|err| SweepError::io(dir, err))?;
    let mut children = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| SweepError::io(dir, err))?;
        let file_type = entry.file_type().map_err(|err| SweepError::io(entry.path(), err))?;
        if file_type.is_dir() && entry.file_name() != SETTINGS_DIR {
            children.push(entry.path());
        }
    }
    Ok(children)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn marker_wins_over_probe() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join(SETTINGS_DIR)).unwrap();
        fs::create_dir(dir.path().join(RESULTS_DIR)).unwrap();

        record_kind(dir.path(), NodeKind::Sweep).unwrap();

        assert_eq!(node_kind(dir.path()).unwrap(), NodeKind::Sweep);
    }

    #[test]
    fn results_directory_marks_an_unrecorded_leaf() {
        let dir = tempdir().unwrap();
        assert_eq!(node_kind(dir.path()).unwrap(), NodeKind::Sweep);
        fs::create_dir(dir.path().join(RESULTS_DIR)).unwrap();
        assert_eq!(node_kind(dir.path()).unwrap(), NodeKind::Leaf);
    }

    #[test]
    fn child_nodes_skip_settings_and_files() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join(SETTINGS_DIR)).unwrap();
        fs::create_dir(dir.path().join("alpha_1")).unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let children = child_nodes(dir.path()).unwrap();

        assert_eq!(children, vec![dir.path().join("alpha_1")]);
    }
}
