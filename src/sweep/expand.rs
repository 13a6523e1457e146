use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::error::{Result, SweepError};
use crate::settings::list::unpack_list;
use crate::settings::{load, Settings, SCRIPT_TEMPLATE, SETTINGS_DIR, SLURM_TEMPLATE};
use crate::slurm::job::{materialize, SCRIPTS_DIR, SLURM_DIR};
use crate::sweep::confirm::Confirm;
use crate::sweep::node::{record_kind, NodeKind};

/// Set up a sweep directory and, recursively, everything below it
///
/// With no list variable in `script` the directory becomes a leaf and its scripts are rendered.
/// Otherwise the first list variable (by name) is expanded into one `{variable}_{value}`
/// subdirectory per value, each with its own copy of the templates and settings, and setup
/// recurses into it. Existing subdirectories of the same name are replaced.
///
/// If any branch fails, every subdirectory created at this level is removed before the error is
/// returned.
pub fn expand(dir: &Path, settings: &Settings, check_empty: bool, confirm: &dyn Confirm) -> Result<NodeKind> {
    if check_empty {
        let extra = extra_entries(dir)?;
        if !extra.is_empty() && !confirm.confirm(dir, &extra) {
            return Err(SweepError::UserCancelled);
        }
    }

    settings.validate()?;

    let (variable, raw) = match settings.first_list_variable() {
        Some(found) => found,
        None => {
            materialize(dir, settings)?;
            record_kind(dir, NodeKind::Leaf)?;
            return Ok(NodeKind::Leaf);
        }
    };

    let values = unpack_list(raw)?;
    if values.is_empty() {
        return Err(SweepError::EmptyList { variable: variable.to_string() });
    }

    let mut created: Vec<PathBuf> = Vec::with_capacity(values.len());
    for value in &values {
        if let Err(err) = expand_branch(dir, settings, variable, value, &mut created, confirm) {
            if let Err(cleanup_err) = remove_all(&created) {
                warn!("Could not clean up directories in {}: {}", dir.display(), cleanup_err);
            }
            return Err(err);
        }
    }

    record_kind(dir, NodeKind::Sweep)?;
    Ok(NodeKind::Sweep)
}

fn expand_branch(
    dir: &Path,
    settings: &Settings,
    variable: &str,
    value: &str,
    created: &mut Vec<PathBuf>,
    confirm: &dyn Confirm,
) -> Result<()> {
    if value.contains('/') || value == "." || value == ".." {
        return Err(SweepError::validation(
            format!("script.{}", variable),
            format!("list value `{}` cannot be used in a directory name", value),
        ));
    }

    let branch = settings.with_override(variable, value);
    let child = dir.join(format!("{}_{}", variable, value));

    remove_if_exists(&child)?;
    fs::create_dir(&child).map_err(|err| SweepError::io(&child, err))?;
    created.push(child.clone());

    let child_settings = child.join(SETTINGS_DIR);
    fs::create_dir(&child_settings).map_err(|err| SweepError::io(&child_settings, err))?;
    for template in [SCRIPT_TEMPLATE, SLURM_TEMPLATE] {
        let from = dir.join(SETTINGS_DIR).join(template);
        let to = child_settings.join(template);
        fs::copy(&from, &to).map_err(|err| match err.kind() {
            ErrorKind::NotFound => SweepError::NotFound { path: from.clone(), what: "template" },
            _ => SweepError::io(&to, err),
        })?;
    }
    load::write(&child, &branch)?;

    info!("Creating {} ...", child.display());
    expand(&child, &branch, false, confirm)?;
    Ok(())
}

/// Entries of `dir` other than the settings directory, sorted for display
fn extra_entries(dir: &Path) -> Result<Vec<String>> {
    let entries = fs::read_dir(dir).map_err(|err| SweepError::io(dir, err))?;
    let mut extra = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| SweepError::io(dir, err))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name != SETTINGS_DIR {
            extra.push(name);
        }
    }
    extra.sort();
    Ok(extra)
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => {
            warn!("Replaced existing directory {}", path.display());
            Ok(())
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(SweepError::io(path, err)),
    }
}

fn remove_all(paths: &[PathBuf]) -> Result<()> {
    for path in paths {
        match fs::remove_dir_all(path) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(SweepError::io(path, err)),
        }
    }
    Ok(())
}

/// Remove the generated `scripts` and `slurm` directories of a leaf after a failed setup
pub fn cleanup_leaf_outputs(dir: &Path) -> Result<()> {
    remove_all(&[dir.join(SCRIPTS_DIR), dir.join(SLURM_DIR)])
}
