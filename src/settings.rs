//! Typed settings of one sweep directory
//!
//! Every sweep directory carries a hidden `.glurmo` directory holding `settings.json` and the two
//! templates. Settings are immutable once loaded: expansion derives child settings through
//! [`Settings::with_override`] instead of mutating a shared map.

/// Scheduler values that may nest
pub mod value;
/// Detect and unpack `@[...]` list variables
pub mod list;
/// Read, validate, and write `settings.json`
pub mod load;
/// Older `[section]` / `key = value` settings format
pub mod legacy;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SweepError};
use crate::settings::value::SettingValue;

/// Name of the hidden directory holding settings and templates
pub const SETTINGS_DIR: &str = ".glurmo";
pub const SETTINGS_FILE: &str = "settings.json";
pub const LEGACY_SETTINGS_FILE: &str = "settings.toml";
pub const SCRIPT_TEMPLATE: &str = "script_template";
pub const SLURM_TEMPLATE: &str = "slurm_template";

/// Separator between a composite id and a job index, load-bearing for queue matching
pub const JOB_SEPARATOR: &str = "___";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    general: BTreeMap<String, String>,
    #[serde(default)]
    script: BTreeMap<String, String>,
    #[serde(default, alias = "scheduler")]
    slurm: BTreeMap<String, SettingValue>,
}

impl Settings {
    pub fn new(
        general: BTreeMap<String, String>,
        script: BTreeMap<String, String>,
        slurm: BTreeMap<String, SettingValue>,
    ) -> Settings {
        Settings { general, script, slurm }
    }

    pub fn general(&self) -> &BTreeMap<String, String> {
        &self.general
    }

    pub fn script(&self) -> &BTreeMap<String, String> {
        &self.script
    }

    pub fn slurm(&self) -> &BTreeMap<String, SettingValue> {
        &self.slurm
    }

    /// Composite id, also the prefix of every job name in this directory
    pub fn id(&self) -> Result<&str> {
        match self.general.get("id") {
            Some(id) if !id.is_empty() => Ok(id),
            Some(_) => Err(SweepError::validation("general.id", "must not be empty")),
            None => Err(SweepError::validation("general.id", "must be specified in the general section")),
        }
    }

    pub fn n_sims(&self) -> Result<usize> {
        let raw = self.general.get("n_sims")
            .ok_or_else(|| SweepError::validation("general.n_sims", "must be specified in the general section"))?;
        raw.trim().parse::<usize>()
            .map_err(|_| SweepError::validation("general.n_sims", format!("`{}` is not a non-negative integer", raw)))
    }

    /// File extension of generated scripts, including the leading dot if any
    pub fn extension(&self) -> Result<&str> {
        self.script.get("extension")
            .map(String::as_str)
            .ok_or_else(|| SweepError::validation("script.extension", "script file extension must be specified"))
    }

    /// Extension of result files; empty when unset, which accepts any result file
    pub fn result_extension(&self) -> &str {
        self.script.get("result_extension").map(String::as_str).unwrap_or("")
    }

    /// `slurm.simulation_id` if it is a plain string, else the composite id
    pub fn simulation_id(&self) -> Result<&str> {
        match self.slurm.get("simulation_id").and_then(SettingValue::as_scalar) {
            Some(id) => Ok(id),
            None => self.id(),
        }
    }

    /// Check everything later stages rely on, failing on the first problem
    pub fn validate(&self) -> Result<()> {
        let id = self.id()?;
        if id.contains(JOB_SEPARATOR) {
            return Err(SweepError::validation(
                "general.id",
                format!("`{}` must not contain the job separator `{}`", id, JOB_SEPARATOR),
            ));
        }
        self.n_sims()?;
        self.extension()?;
        self.simulation_id()?;
        value::flatten(&self.slurm)?;
        Ok(())
    }

    /// Settings for one branch of a list expansion: the variable takes `value` and the value is
    /// appended to the composite id
    pub fn with_override(&self, variable: &str, value: &str) -> Settings {
        let mut branch = self.clone();
        branch.script.insert(variable.to_string(), value.to_string());
        let id = match self.general.get("id") {
            Some(id) => format!("{}_{}", id, value),
            None => value.to_string(),
        };
        branch.general.insert("id".to_string(), id);
        branch
    }

    /// The list variable expanded at this level: the lexicographically smallest one in `script`
    pub fn first_list_variable(&self) -> Option<(&str, &str)> {
        list::list_variables(&self.script).into_iter().next()
    }
}
