use std::fs;
use std::path::{Path, PathBuf};

use jsonschema::JSONSchema;
use log::{debug, info, warn};
use serde_json::Value;

use crate::error::{Result, SweepError};
use crate::settings::{legacy, Settings, LEGACY_SETTINGS_FILE, SETTINGS_DIR, SETTINGS_FILE};

/// included JSON schema for settings.json
static SCHEMA: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/schema/settings.json"));

/// Path to the hidden settings directory of a sweep directory, which must exist
pub fn settings_dir(sim_dir: &Path) -> Result<PathBuf> {
    let dir = sim_dir.join(SETTINGS_DIR);
    match dir.is_dir() {
        true => Ok(dir),
        false => Err(SweepError::NotFound { path: dir, what: "settings directory (.glurmo)" }),
    }
}

/// Load and validate the settings of a sweep directory
///
/// `settings.json` is preferred; a legacy `settings.toml` is read only when no JSON file exists.
pub fn load(sim_dir: &Path) -> Result<Settings> {
    let dir = settings_dir(sim_dir)?;
    let json_path = dir.join(SETTINGS_FILE);
    let legacy_path = dir.join(LEGACY_SETTINGS_FILE);

    let settings = if json_path.is_file() {
        read_json(&json_path)?
    } else if legacy_path.is_file() {
        info!("No {} in {}, reading legacy {}", SETTINGS_FILE, dir.display(), LEGACY_SETTINGS_FILE);
        let text = read_file(&legacy_path)?;
        legacy::parse(&text)?
    } else {
        return Err(SweepError::NotFound { path: json_path, what: "settings file (settings.json)" });
    };

    settings.validate()?;
    Ok(settings)
}

/// Persist settings as pretty-printed JSON into `dir/.glurmo/settings.json`
pub fn write(sim_dir: &Path, settings: &Settings) -> Result<()> {
    let path = sim_dir.join(SETTINGS_DIR).join(SETTINGS_FILE);
    let json = serde_json::to_string_pretty(settings)
        .map_err(|err| SweepError::parse("settings", err.to_string()))?;
    debug!("Writing settings to {}", path.display());
    fs::write(&path, json).map_err(|err| SweepError::io(&path, err))
}

fn read_json(path: &Path) -> Result<Settings> {
    let json = parse_untyped_json(path)?;
    match validate(&json) {
        Ok(_) => {
            debug!("Settings at {} are valid", path.display());
            parse_json(path, json)
        }
        Err(err) => {
            warn!("Settings at {} fail validation", path.display());
            Err(err)
        }
    }
}

fn read_file(path: &Path) -> Result<String> {
    debug!("Reading settings at {}", path.display());
    fs::read_to_string(path).map_err(|err| SweepError::io(path, err))
}

fn parse_untyped_json(path: &Path) -> Result<Value> {
    let json_string = read_file(path)?;
    serde_json::from_str::<Value>(&json_string)
        .map_err(|err| SweepError::parse(path.display().to_string(), err.to_string()))
}

fn parse_json(path: &Path, value: Value) -> Result<Settings> {
    serde_json::from_value::<Settings>(value)
        .map_err(|err| SweepError::parse(path.display().to_string(), err.to_string()))
}

/// Check untyped settings against the embedded schema, reporting the first violation
fn validate(json: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(SCHEMA)
        .map_err(|err| SweepError::parse("embedded settings schema", err.to_string()))?;
    let compiled = JSONSchema::compile(&schema)
        .map_err(|err| SweepError::parse("embedded settings schema", err.to_string()))?;

    let result = compiled.validate(json);
    if let Err(mut errors) = result {
        if let Some(error) = errors.next() {
            let pointer = error.instance_path.to_string();
            let key = match pointer.trim_start_matches('/') {
                "" => "settings".to_string(),
                path => path.replace('/', "."),
            };
            return Err(SweepError::validation(key, error.to_string()));
        }
    }
    Ok(())
}
