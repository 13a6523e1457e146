//! Parse the older `settings.toml` layout:
//!
//! ```text
//! [general]        # or [simulation]
//! id = "sim"
//! n_sims = 100
//! [script]
//! extension = .R
//! [slurm]          # or [scheduler]
//! time = 01:00:00
//! ```
//!
//! Only flat string values are supported. A key repeated within a section is rejected with its line
//! number instead of letting either occurrence win.

use std::collections::BTreeMap;

use crate::error::{Result, SweepError};
use crate::settings::value::SettingValue;
use crate::settings::Settings;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Section {
    General,
    Script,
    Slurm,
}

impl Section {
    fn from_header(name: &str) -> Option<Section> {
        match name {
            "general" | "simulation" => Some(Section::General),
            "script" => Some(Section::Script),
            "slurm" | "scheduler" => Some(Section::Slurm),
            _ => None,
        }
    }
}

pub fn parse(text: &str) -> Result<Settings> {
    let mut general = BTreeMap::new();
    let mut script = BTreeMap::new();
    let mut slurm = BTreeMap::new();
    let mut section: Option<Section> = None;

    for (i, raw_line) in text.lines().enumerate() {
        let line_number = i + 1;
        let line = strip_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        if let Some(header) = line.strip_prefix('[') {
            let name = header.strip_suffix(']')
                .ok_or_else(|| malformed(line_number, "section header is missing `]`"))?;
            section = Some(Section::from_header(name.trim())
                .ok_or_else(|| malformed(line_number, &format!("unknown section [{}]", name.trim())))?);
            continue;
        }

        let (key, value) = line.split_once('=')
            .ok_or_else(|| malformed(line_number, "expected `key = value`"))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(malformed(line_number, "setting has an empty key"));
        }
        let value = unquote(value.trim()).to_string();

        let inserted = match section {
            Some(Section::General) => general.insert(key.to_string(), value).is_none(),
            Some(Section::Script) => script.insert(key.to_string(), value).is_none(),
            Some(Section::Slurm) => slurm.insert(key.to_string(), SettingValue::Scalar(value)).is_none(),
            None => return Err(malformed(line_number, "settings must be inside a [general], [script], or [slurm] section")),
        };
        if !inserted {
            return Err(SweepError::DuplicateKey { key: key.to_string(), line: line_number });
        }
    }

    Ok(Settings::new(general, script, slurm))
}

/// Drop a trailing `#` comment unless the `#` sits inside quotes
fn strip_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    for (i, c) in line.char_indices() {
        match (quote, c) {
            (None, '#') => return &line[..i],
            (None, '"') | (None, '\'') => quote = Some(c),
            (Some(q), c) if q == c => quote = None,
            _ => {}
        }
    }
    line
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

fn malformed(line: usize, reason: &str) -> SweepError {
    SweepError::parse(format!("settings.toml line {}", line), reason)
}
