use std::collections::BTreeMap;

use crate::error::{Result, SweepError};

pub const LIST_PREFIX: &str = "@[";
pub const LIST_SUFFIX: &str = "]";

/// All list variables of a settings section, keyed (and so ordered) by variable name
pub fn list_variables(section: &BTreeMap<String, String>) -> BTreeMap<&str, &str> {
    section.iter()
        .filter(|(_, value)| value.starts_with(LIST_PREFIX))
        .map(|(name, value)| (name.as_str(), value.as_str()))
        .collect()
}

/// Unpack `@[v1, v2, ...]` into its values, in list order
///
/// Values are trimmed. `@[]` unpacks to an empty list; the caller decides whether that is an error.
pub fn unpack_list(raw: &str) -> Result<Vec<String>> {
    let inner = raw.strip_prefix(LIST_PREFIX)
        .and_then(|rest| rest.strip_suffix(LIST_SUFFIX))
        .ok_or_else(|| SweepError::parse(
            format!("list `{}`", raw),
            "malformed list - lists must be enclosed by @[ ... ]",
        ))?;

    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }

    inner.split(',')
        .map(str::trim)
        .map(|value| match value.is_empty() {
            true => Err(SweepError::parse(format!("list `{}`", raw), "list contains an empty value")),
            false => Ok(value.to_string()),
        })
        .collect()
}
