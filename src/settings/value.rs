use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{Result, SweepError};

/// A scheduler setting: either a plain string or a nested table of further settings
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SettingValue {
    Scalar(String),
    Nested(BTreeMap<String, SettingValue>),
}

impl SettingValue {
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            SettingValue::Scalar(s) => Some(s),
            SettingValue::Nested(_) => None,
        }
    }
}

impl TryFrom<Value> for SettingValue {
    type Error = String;

    fn try_from(value: Value) -> std::result::Result<Self, Self::Error> {
        match value {
            Value::String(s) => Ok(SettingValue::Scalar(s)),
            Value::Object(map) => {
                let mut nested = BTreeMap::new();
                for (key, inner) in map {
                    let converted = SettingValue::try_from(inner)
                        .map_err(|err| format!("in `{}`: {}", key, err))?;
                    nested.insert(key, converted);
                }
                Ok(SettingValue::Nested(nested))
            }
            other => Err(format!("expected a string or table, found `{}`", other)),
        }
    }
}

impl<'de> Deserialize<'de> for SettingValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        SettingValue::try_from(value).map_err(serde::de::Error::custom)
    }
}

/// Flatten nested scheduler settings into template bindings
///
/// Nested keys are joined with `_`, so `{"mem": {"per_cpu": "2G"}}` binds `mem_per_cpu`. Two paths
/// flattening to the same key are rejected rather than letting one silently win.
pub fn flatten(settings: &BTreeMap<String, SettingValue>) -> Result<BTreeMap<String, String>> {
    let mut flat = BTreeMap::new();
    flatten_into(&mut flat, None, settings)?;
    Ok(flat)
}

fn flatten_into(
    flat: &mut BTreeMap<String, String>,
    prefix: Option<&str>,
    settings: &BTreeMap<String, SettingValue>,
) -> Result<()> {
    for (key, value) in settings {
        let name = match prefix {
            Some(prefix) => format!("{}_{}", prefix, key),
            None => key.clone(),
        };
        match value {
            SettingValue::Scalar(s) => {
                if flat.insert(name.clone(), s.clone()).is_some() {
                    return Err(SweepError::validation(
                        format!("slurm.{}", name),
                        "flattened nested settings collide with an existing key",
                    ));
                }
            }
            SettingValue::Nested(inner) => flatten_into(flat, Some(&name), inner)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn nested_tables_flatten_with_underscores() {
        let parsed: BTreeMap<String, SettingValue> = serde_json::from_value(json!({
            "time": "01:00:00",
            "mem": { "per_cpu": "2G", "gpu": { "count": "1" } }
        })).unwrap();

        let flat = flatten(&parsed).unwrap();

        assert_eq!(flat["time"], "01:00:00");
        assert_eq!(flat["mem_per_cpu"], "2G");
        assert_eq!(flat["mem_gpu_count"], "1");
    }

    #[test]
    fn non_string_leaves_are_rejected() {
        let parsed = serde_json::from_value::<BTreeMap<String, SettingValue>>(json!({
            "mem": { "per_cpu": 2 }
        }));
        let err = parsed.unwrap_err().to_string();
        assert!(err.contains("per_cpu"), "{}", err);
    }

    #[test]
    fn colliding_flattened_keys_fail() {
        let parsed: BTreeMap<String, SettingValue> = serde_json::from_value(json!({
            "mem_per_cpu": "1G",
            "mem": { "per_cpu": "2G" }
        })).unwrap();
        assert!(matches!(flatten(&parsed), Err(SweepError::Validation { .. })));
    }

    #[test]
    fn nested_values_serialise_back_to_plain_json() {
        let value = SettingValue::Nested(BTreeMap::from([
            ("per_cpu".to_string(), SettingValue::Scalar("2G".to_string())),
        ]));
        assert_eq!(serde_json::to_value(&value).unwrap(), json!({ "per_cpu": "2G" }));
    }
}
