//! Parameter groups and their ordered merge.
//!
//! Simulation parameters arrive as named groups (one file each). Groups are
//! merged in caller-specified order into one immutable [`MergedConfig`].
//! A later group redefining a parameter wins, but the override is never
//! silent: it is logged and recorded, and [`DuplicatePolicy::Reject`] turns
//! it into an error.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::coordinator::DEFAULT_CHARACTER_CONCURRENCY;
use crate::error::ConfigError;

/// One named group of parameters, e.g. `basic` or `marriage`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterGroup {
    pub name: String,
    pub parameters: BTreeMap<String, Value>,
}

impl ParameterGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn with(mut self, parameter: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(parameter.into(), value.into());
        self
    }

    /// Load a group from a `.toml` or `.json` file. The group is named after the file stem.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let parse_err = |detail: String| ConfigError::Parse {
            path: path.to_path_buf(),
            detail,
        };

        let value: Value = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => {
                let table: toml::Table = toml::from_str(&raw).map_err(|e| parse_err(e.to_string()))?;
                serde_json::to_value(table).map_err(|e| parse_err(e.to_string()))?
            }
            Some("json") => serde_json::from_str(&raw).map_err(|e| parse_err(e.to_string()))?,
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        };

        let Value::Object(map) = value else {
            return Err(ConfigError::NotATable(path.to_path_buf()));
        };
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            name,
            parameters: map.into_iter().collect(),
        })
    }
}

/// What to do when a later group redefines a parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Later group wins; the override is logged and recorded.
    #[default]
    Warn,
    /// The first redefinition aborts the merge.
    Reject,
}

/// A parameter defined by more than one group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterOverride {
    pub parameter: String,
    pub previous_group: String,
    pub winning_group: String,
    pub previous_value: Value,
    pub winning_value: Value,
}

/// The flat, immutable parameter namespace.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MergedConfig {
    values: BTreeMap<String, Value>,
    origins: BTreeMap<String, String>,
    overrides: Vec<ParameterOverride>,
}

impl MergedConfig {
    pub fn get(&self, parameter: &str) -> Option<&Value> {
        self.values.get(parameter)
    }

    /// Typed read. `Ok(None)` when the parameter is absent.
    pub fn get_as<T: DeserializeOwned>(&self, parameter: &str) -> Result<Option<T>, ConfigError> {
        self.values
            .get(parameter)
            .map(|v| {
                serde_json::from_value(v.clone()).map_err(|e| ConfigError::InvalidValue {
                    parameter: parameter.to_string(),
                    detail: e.to_string(),
                })
            })
            .transpose()
    }

    /// Name of the group whose value is in effect.
    pub fn origin(&self, parameter: &str) -> Option<&str> {
        self.origins.get(parameter).map(String::as_str)
    }

    pub fn overrides(&self) -> &[ParameterOverride] {
        &self.overrides
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Merge `groups` in order; later groups override earlier ones.
pub fn merge_parameter_groups(
    groups: &[ParameterGroup],
    policy: DuplicatePolicy,
) -> Result<MergedConfig, ConfigError> {
    let mut merged = MergedConfig::default();

    for group in groups {
        for (parameter, value) in &group.parameters {
            if let Some(previous_group) = merged.origins.get(parameter) {
                if policy == DuplicatePolicy::Reject {
                    return Err(ConfigError::DuplicateParameter {
                        parameter: parameter.clone(),
                        previous_group: previous_group.clone(),
                        group: group.name.clone(),
                    });
                }
                warn!(
                    parameter = %parameter,
                    previous_group = %previous_group,
                    winning_group = %group.name,
                    "config parameter overridden by later group"
                );
                merged.overrides.push(ParameterOverride {
                    parameter: parameter.clone(),
                    previous_group: previous_group.clone(),
                    winning_group: group.name.clone(),
                    previous_value: merged.values.get(parameter).cloned().unwrap_or(Value::Null),
                    winning_value: value.clone(),
                });
            }
            merged.values.insert(parameter.clone(), value.clone());
            merged.origins.insert(parameter.clone(), group.name.clone());
        }
        debug!(group = %group.name, parameters = group.parameters.len(), "merged config group");
    }

    Ok(merged)
}

/// Load each file as a group and merge them in the order given.
pub fn load_and_merge(paths: &[PathBuf], policy: DuplicatePolicy) -> Result<MergedConfig, ConfigError> {
    let groups = paths
        .iter()
        .map(|p| ParameterGroup::load(p))
        .collect::<Result<Vec<_>, _>>()?;
    merge_parameter_groups(&groups, policy)
}

/// Export settings drawn from the merged namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSettings {
    /// Directory run roots are created in (`export_root`).
    pub output_base: PathBuf,
    /// Dossier tasks in flight at once (`export_character_concurrency`).
    pub character_concurrency: usize,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            output_base: PathBuf::from("."),
            character_concurrency: DEFAULT_CHARACTER_CONCURRENCY,
        }
    }
}

impl ExportSettings {
    pub const OUTPUT_BASE_KEY: &'static str = "export_root";
    pub const CONCURRENCY_KEY: &'static str = "export_character_concurrency";

    pub fn from_config(config: &MergedConfig) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let output_base = config
            .get_as::<PathBuf>(Self::OUTPUT_BASE_KEY)?
            .unwrap_or(defaults.output_base);
        let character_concurrency = config
            .get_as::<usize>(Self::CONCURRENCY_KEY)?
            .unwrap_or(defaults.character_concurrency);
        if character_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                parameter: Self::CONCURRENCY_KEY.to_string(),
                detail: "must be at least 1".to_string(),
            });
        }
        Ok(Self {
            output_base,
            character_concurrency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_keeps_disjoint_parameters() {
        let basic = ParameterGroup::new("basic").with("town_name", "Lake Hollow");
        let marriage = ParameterGroup::new("marriage").with("min_marriage_age", 18);
        let merged = merge_parameter_groups(&[basic, marriage], DuplicatePolicy::Warn).unwrap();

        assert_eq!(merged.len(), 2);
        assert_eq!(merged.get("town_name"), Some(&json!("Lake Hollow")));
        assert_eq!(merged.origin("min_marriage_age"), Some("marriage"));
        assert!(merged.overrides().is_empty());
    }

    #[test]
    fn test_reject_policy_fails_loudly() {
        let a = ParameterGroup::new("basic").with("x", 1);
        let b = ParameterGroup::new("routine").with("x", 2);
        let err = merge_parameter_groups(&[a, b], DuplicatePolicy::Reject).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::DuplicateParameter { ref parameter, ref previous_group, ref group }
                if parameter == "x" && previous_group == "basic" && group == "routine"
        ));
    }

    #[test]
    fn test_get_as_reports_wrong_type() {
        let merged = merge_parameter_groups(
            &[ParameterGroup::new("g").with("export_character_concurrency", "lots")],
            DuplicatePolicy::Warn,
        )
        .unwrap();
        assert!(matches!(
            ExportSettings::from_config(&merged),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_export_settings_defaults_and_overrides() {
        assert_eq!(
            ExportSettings::from_config(&MergedConfig::default()).unwrap(),
            ExportSettings::default()
        );

        let merged = merge_parameter_groups(
            &[ParameterGroup::new("export")
                .with("export_root", "out")
                .with("export_character_concurrency", 2)],
            DuplicatePolicy::Warn,
        )
        .unwrap();
        let settings = ExportSettings::from_config(&merged).unwrap();
        assert_eq!(settings.output_base, PathBuf::from("out"));
        assert_eq!(settings.character_concurrency, 2);
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let merged = merge_parameter_groups(
            &[ParameterGroup::new("export").with("export_character_concurrency", 0)],
            DuplicatePolicy::Warn,
        )
        .unwrap();
        assert!(ExportSettings::from_config(&merged).is_err());
    }

    #[test]
    fn test_load_toml_and_json_groups() {
        let dir = tempfile::tempdir().unwrap();
        let basic = dir.path().join("basic.toml");
        std::fs::write(&basic, "town_name = \"Lake Hollow\"\nend_year = 1979\n").unwrap();
        let late = dir.path().join("late.json");
        std::fs::write(&late, r#"{"end_year": 1985}"#).unwrap();

        let merged = load_and_merge(&[basic, late], DuplicatePolicy::Warn).unwrap();
        assert_eq!(merged.get("end_year"), Some(&json!(1985)));
        assert_eq!(merged.origin("end_year"), Some("late"));
        assert_eq!(merged.origin("town_name"), Some("basic"));
    }

    #[test]
    fn test_load_rejects_unknown_extension_and_non_tables() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("basic.yaml");
        std::fs::write(&yaml, "x: 1").unwrap();
        assert!(matches!(
            ParameterGroup::load(&yaml),
            Err(ConfigError::UnsupportedFormat(_))
        ));

        let list = dir.path().join("list.json");
        std::fs::write(&list, "[1, 2]").unwrap();
        assert!(matches!(
            ParameterGroup::load(&list),
            Err(ConfigError::NotATable(_))
        ));
    }
}
