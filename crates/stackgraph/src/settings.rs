//! Settings resolution
//!
//! Merges schema defaults with externally supplied overrides. Overrides
//! always win when present and non-empty; unknown keys are rejected. The
//! result is an immutable [`Settings`] value that callers pass around
//! explicitly.

use crate::error::ConfigError;
use crate::types::{SlotType, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where a resolved setting came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingSource {
    Default,
    Override,
}

/// A recognized setting with its default
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingSpec {
    pub key: String,
    pub ty: SlotType,
    /// Default in text form, parsed as `ty` during resolution
    pub default: String,
    #[serde(default)]
    pub description: String,
}

/// The set of recognized settings, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsSchema {
    specs: Vec<SettingSpec>,
}

impl SettingsSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a setting, replacing any earlier declaration of the same key
    pub fn setting(
        mut self,
        key: impl Into<String>,
        ty: SlotType,
        default: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let spec = SettingSpec {
            key: key.into(),
            ty,
            default: default.into(),
            description: description.into(),
        };
        match self.specs.iter_mut().find(|s| s.key == spec.key) {
            Some(existing) => *existing = spec,
            None => self.specs.push(spec),
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&SettingSpec> {
        self.specs.iter().find(|s| s.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SettingSpec> {
        self.specs.iter()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

/// A resolved setting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: Value,
    pub source: SettingSource,
}

/// Validated settings, in schema order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    entries: Vec<Setting>,
}

impl Settings {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.setting(key).map(|s| &s.value)
    }

    pub fn setting(&self, key: &str) -> Option<&Setting> {
        self.entries.iter().find(|s| s.key == key)
    }

    /// Text of a string-like setting
    pub fn str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn integer(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_integer)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Setting> {
        self.entries.iter()
    }

    /// Settings whose value came from an override
    pub fn overridden(&self) -> impl Iterator<Item = &Setting> {
        self.entries
            .iter()
            .filter(|s| s.source == SettingSource::Override)
    }

    /// Resolved values keyed by setting name
    pub fn values(&self) -> BTreeMap<&str, &Value> {
        self.entries
            .iter()
            .map(|s| (s.key.as_str(), &s.value))
            .collect()
    }

    /// Turn the resolved values back into a schema of defaults
    ///
    /// Resolving that schema with no overrides yields the same values.
    pub fn as_schema(&self, original: &SettingsSchema) -> SettingsSchema {
        self.entries.iter().fold(SettingsSchema::new(), |schema, s| {
            let description = original
                .get(&s.key)
                .map(|spec| spec.description.clone())
                .unwrap_or_default();
            schema.setting(s.key.clone(), s.value.ty(), s.value.to_string(), description)
        })
    }
}

/// Resolve settings from schema defaults and overrides
///
/// For each recognized key the override wins when present and non-empty.
/// Overrides for unknown keys and overrides that do not parse as the
/// setting's type fail with [`ConfigError`].
pub fn resolve(
    defaults: &SettingsSchema,
    overrides: &BTreeMap<String, String>,
) -> Result<Settings, ConfigError> {
    if let Some(key) = overrides.keys().find(|k| !defaults.contains(k)) {
        return Err(ConfigError::UnknownKey { key: key.clone() });
    }

    let mut entries = Vec::with_capacity(defaults.len());
    for spec in defaults.iter() {
        let supplied = overrides
            .get(&spec.key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty());

        let setting = match supplied {
            Some(raw) => Setting {
                key: spec.key.clone(),
                value: Value::parse(spec.ty, raw).map_err(|reason| {
                    ConfigError::InvalidValue {
                        key: spec.key.clone(),
                        value: raw.to_string(),
                        reason,
                    }
                })?,
                source: SettingSource::Override,
            },
            None => Setting {
                key: spec.key.clone(),
                value: Value::parse(spec.ty, &spec.default).map_err(|reason| {
                    ConfigError::InvalidDefault {
                        key: spec.key.clone(),
                        reason,
                    }
                })?,
                source: SettingSource::Default,
            },
        };
        log::trace!("setting {} = {} ({:?})", setting.key, setting.value, setting.source);
        entries.push(setting);
    }

    Ok(Settings { entries })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> SettingsSchema {
        SettingsSchema::new()
            .setting("vpc_name", SlotType::String, "lab-vpc", "Name tag of the VPC")
            .setting("instance_type", SlotType::InstanceType, "t2.micro", "")
            .setting("ssh_location", SlotType::Cidr, "0.0.0.0/0", "")
            .setting("max_capacity", SlotType::Integer, "3", "")
    }

    fn overrides(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_only() {
        let settings = resolve(&schema(), &BTreeMap::new()).unwrap();
        assert_eq!(settings.str("vpc_name"), Some("lab-vpc"));
        assert_eq!(settings.integer("max_capacity"), Some(3));
        assert_eq!(settings.overridden().count(), 0);
    }

    #[test]
    fn test_override_wins() {
        let settings = resolve(&schema(), &overrides(&[("instance_type", "m5.large")])).unwrap();
        let setting = settings.setting("instance_type").unwrap();
        assert_eq!(setting.value, Value::InstanceType("m5.large".into()));
        assert_eq!(setting.source, SettingSource::Override);
    }

    #[test]
    fn test_empty_override_falls_back_to_default() {
        let settings = resolve(&schema(), &overrides(&[("vpc_name", "  ")])).unwrap();
        let setting = settings.setting("vpc_name").unwrap();
        assert_eq!(setting.value, Value::String("lab-vpc".into()));
        assert_eq!(setting.source, SettingSource::Default);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = resolve(&schema(), &overrides(&[("vpc_nmae", "x")])).unwrap_err();
        assert_eq!(err, ConfigError::UnknownKey { key: "vpc_nmae".into() });
    }

    #[test]
    fn test_invalid_override_rejected() {
        let err = resolve(&schema(), &overrides(&[("ssh_location", "anywhere")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref key, .. } if key == "ssh_location"
        ));
    }

    #[test]
    fn test_invalid_default_rejected() {
        let bad = SettingsSchema::new().setting("count", SlotType::Integer, "many", "");
        let err = resolve(&bad, &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDefault { .. }));
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let defaults = schema();
        let first = resolve(
            &defaults,
            &overrides(&[("instance_type", "c5.xlarge"), ("max_capacity", "5")]),
        )
        .unwrap();
        let again = resolve(&first.as_schema(&defaults), &BTreeMap::new()).unwrap();
        assert_eq!(first.values(), again.values());
    }

    #[test]
    fn test_redeclared_setting_replaces() {
        let schema = schema().setting("vpc_name", SlotType::String, "other", "");
        assert_eq!(schema.len(), 4);
        assert_eq!(schema.get("vpc_name").unwrap().default, "other");
    }
}
