//! Settings registry
//!
//! A small key/value store that the audio driver reads its configuration
//! from. Keys follow the `section/subsection/name` convention. A key may be
//! shadowed by a feature override named `key.<feature>` while that feature
//! is active; the host OS name is active by default.

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;

use crate::config::Config;

/// Speaker mode setting (enum ordinal)
pub const SPEAKER_MODE_KEY: &str = "audio/driver/speaker_mode";
/// Output mix rate setting (Hz)
pub const MIX_RATE_KEY: &str = "audio/driver/mix_rate";

/// A setting value
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
}

impl SettingValue {
    /// Integer view of the value, if it is one
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "\"{v}\""),
        }
    }
}

impl From<i64> for SettingValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for SettingValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for SettingValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

/// Editor hint attached to a setting
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PropertyHint {
    #[default]
    None,
    /// Comma-separated list of names, indexed by ordinal
    Enum(String),
}

/// Metadata describing a setting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyInfo {
    pub key: String,
    pub hint: PropertyHint,
    /// Changing the value only takes effect after a restart
    pub restart_if_changed: bool,
}

impl PropertyInfo {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            hint: PropertyHint::None,
            restart_if_changed: false,
        }
    }

    pub fn with_hint(mut self, hint: PropertyHint) -> Self {
        self.hint = hint;
        self
    }

    pub fn restart_required(mut self) -> Self {
        self.restart_if_changed = true;
        self
    }
}

#[derive(Debug, Clone)]
struct SettingEntry {
    value: SettingValue,
    default: Option<SettingValue>,
    info: Option<PropertyInfo>,
}

/// Settings registry
pub struct ProjectSettings {
    entries: RwLock<HashMap<String, SettingEntry>>,
    features: RwLock<Vec<String>>,
}

impl ProjectSettings {
    /// Create an empty registry with the host OS as the only active feature
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            features: RwLock::new(vec![std::env::consts::OS.to_string()]),
        }
    }

    /// Create a registry seeded from the audio section of a config file
    pub fn from_config(config: &Config) -> Self {
        let settings = Self::new();
        if let Some(rate) = config.audio.mix_rate {
            settings.set(MIX_RATE_KEY, SettingValue::Int(rate));
        }
        settings.set(SPEAKER_MODE_KEY, SettingValue::Int(config.audio.speaker_mode));
        settings
    }

    /// Replace the set of active features
    pub fn set_features<I, S>(&self, features: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.features.write() = features.into_iter().map(Into::into).collect();
    }

    /// Register a setting with metadata. An existing value is kept; only the
    /// default and metadata are updated.
    pub fn define(&self, info: PropertyInfo, default: SettingValue) -> SettingValue {
        let mut entries = self.entries.write();
        let key = info.key.clone();
        let entry = entries.entry(key).or_insert_with(|| SettingEntry {
            value: default.clone(),
            default: None,
            info: None,
        });
        entry.default = Some(default);
        entry.info = Some(info);
        entry.value.clone()
    }

    /// Get a setting, defining it with `default` if it does not exist yet.
    /// Feature overrides are honoured.
    pub fn get_or_define(&self, key: &str, default: SettingValue) -> SettingValue {
        let mut entries = self.entries.write();
        entries
            .entry(key.to_string())
            .and_modify(|e| {
                if e.default.is_none() {
                    e.default = Some(default.clone());
                }
            })
            .or_insert_with(|| SettingEntry {
                value: default.clone(),
                default: Some(default.clone()),
                info: None,
            });
        self.lookup(&entries, key).unwrap_or(default)
    }

    /// Get a setting, preferring an override for any active feature
    pub fn get(&self, key: &str) -> Option<SettingValue> {
        let entries = self.entries.read();
        self.lookup(&entries, key)
    }

    fn lookup(&self, entries: &HashMap<String, SettingEntry>, key: &str) -> Option<SettingValue> {
        for feature in self.features.read().iter() {
            if let Some(entry) = entries.get(&format!("{key}.{feature}")) {
                return Some(entry.value.clone());
            }
        }
        entries.get(key).map(|e| e.value.clone())
    }

    /// Set a value, creating the key if needed
    pub fn set(&self, key: &str, value: SettingValue) {
        let mut entries = self.entries.write();
        match entries.get_mut(key) {
            Some(entry) => entry.value = value,
            None => {
                entries.insert(
                    key.to_string(),
                    SettingEntry {
                        value,
                        default: None,
                        info: None,
                    },
                );
            }
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Default value registered for a key
    pub fn default_value(&self, key: &str) -> Option<SettingValue> {
        self.entries.read().get(key).and_then(|e| e.default.clone())
    }

    pub fn property_info(&self, key: &str) -> Option<PropertyInfo> {
        self.entries.read().get(key).and_then(|e| e.info.clone())
    }

    /// Keys whose current value differs from the registered default and that
    /// need a restart to take effect
    pub fn pending_restart_keys(&self) -> Vec<String> {
        let entries = self.entries.read();
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(_, e)| {
                e.info.as_ref().is_some_and(|i| i.restart_if_changed)
                    && e.default.as_ref().is_some_and(|d| *d != e.value)
            })
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_define_inserts_default() {
        let settings = ProjectSettings::new();
        assert!(!settings.has(SPEAKER_MODE_KEY));

        let value = settings.get_or_define(SPEAKER_MODE_KEY, SettingValue::Int(0));
        assert_eq!(value, SettingValue::Int(0));
        assert!(settings.has(SPEAKER_MODE_KEY));
        assert_eq!(settings.default_value(SPEAKER_MODE_KEY), Some(SettingValue::Int(0)));
    }

    #[test]
    fn test_get_or_define_keeps_existing_value() {
        let settings = ProjectSettings::new();
        settings.set(MIX_RATE_KEY, SettingValue::Int(48000));

        let value = settings.get_or_define(MIX_RATE_KEY, SettingValue::Int(44100));
        assert_eq!(value, SettingValue::Int(48000));
        assert_eq!(settings.default_value(MIX_RATE_KEY), Some(SettingValue::Int(44100)));
    }

    #[test]
    fn test_define_keeps_value_and_records_info() {
        let settings = ProjectSettings::new();
        settings.set(SPEAKER_MODE_KEY, SettingValue::Int(3));

        let info = PropertyInfo::new(SPEAKER_MODE_KEY)
            .with_hint(PropertyHint::Enum("Stereo,Surround 3.1".into()))
            .restart_required();
        let value = settings.define(info.clone(), SettingValue::Int(0));

        assert_eq!(value, SettingValue::Int(3));
        assert_eq!(settings.property_info(SPEAKER_MODE_KEY), Some(info));
        assert_eq!(settings.pending_restart_keys(), vec![SPEAKER_MODE_KEY.to_string()]);
    }

    #[test]
    fn test_feature_override_wins() {
        let settings = ProjectSettings::new();
        settings.set_features(["web"]);
        settings.set(MIX_RATE_KEY, SettingValue::Int(44100));
        settings.set(&format!("{MIX_RATE_KEY}.web"), SettingValue::Int(0));

        assert_eq!(settings.get(MIX_RATE_KEY), Some(SettingValue::Int(0)));

        settings.set_features(["linux"]);
        assert_eq!(settings.get(MIX_RATE_KEY), Some(SettingValue::Int(44100)));
    }

    #[test]
    fn test_from_config() {
        let mut config = Config::default();
        config.audio.mix_rate = Some(22050);
        config.audio.speaker_mode = 2;

        let settings = ProjectSettings::from_config(&config);
        assert_eq!(settings.get(MIX_RATE_KEY), Some(SettingValue::Int(22050)));
        assert_eq!(settings.get(SPEAKER_MODE_KEY), Some(SettingValue::Int(2)));
    }

    #[test]
    fn test_value_views() {
        assert_eq!(SettingValue::from(5i64).as_int(), Some(5));
        assert_eq!(SettingValue::from("x").as_int(), None);
        assert_eq!(SettingValue::from(true).as_bool(), Some(true));
        assert_eq!(SettingValue::from("x").to_string(), "\"x\"");
    }
}
