//! Job descriptor passed to a job when its trigger fires.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key holding the filesystem location of a plugin module.
pub const PLUGIN_PATH_KEY: &str = "pluginPath";

/// Key-value data attached to a scheduled job.
///
/// Owned by the trigger that fires the job. Job runners read it and
/// never write to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobDataMap(HashMap<String, Value>);

impl JobDataMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Returns the raw value for a key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns the value for a key if it is a string.
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Returns the plugin module path, if present and non-empty.
    ///
    /// Some configuration sources fold key case, so an exact match is
    /// preferred but a case-insensitive one is accepted. Among several
    /// folded spellings the lowest key wins.
    pub fn plugin_path(&self) -> Option<&str> {
        self.get_string(PLUGIN_PATH_KEY)
            .or_else(|| {
                self.0
                    .iter()
                    .filter(|(k, _)| k.eq_ignore_ascii_case(PLUGIN_PATH_KEY))
                    .filter_map(|(k, v)| v.as_str().map(|s| (k, s)))
                    .min_by(|a, b| a.0.cmp(b.0))
                    .map(|(_, s)| s)
            })
            .filter(|s| !s.trim().is_empty())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over all entries.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl FromIterator<(String, Value)> for JobDataMap {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
