use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::fields::{FIRST_NAME, LAST_NAME};

/// Raw field values posted by the intake form, keyed by semantic key.
///
/// Values are kept verbatim; no numeric or format checks happen here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionData(BTreeMap<String, String>);

impl SubmissionData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Display name used for record keys, `unknown` standing in for blanks.
    pub fn applicant_label(&self) -> String {
        let part = |key| {
            self.get(key)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .unwrap_or("unknown")
        };
        format!("{}_{}", part(FIRST_NAME), part(LAST_NAME))
    }
}

impl<K, V> FromIterator<(K, V)> for SubmissionData
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl From<BTreeMap<String, String>> for SubmissionData {
    fn from(value: BTreeMap<String, String>) -> Self {
        Self(value)
    }
}

impl<'a> IntoIterator for &'a SubmissionData {
    type Item = (&'a String, &'a String);
    type IntoIter = std::collections::btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
