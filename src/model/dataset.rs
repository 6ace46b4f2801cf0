use crate::model::{MonthKey, MonthRecord};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// The whole ledger: every month record that has ever been written, keyed by month.
///
/// Keys are sparse. A month that is not present reads as the empty record and is not materialized
/// until something is written for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dataset {
    months: BTreeMap<MonthKey, MonthRecord>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored record for `key`, if one has been written.
    pub fn get(&self, key: &MonthKey) -> Option<&MonthRecord> {
        self.months.get(key)
    }

    /// Returns the record for `key`, or the empty record if none exists.
    pub fn month(&self, key: &MonthKey) -> MonthRecord {
        self.get(key).cloned().unwrap_or_default()
    }

    /// Returns a mutable reference to the record for `key`, materializing the empty record first
    /// if necessary.
    pub fn month_mut(&mut self, key: MonthKey) -> &mut MonthRecord {
        self.months.entry(key).or_default()
    }

    /// Stores `record` under `key`, replacing any existing record.
    pub fn insert(&mut self, key: MonthKey, record: MonthRecord) {
        self.months.insert(key, record);
    }

    pub fn contains(&self, key: &MonthKey) -> bool {
        self.months.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &MonthKey> {
        self.months.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MonthKey, &MonthRecord)> {
        self.months.iter()
    }

    pub fn len(&self) -> usize {
        self.months.len()
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    /// Serializes the dataset as indented JSON, the form in which it is stored everywhere.
    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("Unable to serialize the ledger dataset")
    }

    /// Parses a stored document strictly.
    pub fn from_json(content: &[u8]) -> anyhow::Result<Self> {
        serde_json::from_slice(content).context("Unable to parse the ledger dataset")
    }

    /// Parses a stored document. A document that cannot be parsed is treated as an empty dataset
    /// and a warning is logged; this never fails.
    pub fn from_json_lenient(content: &[u8], origin: &str) -> Self {
        match Self::from_json(content) {
            Ok(dataset) => dataset,
            Err(e) => {
                warn!(
                    "The ledger document from {origin} is malformed and will be treated as \
                    empty: {e:#}"
                );
                Self::default()
            }
        }
    }
}

impl FromIterator<(MonthKey, MonthRecord)> for Dataset {
    fn from_iter<T: IntoIterator<Item = (MonthKey, MonthRecord)>>(iter: T) -> Self {
        Self {
            months: iter.into_iter().collect(),
        }
    }
}
