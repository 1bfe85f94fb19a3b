use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::ProductRecord;

/// Last known product set, grouped by region. Always replaced as a whole.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Snapshot {
    regions: BTreeMap<String, Vec<ProductRecord>>,
}

/// Snapshot flattened to record key -> record.
pub type RecordMap = BTreeMap<String, ProductRecord>;

impl Snapshot {
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a ProductRecord>,
    {
        let mut regions: BTreeMap<String, Vec<ProductRecord>> = BTreeMap::new();
        for record in records {
            regions
                .entry(record.region.clone())
                .or_default()
                .push(record.clone());
        }
        Self { regions }
    }

    /// Keys are unique per region; a duplicate name keeps the last record.
    pub fn flatten(&self) -> RecordMap {
        let mut map = RecordMap::new();
        for (region, records) in &self.regions {
            for record in records {
                let mut record = record.clone();
                if record.region.is_empty() {
                    record.region = region.clone();
                }
                map.insert(record.key(), record);
            }
        }
        map
    }

    pub fn regions(&self) -> impl Iterator<Item = &str> {
        self.regions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.regions.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
