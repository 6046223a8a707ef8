// 📸 Item Snapshot - immutable view of the registry at one point in time
//
// Taken once per editing session; name checks and relation searches run
// against it instead of re-querying the store on every keystroke.

use super::item::Item;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct ItemSnapshot {
    /// Unique snapshot ID
    pub snapshot_id: String,

    /// Point in time this snapshot represents
    pub as_of: DateTime<Utc>,

    /// Items keyed (and therefore ordered) by name
    items: BTreeMap<String, Item>,
}

impl ItemSnapshot {
    pub fn new(items: Vec<Item>) -> Self {
        ItemSnapshot {
            snapshot_id: uuid::Uuid::new_v4().to_string(),
            as_of: Utc::now(),
            items: items.into_iter().map(|item| (item.name.clone(), item)).collect(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn get(&self, name: &str) -> Option<&Item> {
        self.items.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    /// Items in ascending name order
    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    pub fn count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
