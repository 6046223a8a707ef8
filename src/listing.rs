// 📋 Listing & Removal
//
// The list view holds a read-only copy of the registry. Removal is a two-step
// interaction: a request carrying the target item, then confirm or cancel.
// Refreshing the list after a removal is up to the caller.

use crate::entities::{Item, ItemType};
use crate::error::StoreError;
use crate::services::{Collaborators, IconResolver, ItemStore};
use serde::Serialize;

pub const REMOVED_MESSAGE: &str = "Item removed.";

/// One row of the item list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRow {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub group_type: Option<String>,
    pub icon: String,
}

#[derive(Debug, Clone, Default)]
pub struct ItemListing {
    items: Vec<Item>,
}

impl ItemListing {
    pub fn load(store: &dyn ItemStore) -> Result<Self, StoreError> {
        let mut listing = ItemListing::default();
        listing.refresh(store)?;
        Ok(listing)
    }

    pub fn refresh(&mut self, store: &dyn ItemStore) -> Result<(), StoreError> {
        let mut items = store.list_non_recursive()?;
        items.sort_by(|a, b| a.name.cmp(&b.name));
        log::debug!("Listed {} items", items.len());
        self.items = items;
        Ok(())
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Item> {
        self.items.get(index)
    }

    pub fn rows(&self, icons: &dyn IconResolver) -> Vec<ItemRow> {
        self.items
            .iter()
            .map(|item| ItemRow {
                name: item.name.clone(),
                label: item.label.clone(),
                item_type: item.item_type,
                group_type: item.effective_group_type().map(|b| b.to_string()),
                icon: icons.resolve(item.category.as_deref(), Some(item.item_type)),
            })
            .collect()
    }

    /// Open the confirmation step for the item at `index`
    pub fn request_removal(&self, index: usize) -> Option<RemovalRequest> {
        self.items.get(index).cloned().map(RemovalRequest::new)
    }
}

/// Pending removal awaiting confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalRequest {
    item: Item,
}

impl RemovalRequest {
    pub fn new(item: Item) -> Self {
        RemovalRequest { item }
    }

    pub fn item(&self) -> &Item {
        &self.item
    }

    /// Delete the item, raise the dirty signal and notify
    pub fn confirm(self, services: Collaborators<'_>) -> Result<Item, StoreError> {
        services.store.remove(&self.item.name)?;
        log::info!("Removed item {}", self.item.name);
        services.dirty.mark_dirty();
        services.notifier.show_message(REMOVED_MESSAGE);
        Ok(self.item)
    }

    /// Drop the request without touching anything
    pub fn cancel(self) -> Item {
        self.item
    }
}
