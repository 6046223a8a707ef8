// 🔌 Collaborators - the services the editor talks to
//
// Storage, dirty-state signalling, user notices and icon lookup are outside
// the reconciliation core. They are consumed through these traits; the
// in-memory implementations here back tests and embedding, `db` provides the
// SQLite store.

use crate::entities::{Item, ItemType};
use crate::error::StoreError;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

// ============================================================================
// TRAITS
// ============================================================================

pub trait ItemStore {
    /// All items, without member expansion
    fn list_non_recursive(&self) -> Result<Vec<Item>, StoreError>;

    /// Create or replace the item stored under `name`
    fn put(&self, name: &str, item: &Item) -> Result<(), StoreError>;

    fn remove(&self, name: &str) -> Result<(), StoreError>;
}

/// Tells other views that their copy of the registry is stale
pub trait DirtyNotifier {
    fn mark_dirty(&self);
}

/// User-visible, fire-and-forget notices
pub trait Notifier {
    fn show_message(&self, text: &str);
}

pub trait IconResolver {
    fn resolve(&self, category: Option<&str>, item_type: Option<ItemType>) -> String;
}

/// The collaborators a submit or removal needs, borrowed for one call
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub store: &'a dyn ItemStore,
    pub dirty: &'a dyn DirtyNotifier,
    pub notifier: &'a dyn Notifier,
}

impl<'a> Collaborators<'a> {
    pub fn new(
        store: &'a dyn ItemStore,
        dirty: &'a dyn DirtyNotifier,
        notifier: &'a dyn Notifier,
    ) -> Self {
        Collaborators {
            store,
            dirty,
            notifier,
        }
    }
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// Item store held in memory, keyed by name
#[derive(Default)]
pub struct MemoryItemStore {
    items: Arc<RwLock<BTreeMap<String, Item>>>,
    writes: AtomicUsize,
    rejection: RwLock<Option<String>>,
}

impl MemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: Vec<Item>) -> Self {
        let store = Self::new();
        if let Ok(mut map) = store.items.write() {
            map.extend(items.into_iter().map(|item| (item.name.clone(), item)));
        }
        store
    }

    /// Make every following write fail with the given reason (`None` to stop)
    pub fn reject_writes(&self, reason: Option<&str>) {
        if let Ok(mut rejection) = self.rejection.write() {
            *rejection = reason.map(str::to_string);
        }
    }

    /// Number of write requests (put and remove) that reached the store
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn get(&self, name: &str) -> Option<Item> {
        self.items.read().ok()?.get(name).cloned()
    }

    fn check_rejection(&self) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        match self.rejection.read().map_err(poisoned)?.as_ref() {
            Some(reason) => Err(StoreError::Rejected(reason.clone())),
            None => Ok(()),
        }
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Rejected("store lock poisoned".to_string())
}

impl ItemStore for MemoryItemStore {
    fn list_non_recursive(&self) -> Result<Vec<Item>, StoreError> {
        Ok(self.items.read().map_err(poisoned)?.values().cloned().collect())
    }

    fn put(&self, name: &str, item: &Item) -> Result<(), StoreError> {
        self.check_rejection()?;
        self.items
            .write()
            .map_err(poisoned)?
            .insert(name.to_string(), item.clone());
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<(), StoreError> {
        self.check_rejection()?;
        self.items
            .write()
            .map_err(poisoned)?
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }
}

// ============================================================================
// DIRTY FLAG & NOTICES
// ============================================================================

/// Counts dirty signals until a view refreshes
#[derive(Debug, Default)]
pub struct DirtyFlag {
    raised: AtomicUsize,
}

impl DirtyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dirty(&self) -> bool {
        self.raised.load(Ordering::SeqCst) > 0
    }

    /// How many times the flag was raised since the last reset
    pub fn count(&self) -> usize {
        self.raised.load(Ordering::SeqCst)
    }

    /// Clear the flag, returning whether it was set
    pub fn reset(&self) -> bool {
        self.raised.swap(0, Ordering::SeqCst) > 0
    }
}

impl DirtyNotifier for DirtyFlag {
    fn mark_dirty(&self) {
        self.raised.fetch_add(1, Ordering::SeqCst);
    }
}

/// Writes notices to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn show_message(&self, text: &str) {
        log::info!("{}", text);
    }
}

/// Collects notices so a caller can show (or assert on) them later
#[derive(Debug, Default)]
pub struct MessageLog {
    messages: Mutex<Vec<String>>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn drain(&self) -> Vec<String> {
        self.messages
            .lock()
            .map(|mut m| std::mem::take(&mut *m))
            .unwrap_or_default()
    }
}

impl Notifier for MessageLog {
    fn show_message(&self, text: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(text.to_string());
        }
    }
}

// ============================================================================
// ICONS
// ============================================================================

/// Resolves icons below a base path, by category first, then by item type
#[derive(Debug, Clone)]
pub struct PathIconResolver {
    base: String,
}

impl PathIconResolver {
    pub fn new(base: impl Into<String>) -> Self {
        PathIconResolver {
            base: base.into().trim_end_matches('/').to_string(),
        }
    }
}

impl Default for PathIconResolver {
    fn default() -> Self {
        Self::new("../icon")
    }
}

impl IconResolver for PathIconResolver {
    fn resolve(&self, category: Option<&str>, item_type: Option<ItemType>) -> String {
        let icon = match (category.filter(|c| !c.is_empty()), item_type) {
            (Some(category), _) => category.to_lowercase(),
            (None, Some(item_type)) => item_type.as_str().to_lowercase().replace("item", ""),
            (None, None) => return String::new(),
        };
        format!("{}/{}", self.base, urlencoding::encode(&icon))
    }
}
