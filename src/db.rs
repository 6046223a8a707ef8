use crate::entities::{BaseType, Item, ItemType};
use crate::error::StoreError;
use crate::services::ItemStore;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Event for audit trail ("every write to the registry is an event")
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub item_name: String,
    pub data: serde_json::Value,
}

impl Event {
    pub fn new(event_type: &str, item_name: &str, data: serde_json::Value) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            item_name: item_name.to_string(),
            data,
        }
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Items Table (tags and parent groups as JSON arrays)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS items (
            name TEXT PRIMARY KEY NOT NULL,
            item_type TEXT NOT NULL,
            group_type TEXT,
            category TEXT,
            label TEXT NOT NULL DEFAULT '',
            tags TEXT NOT NULL DEFAULT '[]',
            group_names TEXT NOT NULL DEFAULT '[]',
            function TEXT,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            item_name TEXT NOT NULL,
            data TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_item ON events(item_name)",
        [],
    )?;

    Ok(())
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<(), StoreError> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (event_id, timestamp, event_type, item_name, data)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.item_name,
            data_json,
        ],
    )?;

    Ok(())
}

/// Get events for a specific item, newest first
pub fn get_events_for_item(conn: &Connection, item_name: &str) -> Result<Vec<Event>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, item_name, data
         FROM events
         WHERE item_name = ?1
         ORDER BY id DESC",
    )?;

    let events = stmt
        .query_map(params![item_name], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(4)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                    .map_err(|e| conversion_error(1, e.to_string()))?
                    .with_timezone(&Utc),
                event_type: row.get(2)?,
                item_name: row.get(3)?,
                data: serde_json::from_str(&data_json)
                    .map_err(|e| conversion_error(4, e.to_string()))?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

fn conversion_error(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, message.into())
}

fn item_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Item> {
    let item_type: String = row.get(1)?;
    let group_type: Option<String> = row.get(2)?;
    let tags_json: String = row.get(5)?;
    let groups_json: String = row.get(6)?;

    Ok(Item {
        name: row.get(0)?,
        item_type: ItemType::parse(&item_type)
            .ok_or_else(|| conversion_error(1, format!("unknown item type {}", item_type)))?,
        group_type: match group_type {
            Some(token) => Some(
                BaseType::parse(&token)
                    .ok_or_else(|| conversion_error(2, format!("unknown group type {}", token)))?,
            ),
            None => None,
        },
        category: row.get(3)?,
        label: row.get(4)?,
        tags: serde_json::from_str::<BTreeSet<String>>(&tags_json)
            .map_err(|e| conversion_error(5, e.to_string()))?,
        group_names: serde_json::from_str(&groups_json)
            .map_err(|e| conversion_error(6, e.to_string()))?,
        function: row.get(7)?,
    })
}

pub fn get_all_items(conn: &Connection) -> Result<Vec<Item>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT name, item_type, group_type, category, label, tags, group_names, function
         FROM items
         ORDER BY name",
    )?;

    let items = stmt
        .query_map([], item_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(items)
}

/// Create or replace an item; returns true when it did not exist before
pub fn upsert_item(conn: &Connection, item: &Item) -> Result<bool, StoreError> {
    let existed = conn
        .query_row(
            "SELECT 1 FROM items WHERE name = ?1",
            params![item.name],
            |_| Ok(()),
        )
        .optional()?
        .is_some();

    conn.execute(
        "INSERT INTO items (
            name, item_type, group_type, category, label, tags, group_names, function, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(name) DO UPDATE SET
            item_type = excluded.item_type,
            group_type = excluded.group_type,
            category = excluded.category,
            label = excluded.label,
            tags = excluded.tags,
            group_names = excluded.group_names,
            function = excluded.function,
            updated_at = excluded.updated_at",
        params![
            item.name,
            item.item_type.as_str(),
            item.group_type.map(|b| b.as_str()),
            item.category,
            item.label,
            serde_json::to_string(&item.tags)?,
            serde_json::to_string(&item.group_names)?,
            item.function,
            Utc::now().to_rfc3339(),
        ],
    )?;

    let event_type = if existed { "item_updated" } else { "item_created" };
    insert_event(conn, &Event::new(event_type, &item.name, serde_json::to_value(item)?))?;

    Ok(!existed)
}

pub fn delete_item(conn: &Connection, name: &str) -> Result<(), StoreError> {
    let deleted = conn.execute("DELETE FROM items WHERE name = ?1", params![name])?;
    if deleted == 0 {
        return Err(StoreError::NotFound(name.to_string()));
    }

    insert_event(conn, &Event::new("item_removed", name, serde_json::json!({})))?;
    Ok(())
}

pub fn verify_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
    Ok(count)
}

// ============================================================================
// CSV IMPORT
// ============================================================================

/// One CSV line: list columns are ';' separated
#[derive(Debug, Deserialize)]
struct CsvItem {
    name: String,
    #[serde(rename = "type")]
    item_type: String,
    #[serde(rename = "groupType", default)]
    group_type: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    label: String,
    #[serde(default)]
    tags: String,
    #[serde(rename = "groupNames", default)]
    group_names: String,
    #[serde(default)]
    function: String,
}

fn split_list(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl CsvItem {
    fn into_item(self) -> Result<Item> {
        let item_type = ItemType::parse(&self.item_type)
            .with_context(|| format!("Unknown item type {:?} for {}", self.item_type, self.name))?;
        let group_type = if self.group_type.is_empty() {
            None
        } else {
            Some(BaseType::parse(&self.group_type).with_context(|| {
                format!("Unknown group type {:?} for {}", self.group_type, self.name)
            })?)
        };

        Ok(Item {
            item_type,
            group_type,
            category: Some(self.category).filter(|c| !c.is_empty()),
            label: self.label,
            tags: split_list(&self.tags).collect(),
            group_names: split_list(&self.group_names).collect(),
            function: Some(self.function).filter(|f| !f.is_empty()),
            name: self.name,
        })
    }
}

pub fn load_csv(csv_path: &Path) -> Result<Vec<Item>> {
    let mut rdr = csv::Reader::from_path(csv_path).context("Failed to open CSV file")?;

    let mut items = Vec::new();
    for result in rdr.deserialize() {
        let row: CsvItem = result.context("Failed to deserialize item")?;
        items.push(row.into_item()?);
    }

    Ok(items)
}

/// Import items, returns (created, updated)
pub fn import_items(conn: &Connection, items: &[Item]) -> Result<(usize, usize)> {
    let mut created = 0;
    let mut updated = 0;

    for item in items {
        if upsert_item(conn, item).with_context(|| format!("Failed to import {}", item.name))? {
            created += 1;
        } else {
            updated += 1;
        }
    }

    log::info!("Imported {} new and {} existing items", created, updated);
    Ok((created, updated))
}

// ============================================================================
// SQLITE ITEM STORE
// ============================================================================

pub struct SqliteItemStore {
    conn: Connection,
}

impl SqliteItemStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        setup_database(&conn)?;
        Ok(SqliteItemStore { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        setup_database(&conn)?;
        Ok(SqliteItemStore { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl ItemStore for SqliteItemStore {
    fn list_non_recursive(&self) -> Result<Vec<Item>, StoreError> {
        get_all_items(&self.conn)
    }

    fn put(&self, name: &str, item: &Item) -> Result<(), StoreError> {
        if name != item.name {
            return Err(StoreError::Rejected(format!(
                "item {} cannot be stored under {}",
                item.name, name
            )));
        }
        upsert_item(&self.conn, item).map(|_| ())
    }

    fn remove(&self, name: &str) -> Result<(), StoreError> {
        delete_item(&self.conn, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_items() -> Vec<Item> {
        let mut lamp = Item::new("Lamp", ItemType::Scalar(BaseType::Switch)).with_label("Desk lamp");
        lamp.tags.insert("Lighting".to_string());
        lamp.group_names.push("Lights".to_string());
        lamp.category = Some("light".to_string());

        vec![
            lamp,
            Item::group("Lights", Some(BaseType::Switch), Some("OR")),
            Item::group("Temps", Some(BaseType::Number), Some("THRESHOLD_10_20")),
        ]
    }

    #[test]
    fn test_store_round_trips_items() {
        let store = SqliteItemStore::open_in_memory().unwrap();
        for item in sample_items() {
            store.put(&item.name, &item).unwrap();
        }

        let listed = store.list_non_recursive().unwrap();
        assert_eq!(listed.len(), 3);
        assert_eq!(listed[0], sample_items()[0]);
        assert_eq!(listed[2].function.as_deref(), Some("THRESHOLD_10_20"));
        assert_eq!(verify_count(store.connection()).unwrap(), 3);
    }

    #[test]
    fn test_update_and_remove_are_audited() {
        let store = SqliteItemStore::open_in_memory().unwrap();
        let lamp = sample_items().remove(0);

        store.put("Lamp", &lamp).unwrap();
        store.put("Lamp", &lamp.clone().with_label("Reading lamp")).unwrap();
        store.remove("Lamp").unwrap();

        let events = get_events_for_item(store.connection(), "Lamp").unwrap();
        let kinds: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(kinds, vec!["item_removed", "item_updated", "item_created"]);
        assert_eq!(events[1].data["label"], "Reading lamp");

        assert!(matches!(store.remove("Lamp"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_put_rejects_mismatched_name() {
        let store = SqliteItemStore::open_in_memory().unwrap();
        let lamp = sample_items().remove(0);
        assert!(matches!(store.put("Other", &lamp), Err(StoreError::Rejected(_))));
        assert_eq!(verify_count(store.connection()).unwrap(), 0);
    }

    #[test]
    fn test_csv_import_twice() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name,type,groupType,category,label,tags,groupNames,function").unwrap();
        writeln!(file, "Lights,GroupItem,Switch,,All lights,,,OR").unwrap();
        writeln!(file, "Lamp,SwitchItem,,light,Desk lamp,Lighting;Office,Lights,").unwrap();
        file.flush().unwrap();

        let items = load_csv(file.path()).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].tags.len(), 2);
        assert_eq!(items[1].group_names, vec!["Lights"]);
        assert_eq!(items[0].function.as_deref(), Some("OR"));
        assert_eq!(items[1].function, None);

        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        assert_eq!(import_items(&conn, &items).unwrap(), (2, 0));
        assert_eq!(import_items(&conn, &items).unwrap(), (0, 2));
        assert_eq!(verify_count(&conn).unwrap(), 2);
    }

    #[test]
    fn test_csv_unknown_type() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name,type").unwrap();
        writeln!(file, "Thing,WidgetItem").unwrap();
        file.flush().unwrap();

        assert!(load_csv(file.path()).is_err());
    }
}
