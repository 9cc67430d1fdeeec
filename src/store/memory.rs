//! In-memory table store.

use std::collections::BTreeMap;

use dashmap::DashMap;
use serde_json::Value;

use crate::store::query::{ListQuery, Page};
use crate::store::{Record, StoreError, Table};

#[derive(Default)]
struct TableData {
    next_id: u64,
    rows: BTreeMap<u64, Record>,
}

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current UTC time as `YYYY-MM-DD HH:MM:SS`. Sorts lexicographically.
pub fn now_datetime() -> String {
    chrono::Utc::now().format(DATETIME_FORMAT).to_string()
}

/// UTC time `secs` from now, same format as [`now_datetime`].
pub fn datetime_in(secs: i64) -> String {
    (chrono::Utc::now() + chrono::Duration::seconds(secs))
        .format(DATETIME_FORMAT)
        .to_string()
}

/// Today's UTC date as `YYYY-MM-DD`.
pub fn today() -> String {
    chrono::Utc::now().date_naive().format("%Y-%m-%d").to_string()
}

/// Text form of a field for comparisons (`"3"` for `3`, `"1"` for `true`).
pub fn field_text(record: &Record, field: &str) -> Option<String> {
    match record.get(field)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
        other => Some(other.to_string()),
    }
}

/// Tables of JSON records keyed by an auto-incremented id.
#[derive(Default)]
pub struct MemoryStore {
    tables: DashMap<Table, TableData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, assigning `id` and `created_at`. Returns the new id.
    pub fn insert(&self, table: Table, mut record: Record) -> u64 {
        let mut data = self.tables.entry(table).or_default();
        data.next_id += 1;
        let id = data.next_id;
        record.insert("id".into(), Value::from(id));
        record.insert("created_at".into(), Value::from(now_datetime()));
        data.rows.insert(id, record);
        id
    }

    /// Merge `changes` into an existing record and stamp `updated_at`.
    pub fn update(&self, table: Table, id: u64, changes: Record) -> Result<Record, StoreError> {
        let mut data = self.tables.entry(table).or_default();
        let row = data
            .rows
            .get_mut(&id)
            .ok_or(StoreError::NotFound { table, id })?;
        for (key, value) in changes {
            if key != "id" {
                row.insert(key, value);
            }
        }
        row.insert("updated_at".into(), Value::from(now_datetime()));
        Ok(row.clone())
    }

    pub fn find(&self, table: Table, id: u64) -> Option<Record> {
        self.tables.get(&table)?.rows.get(&id).cloned()
    }

    pub fn find_one_by(&self, table: Table, field: &str, value: &str) -> Option<Record> {
        self.tables
            .get(&table)?
            .rows
            .values()
            .find(|r| field_text(r, field).as_deref() == Some(value))
            .cloned()
    }

    /// True if a record other than `except_id` has `field == value`.
    pub fn exists_other(
        &self,
        table: Table,
        field: &str,
        value: &str,
        except_id: Option<u64>,
    ) -> bool {
        self.tables.get(&table).is_some_and(|data| {
            data.rows.iter().any(|(id, r)| {
                Some(*id) != except_id && field_text(r, field).as_deref() == Some(value)
            })
        })
    }

    pub fn count_where(&self, table: Table, filters: &[(&str, &str)]) -> usize {
        self.tables.get(&table).map_or(0, |data| {
            data.rows
                .values()
                .filter(|r| {
                    filters
                        .iter()
                        .all(|(f, v)| field_text(r, f).as_deref() == Some(*v))
                })
                .count()
        })
    }

    /// Every record, in id order.
    pub fn all(&self, table: Table) -> Vec<Record> {
        self.tables
            .get(&table)
            .map(|data| data.rows.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Filtered, searched, sorted, paginated listing. Newest first unless sorted.
    pub fn list(&self, table: Table, query: &ListQuery) -> Page {
        query.apply(self.all(table))
    }

    /// Value of a settings row, or `default`.
    pub fn get_setting(&self, key: &str, default: &str) -> String {
        self.find_one_by(Table::Settings, "key", key)
            .and_then(|r| field_text(&r, "value"))
            .unwrap_or_else(|| default.to_string())
    }

    /// Insert or overwrite a settings row.
    pub fn put_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut changes = Record::new();
        changes.insert("key".into(), Value::from(key));
        changes.insert("value".into(), Value::from(value));

        let existing = self
            .find_one_by(Table::Settings, "key", key)
            .and_then(|r| r.get("id").and_then(Value::as_u64));
        match existing {
            Some(id) => {
                self.update(Table::Settings, id, changes)?;
            }
            None => {
                self.insert(Table::Settings, changes);
            }
        }
        Ok(())
    }
}
