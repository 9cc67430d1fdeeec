//! Record storage subsystem.
//!
//! # Data Flow
//! ```text
//! Controller
//!     → ListQuery (filters, search, sort, page)
//!     → memory.rs (table lookup, filtering, pagination)
//!     → Page { records, pagination } / Record
//! ```
//!
//! # Design Decisions
//! - One generic store for every table; records are JSON objects
//! - Ids are per-table, incremental, never reused
//! - Concurrent access through `DashMap`; one shard lock per table

pub mod memory;
pub mod query;

use std::fmt;

use thiserror::Error;

pub use memory::{datetime_in, field_text, now_datetime, today, MemoryStore};
pub use query::{ListQuery, Page, Pagination, SortOrder};

/// A stored row.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Convert a JSON object into a record. Non-objects become an empty record.
pub fn into_record(value: serde_json::Value) -> Record {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Record::new(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Members,
    Offers,
    Partners,
    Users,
    ActivityLogs,
    VerificationLogs,
    PasswordResets,
    ContactMessages,
    Settings,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::Members => "members",
            Table::Offers => "offers",
            Table::Partners => "partners",
            Table::Users => "users",
            Table::ActivityLogs => "activity_logs",
            Table::VerificationLogs => "verification_logs",
            Table::PasswordResets => "password_resets",
            Table::ContactMessages => "contact_messages",
            Table::Settings => "settings",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("{table} record {id} not found")]
    NotFound { table: Table, id: u64 },
}
