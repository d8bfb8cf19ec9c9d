//! Append-only ledger of applied mutations.
//!
//! Entries record what was actually done to the sheets, not what was
//! planned, and they stay valid even if the tables are edited by other
//! means afterwards.

use serde::{Deserialize, Serialize};

/// Table label for binding renames.
pub const BINDINGS_TABLE: &str = "bindings";
/// Table label for config synthesis.
pub const CONFIGS_TABLE: &str = "configs";

/// One recorded mutation, tagged by the action that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum LogEntry {
    /// A binding's `model` field was overwritten.
    #[serde(rename = "modify")]
    Modify {
        table: String,
        id: i64,
        old_value: String,
        new_value: String,
        supplier_id: i64,
    },
    /// A synthesized config row was appended.
    #[serde(rename = "add")]
    Add {
        table: String,
        model: String,
        supplier_id: i64,
        source_model: String,
    },
    /// An existing config row was overwritten by a synthesized one.
    #[serde(rename = "replace")]
    Replace {
        table: String,
        model: String,
        supplier_id: i64,
        source_model: String,
    },
}

impl LogEntry {
    pub fn modify(id: i64, old_value: &str, new_value: &str, supplier_id: i64) -> Self {
        LogEntry::Modify {
            table: BINDINGS_TABLE.to_string(),
            id,
            old_value: old_value.to_string(),
            new_value: new_value.to_string(),
            supplier_id,
        }
    }

    pub fn added(model: &str, supplier_id: i64, source_model: &str) -> Self {
        LogEntry::Add {
            table: CONFIGS_TABLE.to_string(),
            model: model.to_string(),
            supplier_id,
            source_model: source_model.to_string(),
        }
    }

    pub fn replaced(model: &str, supplier_id: i64, source_model: &str) -> Self {
        LogEntry::Replace {
            table: CONFIGS_TABLE.to_string(),
            model: model.to_string(),
            supplier_id,
            source_model: source_model.to_string(),
        }
    }
}

/// The session ledger. Grows by appending; `clear` is the only removal path
/// and is reserved for an explicit operator action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeLog {
    entries: Vec<LogEntry>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = LogEntry>) {
        self.entries.extend(entries);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
