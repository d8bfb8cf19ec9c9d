use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Reference row from the supplier sheet. Read-only input; never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: i64,
    pub supplier_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupplierTable {
    pub rows: Vec<Supplier>,
}

impl SupplierTable {
    pub fn name_of(&self, supplier_id: i64) -> Option<&str> {
        self.rows
            .iter()
            .find(|s| s.id == supplier_id)
            .map(|s| s.supplier_name.as_str())
    }
}

/// One model-supplier binding. `model` is the field a rename overwrites;
/// everything else stays as loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub id: i64,
    pub parent_model: String,
    pub supplier_id: i64,
    pub model: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingTable {
    pub rows: Vec<Binding>,
}

impl BindingTable {
    pub fn position_of(&self, id: i64) -> Option<usize> {
        self.rows.iter().position(|b| b.id == id)
    }
}

/// One model-config row. Known columns are typed; anything else rides along
/// verbatim in `extra` so cloning preserves the whole record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigRow {
    pub id: i64,
    pub model: String,
    pub parent_model: String,
    pub supplier_id: i64,
    pub context_length: Option<i64>,
    pub extra: BTreeMap<String, String>,
}

impl ConfigRow {
    /// Render the cell for `column` the way the sheet stores it.
    pub fn cell(&self, column: &str) -> String {
        match column {
            "id" => self.id.to_string(),
            "model" => self.model.clone(),
            "parent_model" => self.parent_model.clone(),
            "supplier_id" => self.supplier_id.to_string(),
            "context_length" => self
                .context_length
                .map(|v| v.to_string())
                .unwrap_or_default(),
            other => self.extra.get(other).cloned().unwrap_or_default(),
        }
    }
}

/// The model-config sheet. `columns` keeps the on-disk column order so a
/// load/save round trip does not reshuffle the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigTable {
    pub columns: Vec<String>,
    pub rows: Vec<ConfigRow>,
}

impl ConfigTable {
    /// First row whose `model` matches; the lookup used when a clone source
    /// is selected.
    pub fn find_by_model(&self, model: &str) -> Option<&ConfigRow> {
        self.rows.iter().find(|r| r.model == model)
    }

    pub fn position_by_model(&self, model: &str) -> Option<usize> {
        self.rows.iter().position(|r| r.model == model)
    }

    pub fn contains_model(&self, model: &str) -> bool {
        self.position_by_model(model).is_some()
    }

    /// Next free id for appended rows (highest existing + 1).
    pub fn next_id(&self) -> i64 {
        self.rows.iter().map(|r| r.id).max().unwrap_or(0) + 1
    }
}
