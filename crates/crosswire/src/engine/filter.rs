//! Selection of the bindings owned by one parent model.

use crate::table::{Binding, BindingTable};

/// Rows whose `parent_model` equals the given key exactly (case-sensitive),
/// returned as independent copies so later mutation of the table cannot
/// alias them. An empty result is a valid nothing-to-do outcome, not an
/// error.
pub fn filter_by_parent(bindings: &BindingTable, parent_model: &str) -> Vec<Binding> {
    bindings
        .rows
        .iter()
        .filter(|b| b.parent_model == parent_model)
        .cloned()
        .collect()
}
