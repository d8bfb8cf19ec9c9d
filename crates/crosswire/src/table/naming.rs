//! Identifier derivation shared by renames and clones.

use super::SupplierTable;

/// Canonical label for a supplier: its name lower-cased, or a stable
/// `unknown-<id>` fallback when the id is not in the sheet. A dangling
/// supplier reference must never abort a propagation, so this cannot fail.
pub fn supplier_label(suppliers: &SupplierTable, supplier_id: i64) -> String {
    match suppliers.name_of(supplier_id) {
        Some(name) => name.to_lowercase(),
        None => format!("unknown-{}", supplier_id),
    }
}

/// Compose the derived model identifier `<supplier label>-<parent model>`,
/// all lower-case. Renamed bindings and cloned configs both go through here,
/// so a binding and its configuration always agree on the name.
pub fn derived_model_name(
    suppliers: &SupplierTable,
    supplier_id: i64,
    parent_model: &str,
) -> String {
    format!(
        "{}-{}",
        supplier_label(suppliers, supplier_id),
        parent_model.to_lowercase()
    )
}
