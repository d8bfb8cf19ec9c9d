//! Side-effect-free planning of renames and clones.

use std::collections::HashSet;

use serde::Deserialize;

use crate::table::{Binding, ConfigRow, ConfigTable, SupplierTable, derived_model_name};

use super::EngineError;

/// Planned overwrite of one binding's `model` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamePlan {
    pub binding_id: i64,
    pub old_model: String,
    pub new_model: String,
    pub supplier_id: i64,
}

/// Planned synthesis of one config row for one target supplier.
///
/// `base_record` already carries the overridden `model` and `supplier_id`;
/// its `id` is provisional and reassigned when the plan is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClonePlan {
    pub source_model: String,
    pub supplier_id: i64,
    pub new_model: String,
    pub base_record: ConfigRow,
}

/// One clone request: a source config and the suppliers it fans out to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneSelection {
    pub source_model: String,
    pub supplier_ids: Vec<i64>,
}

/// What to do when a derived model name already exists in the config sheet.
/// Repeated propagation of the same parent would otherwise accumulate
/// duplicate rows silently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Refuse the whole plan.
    #[default]
    Reject,
    /// Overwrite the existing row in place, keeping its id.
    Replace,
    /// Keep the existing row and drop the colliding plan.
    Skip,
}

/// Compute the rename for every filtered binding. Bindings already carrying
/// the derived name are elided, so re-running a propagation produces neither
/// no-op writes nor duplicate log entries.
pub fn plan_renames(
    filtered: &[Binding],
    suppliers: &SupplierTable,
    parent_model: &str,
) -> Vec<RenamePlan> {
    let mut plans = Vec::with_capacity(filtered.len());
    for binding in filtered {
        let new_model = derived_model_name(suppliers, binding.supplier_id, parent_model);
        if new_model == binding.model {
            tracing::debug!(
                "binding {} already named '{}', nothing to rename",
                binding.id,
                binding.model
            );
            continue;
        }
        plans.push(RenamePlan {
            binding_id: binding.id,
            old_model: binding.model.clone(),
            new_model,
            supplier_id: binding.supplier_id,
        });
    }
    plans
}

/// Expand clone selections into per-supplier plans.
///
/// A selection with no target suppliers is skipped; a source model missing
/// from the sheet is fatal (`NotFound`) rather than silently fabricated.
/// Collisions between a derived name and an existing row, or an earlier plan
/// in the same batch, are resolved by `policy`.
pub fn plan_clones(
    configs: &ConfigTable,
    suppliers: &SupplierTable,
    parent_model: &str,
    selections: &[CloneSelection],
    policy: DuplicatePolicy,
) -> Result<Vec<ClonePlan>, EngineError> {
    let mut plans: Vec<ClonePlan> = Vec::new();
    let mut planned: HashSet<String> = HashSet::new();
    for selection in selections {
        if selection.supplier_ids.is_empty() {
            tracing::debug!(
                "clone source '{}' has no target suppliers, skipping",
                selection.source_model
            );
            continue;
        }
        let Some(source) = configs.find_by_model(&selection.source_model) else {
            return Err(EngineError::NotFound {
                model: selection.source_model.clone(),
            });
        };
        for &supplier_id in &selection.supplier_ids {
            let new_model = derived_model_name(suppliers, supplier_id, parent_model);
            if configs.contains_model(&new_model) || planned.contains(&new_model) {
                match policy {
                    DuplicatePolicy::Reject => {
                        return Err(EngineError::DuplicateModel { model: new_model });
                    }
                    DuplicatePolicy::Skip => {
                        tracing::warn!(
                            "derived model '{}' already exists, skipping clone of '{}'",
                            new_model,
                            selection.source_model
                        );
                        continue;
                    }
                    DuplicatePolicy::Replace => {
                        if planned.contains(&new_model) {
                            tracing::warn!(
                                "derived model '{}' planned twice in one batch, keeping the first",
                                new_model
                            );
                            continue;
                        }
                        // existing row will be overwritten at apply time
                    }
                }
            }
            let mut base_record = source.clone();
            base_record.model = new_model.clone();
            base_record.supplier_id = supplier_id;
            planned.insert(new_model.clone());
            plans.push(ClonePlan {
                source_model: selection.source_model.clone(),
                supplier_id,
                new_model,
                base_record,
            });
        }
    }
    Ok(plans)
}
