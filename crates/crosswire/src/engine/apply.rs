//! Validate-then-mutate application of planned changes.

use std::collections::HashSet;

use crate::audit::LogEntry;
use crate::table::{BindingTable, ConfigRow, ConfigTable};

use super::{ClonePlan, DuplicatePolicy, EngineError, RenamePlan};

/// What an apply changed, with the log entries describing it.
#[derive(Debug, Clone, Default)]
pub struct ApplyOutcome {
    pub renamed: usize,
    pub added: usize,
    pub replaced: usize,
    pub entries: Vec<LogEntry>,
    pub new_rows: Vec<ConfigRow>,
}

enum CloneAction {
    Append,
    ReplaceAt(usize),
    Skip,
}

/// Apply every plan, or nothing at all.
///
/// The whole batch is validated against the current tables before the first
/// write: a rename whose binding vanished or changed underneath the plan,
/// or a duplicate the policy does not tolerate, aborts the call with both
/// tables untouched.
pub fn apply_plans(
    bindings: &mut BindingTable,
    configs: &mut ConfigTable,
    renames: &[RenamePlan],
    clones: &[ClonePlan],
    policy: DuplicatePolicy,
) -> Result<ApplyOutcome, EngineError> {
    // Validation pass: resolve every mutation target up front.
    let mut rename_slots = Vec::with_capacity(renames.len());
    for plan in renames {
        let Some(pos) = bindings.position_of(plan.binding_id) else {
            return Err(EngineError::Integrity(format!(
                "binding id {} is gone from the table",
                plan.binding_id
            )));
        };
        if bindings.rows[pos].model != plan.old_model {
            return Err(EngineError::Integrity(format!(
                "binding id {} changed since planning ('{}' is now '{}')",
                plan.binding_id, plan.old_model, bindings.rows[pos].model
            )));
        }
        rename_slots.push(pos);
    }

    let mut clone_actions = Vec::with_capacity(clones.len());
    let mut planned: HashSet<&str> = HashSet::new();
    for plan in clones {
        let action = if planned.contains(plan.new_model.as_str()) {
            match policy {
                DuplicatePolicy::Reject => {
                    return Err(EngineError::Integrity(format!(
                        "derived model '{}' appears twice in the plan set",
                        plan.new_model
                    )));
                }
                DuplicatePolicy::Replace | DuplicatePolicy::Skip => {
                    tracing::warn!(
                        "derived model '{}' planned twice, keeping the first",
                        plan.new_model
                    );
                    CloneAction::Skip
                }
            }
        } else if let Some(pos) = configs.position_by_model(&plan.new_model) {
            match policy {
                DuplicatePolicy::Reject => {
                    return Err(EngineError::Integrity(format!(
                        "derived model '{}' appeared in the table since planning",
                        plan.new_model
                    )));
                }
                DuplicatePolicy::Replace => CloneAction::ReplaceAt(pos),
                DuplicatePolicy::Skip => {
                    tracing::debug!(
                        "derived model '{}' already present, skipping",
                        plan.new_model
                    );
                    CloneAction::Skip
                }
            }
        } else {
            CloneAction::Append
        };
        if !matches!(action, CloneAction::Skip) {
            planned.insert(plan.new_model.as_str());
        }
        clone_actions.push(action);
    }

    // Mutation pass: every target is resolved, nothing below can fail.
    let mut outcome = ApplyOutcome::default();
    for (plan, pos) in renames.iter().zip(rename_slots) {
        bindings.rows[pos].model = plan.new_model.clone();
        outcome.entries.push(LogEntry::modify(
            plan.binding_id,
            &plan.old_model,
            &plan.new_model,
            plan.supplier_id,
        ));
        outcome.renamed += 1;
    }
    let mut next_id = configs.next_id();
    for (plan, action) in clones.iter().zip(clone_actions) {
        match action {
            CloneAction::Append => {
                let mut row = plan.base_record.clone();
                row.id = next_id;
                next_id += 1;
                configs.rows.push(row.clone());
                outcome.new_rows.push(row);
                outcome.entries.push(LogEntry::added(
                    &plan.new_model,
                    plan.supplier_id,
                    &plan.source_model,
                ));
                outcome.added += 1;
            }
            CloneAction::ReplaceAt(pos) => {
                let mut row = plan.base_record.clone();
                row.id = configs.rows[pos].id;
                configs.rows[pos] = row.clone();
                outcome.new_rows.push(row);
                outcome.entries.push(LogEntry::replaced(
                    &plan.new_model,
                    plan.supplier_id,
                    &plan.source_model,
                ));
                outcome.replaced += 1;
            }
            CloneAction::Skip => {}
        }
    }
    Ok(outcome)
}
