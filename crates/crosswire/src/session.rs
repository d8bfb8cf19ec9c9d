//! One propagation session: the three tables, the ledger, and the plan and
//! apply operations over them.
//!
//! A `Session` is created from a loaded workbook, mutated only through
//! [`Session::apply`], and either saved or discarded at the end. Nothing in
//! here touches disk.

use uuid::Uuid;

use crate::audit::ChangeLog;
use crate::engine::{
    ClonePlan, DuplicatePolicy, EngineError, RenamePlan, apply_plans, filter_by_parent,
    plan_clones, plan_renames,
};
use crate::job::Job;
use crate::store::Workbook;
use crate::table::{BindingTable, ConfigRow, ConfigTable, SupplierTable};

#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub suppliers: SupplierTable,
    pub bindings: BindingTable,
    pub configs: ConfigTable,
    pub log: ChangeLog,
}

/// The full set of planned mutations for one job, inspectable before any
/// write happens.
#[derive(Debug, Clone)]
pub struct PlanSet {
    pub parent_model: String,
    pub policy: DuplicatePolicy,
    pub matched_bindings: usize,
    pub renames: Vec<RenamePlan>,
    pub clones: Vec<ClonePlan>,
}

impl PlanSet {
    pub fn is_empty(&self) -> bool {
        self.renames.is_empty() && self.clones.is_empty()
    }
}

/// Summary of an applied propagation.
#[derive(Debug, Clone)]
pub struct PropagationReport {
    pub parent_model: String,
    pub matched_bindings: usize,
    pub renamed: usize,
    pub added: usize,
    pub replaced: usize,
    /// Rows synthesized by this apply, for the export bundle.
    pub new_configs: Vec<ConfigRow>,
}

impl Session {
    pub fn new(workbook: Workbook) -> Self {
        Session {
            id: Uuid::new_v4(),
            suppliers: workbook.suppliers,
            bindings: workbook.bindings,
            configs: workbook.configs,
            log: ChangeLog::new(),
        }
    }

    /// Plan the job against the current tables without touching them.
    pub fn plan(&self, job: &Job) -> Result<PlanSet, EngineError> {
        let policy = job.policy.unwrap_or_default();
        let matched = filter_by_parent(&self.bindings, &job.parent_model);
        let renames = plan_renames(&matched, &self.suppliers, &job.parent_model);
        let clones = plan_clones(
            &self.configs,
            &self.suppliers,
            &job.parent_model,
            &job.selections,
            policy,
        )?;
        tracing::debug!(
            "planned {} rename(s) and {} clone(s) for parent '{}'",
            renames.len(),
            clones.len(),
            job.parent_model
        );
        Ok(PlanSet {
            parent_model: job.parent_model.clone(),
            policy,
            matched_bindings: matched.len(),
            renames,
            clones,
        })
    }

    /// Apply a previously built plan set, all or nothing, and record every
    /// individual change in the session log.
    pub fn apply(&mut self, plan: &PlanSet) -> Result<PropagationReport, EngineError> {
        let outcome = apply_plans(
            &mut self.bindings,
            &mut self.configs,
            &plan.renames,
            &plan.clones,
            plan.policy,
        )?;
        self.log.extend(outcome.entries);
        Ok(PropagationReport {
            parent_model: plan.parent_model.clone(),
            matched_bindings: plan.matched_bindings,
            renamed: outcome.renamed,
            added: outcome.added,
            replaced: outcome.replaced,
            new_configs: outcome.new_rows,
        })
    }

    /// Plan and apply in one step.
    pub fn propagate(&mut self, job: &Job) -> Result<PropagationReport, EngineError> {
        let plan = self.plan(job)?;
        self.apply(&plan)
    }

    /// Drop all recorded history. Explicit and irreversible.
    pub fn reset_log(&mut self) {
        self.log.clear();
    }
}
