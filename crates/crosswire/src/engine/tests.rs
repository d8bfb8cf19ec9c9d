use super::{
    CloneSelection, DuplicatePolicy, EngineError, RenamePlan, apply_plans, filter_by_parent,
    plan_clones, plan_renames,
};
use crate::audit::LogEntry;
use crate::table::{Binding, BindingTable, ConfigRow, ConfigTable, Supplier, SupplierTable};

fn suppliers() -> SupplierTable {
    SupplierTable {
        rows: vec![
            Supplier {
                id: 1,
                supplier_name: "Acme".into(),
            },
            Supplier {
                id: 2,
                supplier_name: "Globex".into(),
            },
        ],
    }
}

fn bindings() -> BindingTable {
    BindingTable {
        rows: vec![
            Binding {
                id: 10,
                parent_model: "bce-reranker-base".into(),
                supplier_id: 1,
                model: "old-a".into(),
            },
            Binding {
                id: 11,
                parent_model: "bce-reranker-base".into(),
                supplier_id: 2,
                model: "old-b".into(),
            },
            Binding {
                id: 12,
                parent_model: "other-parent".into(),
                supplier_id: 1,
                model: "keep".into(),
            },
        ],
    }
}

fn configs() -> ConfigTable {
    let mut extra = std::collections::BTreeMap::new();
    extra.insert("api_base".to_string(), "https://inst.example/v1".to_string());
    ConfigTable {
        columns: vec![
            "id".into(),
            "model".into(),
            "parent_model".into(),
            "supplier_id".into(),
            "context_length".into(),
            "api_base".into(),
        ],
        rows: vec![ConfigRow {
            id: 5,
            model: "base-cfg".into(),
            parent_model: "x".into(),
            supplier_id: 9,
            context_length: Some(4096),
            extra,
        }],
    }
}

fn selection(source: &str, ids: &[i64]) -> CloneSelection {
    CloneSelection {
        source_model: source.to_string(),
        supplier_ids: ids.to_vec(),
    }
}

#[test]
fn filter_selects_only_the_parents_rows() {
    let table = bindings();
    let hit = filter_by_parent(&table, "bce-reranker-base");
    assert_eq!(hit.iter().map(|b| b.id).collect::<Vec<_>>(), vec![10, 11]);
}

#[test]
fn rename_plans_derive_the_expected_names() {
    let table = bindings();
    let hit = filter_by_parent(&table, "bce-reranker-base");
    let plans = plan_renames(&hit, &suppliers(), "bce-reranker-base");
    assert_eq!(plans.len(), 2);
    assert_eq!(plans[0].old_model, "old-a");
    assert_eq!(plans[0].new_model, "acme-bce-reranker-base");
    assert_eq!(plans[1].old_model, "old-b");
    assert_eq!(plans[1].new_model, "globex-bce-reranker-base");
}

#[test]
fn rename_planning_is_idempotent() {
    let table = bindings();
    let hit = filter_by_parent(&table, "bce-reranker-base");
    let first = plan_renames(&hit, &suppliers(), "bce-reranker-base");
    let second = plan_renames(&hit, &suppliers(), "bce-reranker-base");
    assert_eq!(first, second);
}

#[test]
fn already_derived_names_are_elided() {
    let sup = suppliers();
    let mut table = bindings();
    table.rows[0].model = "acme-bce-reranker-base".into();
    let hit = filter_by_parent(&table, "bce-reranker-base");
    let plans = plan_renames(&hit, &sup, "bce-reranker-base");
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].binding_id, 11);
}

#[test]
fn dangling_supplier_gets_the_fallback_label() {
    let sup = suppliers();
    let hit = vec![Binding {
        id: 20,
        parent_model: "bce-reranker-base".into(),
        supplier_id: 42,
        model: "old".into(),
    }];
    let plans = plan_renames(&hit, &sup, "bce-reranker-base");
    assert_eq!(plans[0].new_model, "unknown-42-bce-reranker-base");
}

#[test]
fn renames_and_clones_converge_on_the_same_name() {
    let sup = suppliers();
    let table = bindings();
    let cfg = configs();
    let hit = filter_by_parent(&table, "bce-reranker-base");
    let renames = plan_renames(&hit, &sup, "bce-reranker-base");
    let clones = plan_clones(
        &cfg,
        &sup,
        "bce-reranker-base",
        &[selection("base-cfg", &[1])],
        DuplicatePolicy::Reject,
    )
    .expect("plan ok");
    assert_eq!(renames[0].new_model, clones[0].new_model);
}

#[test]
fn clone_plan_inherits_every_other_field_verbatim() {
    let cfg = configs();
    let clones = plan_clones(
        &cfg,
        &suppliers(),
        "bce-reranker-base",
        &[selection("base-cfg", &[1])],
        DuplicatePolicy::Reject,
    )
    .expect("plan ok");
    assert_eq!(clones.len(), 1);
    let plan = &clones[0];
    assert_eq!(plan.source_model, "base-cfg");
    assert_eq!(plan.supplier_id, 1);
    assert_eq!(plan.new_model, "acme-bce-reranker-base");
    assert_eq!(plan.base_record.model, "acme-bce-reranker-base");
    assert_eq!(plan.base_record.supplier_id, 1);
    assert_eq!(plan.base_record.parent_model, "x");
    assert_eq!(plan.base_record.context_length, Some(4096));
    assert_eq!(
        plan.base_record.extra.get("api_base").map(String::as_str),
        Some("https://inst.example/v1")
    );
}

#[test]
fn planning_does_not_mutate_the_source_row() {
    let cfg = configs();
    let before = cfg.rows[0].clone();
    plan_clones(
        &cfg,
        &suppliers(),
        "bce-reranker-base",
        &[selection("base-cfg", &[1, 2])],
        DuplicatePolicy::Reject,
    )
    .expect("plan ok");
    assert_eq!(cfg.rows[0], before);
}

#[test]
fn missing_source_model_is_fatal() {
    let err = plan_clones(
        &configs(),
        &suppliers(),
        "bce-reranker-base",
        &[selection("no-such-cfg", &[1])],
        DuplicatePolicy::Reject,
    )
    .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { model } if model == "no-such-cfg"));
}

#[test]
fn selection_without_suppliers_is_skipped() {
    let plans = plan_clones(
        &configs(),
        &suppliers(),
        "bce-reranker-base",
        &[selection("no-such-cfg", &[]), selection("base-cfg", &[2])],
        DuplicatePolicy::Reject,
    )
    .expect("plan ok");
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].new_model, "globex-bce-reranker-base");
}

#[test]
fn reject_policy_refuses_an_existing_derived_name() {
    let mut cfg = configs();
    cfg.rows.push(ConfigRow {
        id: 6,
        model: "acme-bce-reranker-base".into(),
        ..Default::default()
    });
    let err = plan_clones(
        &cfg,
        &suppliers(),
        "bce-reranker-base",
        &[selection("base-cfg", &[1])],
        DuplicatePolicy::Reject,
    )
    .unwrap_err();
    assert!(matches!(err, EngineError::DuplicateModel { .. }));
}

#[test]
fn reject_policy_refuses_a_batch_internal_duplicate() {
    // Two sources fanning out to the same supplier derive the same name.
    let mut cfg = configs();
    cfg.rows.push(ConfigRow {
        id: 6,
        model: "second-cfg".into(),
        ..Default::default()
    });
    let err = plan_clones(
        &cfg,
        &suppliers(),
        "bce-reranker-base",
        &[selection("base-cfg", &[1]), selection("second-cfg", &[1])],
        DuplicatePolicy::Reject,
    )
    .unwrap_err();
    assert!(matches!(err, EngineError::DuplicateModel { .. }));
}

#[test]
fn skip_policy_drops_only_the_collision() {
    let mut cfg = configs();
    cfg.rows.push(ConfigRow {
        id: 6,
        model: "acme-bce-reranker-base".into(),
        ..Default::default()
    });
    let plans = plan_clones(
        &cfg,
        &suppliers(),
        "bce-reranker-base",
        &[selection("base-cfg", &[1, 2])],
        DuplicatePolicy::Skip,
    )
    .expect("plan ok");
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].new_model, "globex-bce-reranker-base");
}

#[test]
fn skip_policy_keeps_the_first_of_batch_duplicates() {
    let sup = suppliers();
    let mut cfg = configs();
    cfg.rows.push(ConfigRow {
        id: 6,
        model: "second-cfg".into(),
        ..Default::default()
    });
    let clones = plan_clones(
        &cfg,
        &sup,
        "bce-reranker-base",
        &[selection("base-cfg", &[1]), selection("second-cfg", &[1])],
        DuplicatePolicy::Skip,
    )
    .expect("plan ok");
    assert_eq!(clones.len(), 1);
    assert_eq!(clones[0].source_model, "base-cfg");

    let mut table = bindings();
    let outcome = apply_plans(&mut table, &mut cfg, &[], &clones, DuplicatePolicy::Skip)
        .expect("apply ok");
    assert_eq!(outcome.added, 1);
    assert_eq!(outcome.replaced, 0);
    assert_eq!(cfg.rows.len(), 3);
    assert_eq!(cfg.rows[2].id, 7);
    assert_eq!(cfg.rows[2].model, "acme-bce-reranker-base");
}

#[test]
fn replace_policy_keeps_the_first_of_batch_duplicates() {
    let sup = suppliers();
    let mut cfg = configs();
    cfg.rows.push(ConfigRow {
        id: 6,
        model: "second-cfg".into(),
        ..Default::default()
    });
    let clones = plan_clones(
        &cfg,
        &sup,
        "bce-reranker-base",
        &[selection("base-cfg", &[1]), selection("second-cfg", &[1])],
        DuplicatePolicy::Replace,
    )
    .expect("plan ok");
    assert_eq!(clones.len(), 1);
    assert_eq!(clones[0].source_model, "base-cfg");

    let mut table = bindings();
    let outcome = apply_plans(&mut table, &mut cfg, &[], &clones, DuplicatePolicy::Replace)
        .expect("apply ok");
    assert_eq!(outcome.added, 1);
    assert_eq!(outcome.replaced, 0);
    assert_eq!(cfg.rows.len(), 3);
    assert_eq!(cfg.rows[2].id, 7);
    assert_eq!(cfg.rows[2].model, "acme-bce-reranker-base");
}

#[test]
fn apply_renames_bindings_and_appends_configs() {
    let sup = suppliers();
    let mut table = bindings();
    let mut cfg = configs();
    let hit = filter_by_parent(&table, "bce-reranker-base");
    let renames = plan_renames(&hit, &sup, "bce-reranker-base");
    let clones = plan_clones(
        &cfg,
        &sup,
        "bce-reranker-base",
        &[selection("base-cfg", &[1])],
        DuplicatePolicy::Reject,
    )
    .expect("plan ok");

    let outcome = apply_plans(&mut table, &mut cfg, &renames, &clones, DuplicatePolicy::Reject)
        .expect("apply ok");
    assert_eq!(outcome.renamed, 2);
    assert_eq!(outcome.added, 1);
    assert_eq!(outcome.replaced, 0);
    assert_eq!(table.rows[0].model, "acme-bce-reranker-base");
    assert_eq!(table.rows[1].model, "globex-bce-reranker-base");
    assert_eq!(table.rows[2].model, "keep");
    assert_eq!(cfg.rows.len(), 2);
    assert_eq!(cfg.rows[1].id, 6);
    assert_eq!(outcome.new_rows.len(), 1);

    // One entry per record: two renames then one clone, each attributable.
    assert_eq!(outcome.entries.len(), 3);
    assert!(matches!(
        &outcome.entries[0],
        LogEntry::Modify { table, id: 10, old_value, new_value, supplier_id: 1 }
            if table == "bindings" && old_value == "old-a" && new_value == "acme-bce-reranker-base"
    ));
    assert!(matches!(
        &outcome.entries[2],
        LogEntry::Add { table, model, supplier_id: 1, source_model }
            if table == "configs" && model == "acme-bce-reranker-base" && source_model == "base-cfg"
    ));
}

#[test]
fn appended_ids_continue_after_the_highest() {
    let sup = suppliers();
    let mut table = bindings();
    let mut cfg = configs();
    cfg.rows.push(ConfigRow {
        id: 9,
        model: "high-water".into(),
        ..Default::default()
    });
    let clones = plan_clones(
        &cfg,
        &sup,
        "bce-reranker-base",
        &[selection("base-cfg", &[1, 2])],
        DuplicatePolicy::Reject,
    )
    .expect("plan ok");
    let outcome = apply_plans(&mut table, &mut cfg, &[], &clones, DuplicatePolicy::Reject)
        .expect("apply ok");
    assert_eq!(outcome.added, 2);
    let ids: Vec<_> = cfg.rows.iter().skip(2).map(|r| r.id).collect();
    assert_eq!(ids, vec![10, 11]);
}

#[test]
fn replace_policy_overwrites_in_place_keeping_the_id() {
    let sup = suppliers();
    let mut table = bindings();
    let mut cfg = configs();
    cfg.rows.push(ConfigRow {
        id: 7,
        model: "acme-bce-reranker-base".into(),
        supplier_id: 1,
        context_length: Some(1024),
        ..Default::default()
    });
    let clones = plan_clones(
        &cfg,
        &sup,
        "bce-reranker-base",
        &[selection("base-cfg", &[1])],
        DuplicatePolicy::Replace,
    )
    .expect("plan ok");
    let outcome = apply_plans(&mut table, &mut cfg, &[], &clones, DuplicatePolicy::Replace)
        .expect("apply ok");
    assert_eq!(outcome.added, 0);
    assert_eq!(outcome.replaced, 1);
    assert_eq!(cfg.rows.len(), 2);
    assert_eq!(cfg.rows[1].id, 7);
    assert_eq!(cfg.rows[1].context_length, Some(4096));
    assert!(matches!(&outcome.entries[0], LogEntry::Replace { .. }));
}

#[test]
fn vanished_binding_aborts_with_tables_untouched() {
    let sup = suppliers();
    let mut table = bindings();
    let mut cfg = configs();
    let hit = filter_by_parent(&table, "bce-reranker-base");
    let mut renames = plan_renames(&hit, &sup, "bce-reranker-base");
    let clones = plan_clones(
        &cfg,
        &sup,
        "bce-reranker-base",
        &[selection("base-cfg", &[1])],
        DuplicatePolicy::Reject,
    )
    .expect("plan ok");
    renames.push(RenamePlan {
        binding_id: 99,
        old_model: "ghost".into(),
        new_model: "ghost-renamed".into(),
        supplier_id: 1,
    });

    let before_bindings = table.clone();
    let before_configs = cfg.clone();
    let err = apply_plans(&mut table, &mut cfg, &renames, &clones, DuplicatePolicy::Reject)
        .unwrap_err();
    assert!(matches!(err, EngineError::Integrity(_)));
    assert_eq!(table, before_bindings);
    assert_eq!(cfg, before_configs);
}

#[test]
fn stale_rename_plan_aborts_with_tables_untouched() {
    let sup = suppliers();
    let mut table = bindings();
    let mut cfg = configs();
    let hit = filter_by_parent(&table, "bce-reranker-base");
    let renames = plan_renames(&hit, &sup, "bce-reranker-base");
    // The table moves underneath the plan.
    table.rows[1].model = "edited-elsewhere".into();

    let before_bindings = table.clone();
    let err = apply_plans(&mut table, &mut cfg, &renames, &[], DuplicatePolicy::Reject)
        .unwrap_err();
    assert!(matches!(err, EngineError::Integrity(_)));
    assert_eq!(table, before_bindings);
}

#[test]
fn collision_appearing_after_planning_aborts_under_reject() {
    let sup = suppliers();
    let mut table = bindings();
    let mut cfg = configs();
    let clones = plan_clones(
        &cfg,
        &sup,
        "bce-reranker-base",
        &[selection("base-cfg", &[1])],
        DuplicatePolicy::Reject,
    )
    .expect("plan ok");
    cfg.rows.push(ConfigRow {
        id: 6,
        model: "acme-bce-reranker-base".into(),
        ..Default::default()
    });

    let before_configs = cfg.clone();
    let err = apply_plans(&mut table, &mut cfg, &[], &clones, DuplicatePolicy::Reject)
        .unwrap_err();
    assert!(matches!(err, EngineError::Integrity(_)));
    assert_eq!(cfg, before_configs);
}
