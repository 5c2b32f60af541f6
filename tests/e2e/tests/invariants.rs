//! Checks for the structural invariants in spec.md §8 that the scenario
//! tests don't already exercise incidentally.

mod support;

use support::{mark_discovery_done, node, node_with_deps, open_project, Harness};
use taskgraph_core::handlers::{self, ConnectInput, NextFilter, RestructureOp, UpdateInput};
use taskgraph_core::ErrorCode;

#[test]
fn ancestor_chain_length_equals_depth() {
    let h = Harness::new();
    let root_id = open_project(&h, "chain");
    mark_discovery_done(&h, &root_id);

    let leaf_id = {
        let conn = h.store.writer();
        let plan = handlers::plan(
            &conn,
            "chain",
            vec![node("mid", &root_id, "mid"), node("leaf", "mid", "leaf")],
            None,
            "agent",
        )
        .unwrap();
        plan.created[1].id.clone()
    };

    let ctx = {
        let conn = h.store.reader();
        handlers::context(&conn, &leaf_id, 0).unwrap()
    };
    assert_eq!(ctx.ancestors.len() as i64, ctx.node.depth);
}

#[test]
fn direct_cycle_is_rejected() {
    let h = Harness::new();
    let root_id = open_project(&h, "cycle");
    mark_discovery_done(&h, &root_id);

    let plan = {
        let conn = h.store.writer();
        handlers::plan(&conn, "cycle", vec![node("a", &root_id, "a"), node("b", &root_id, "b")], None, "agent").unwrap()
    };
    let a_id = plan.created[0].id.clone();
    let b_id = plan.created[1].id.clone();

    {
        let conn = h.store.writer();
        handlers::connect(
            &conn,
            vec![ConnectInput { from: a_id.clone(), to: b_id.clone(), edge_type: "depends_on".into(), remove: false }],
            "agent",
        )
        .unwrap();
    }

    let err = {
        let conn = h.store.writer();
        handlers::connect(
            &conn,
            vec![ConnectInput { from: b_id, to: a_id, edge_type: "depends_on".into(), remove: false }],
            "agent",
        )
        .unwrap_err()
    };
    assert_eq!(err.code, ErrorCode::CycleDetected);
}

#[test]
fn indirect_cycle_of_length_three_is_rejected() {
    let h = Harness::new();
    let root_id = open_project(&h, "cycle3");
    mark_discovery_done(&h, &root_id);

    let plan = {
        let conn = h.store.writer();
        handlers::plan(
            &conn,
            "cycle3",
            vec![node("a", &root_id, "a"), node("b", &root_id, "b"), node("c", &root_id, "c")],
            None,
            "agent",
        )
        .unwrap()
    };
    let a_id = plan.created[0].id.clone();
    let b_id = plan.created[1].id.clone();
    let c_id = plan.created[2].id.clone();

    let conn = h.store.writer();
    handlers::connect(&conn, vec![ConnectInput { from: a_id.clone(), to: b_id.clone(), edge_type: "depends_on".into(), remove: false }], "agent").unwrap();
    handlers::connect(&conn, vec![ConnectInput { from: b_id.clone(), to: c_id.clone(), edge_type: "depends_on".into(), remove: false }], "agent").unwrap();
    let err = handlers::connect(&conn, vec![ConnectInput { from: c_id, to: a_id, edge_type: "depends_on".into(), remove: false }], "agent").unwrap_err();
    assert_eq!(err.code, ErrorCode::CycleDetected);
}

#[test]
fn blocking_without_a_reason_is_rejected() {
    let h = Harness::new();
    let root_id = open_project(&h, "blockreason");

    let leaf_id = {
        let conn = h.store.writer();
        handlers::plan(&conn, "blockreason", vec![node("leaf", &root_id, "leaf")], None, "agent").unwrap().created[0].id.clone()
    };

    let err = {
        let conn = h.store.writer();
        handlers::update(&conn, vec![UpdateInput { node_id: leaf_id, blocked: Some(true), ..Default::default() }], None, "agent").unwrap_err()
    };
    assert_eq!(err.code, ErrorCode::BlockedReasonRequired);
}

#[test]
fn rev_strictly_increases_across_mutations() {
    let h = Harness::new();
    let root_id = open_project(&h, "revs");

    let leaf_id = {
        let conn = h.store.writer();
        handlers::plan(&conn, "revs", vec![node("leaf", &root_id, "leaf")], None, "agent").unwrap().created[0].id.clone()
    };

    let conn = h.store.writer();
    let mut last_rev = handlers::context(&conn, &leaf_id, 0).unwrap().node.rev;
    for i in 0..3 {
        let updated = handlers::update(
            &conn,
            vec![UpdateInput { node_id: leaf_id.clone(), summary: Some(format!("v{i}")), ..Default::default() }],
            None,
            "agent",
        )
        .unwrap();
        let new_rev = updated.updated[0].rev;
        assert!(new_rev > last_rev);
        last_rev = new_rev;
    }
}

#[test]
fn pending_discovery_node_cannot_receive_children() {
    let h = Harness::new();
    let root_id = open_project(&h, "pending");

    // root stays discovery=pending (the default for a freshly opened project).
    let err = {
        let conn = h.store.writer();
        handlers::plan(&conn, "pending", vec![node_with_deps("child", &root_id, "child", 0, &[])], None, "agent").unwrap_err()
    };
    // `open` itself marks the root pending; creating a child under a
    // pending-discovery parent is rejected until the caller flips it to
    // `done` (spec.md §8: "no other node has parent = P").
    assert_eq!(err.code, ErrorCode::DiscoveryPending);
}

#[test]
fn next_scope_restricts_to_a_subtree_and_ancestor_filter_matches_up_the_chain() {
    let h = Harness::new();
    let root_id = open_project(&h, "scoped");
    mark_discovery_done(&h, &root_id);

    let plan = {
        let conn = h.store.writer();
        handlers::plan(
            &conn,
            "scoped",
            vec![node("team-a", &root_id, "team a"), node("team-b", &root_id, "team b")],
            None,
            "agent",
        )
        .unwrap()
    };
    let team_a = plan.created[0].id.clone();
    let team_b = plan.created[1].id.clone();

    let mut urgent_props = taskgraph_core::PropertyMap::new();
    urgent_props.insert("urgent".into(), taskgraph_core::Value::Bool(true));
    let patch = UpdateInput { node_id: team_a.clone(), properties_patch: urgent_props, ..Default::default() };
    {
        let conn = h.store.writer();
        handlers::update(&conn, vec![patch], None, "agent").unwrap();
    }

    let conn = h.store.writer();
    handlers::plan(&conn, "scoped", vec![node("leaf-a", &team_a, "leaf under team a")], None, "agent").unwrap();
    handlers::plan(&conn, "scoped", vec![node("leaf-b", &team_b, "leaf under team b")], None, "agent").unwrap();

    let scoped_to_a = handlers::next(&conn, "scoped", Some(&team_a), &NextFilter::default(), 10, false, "agent", &h.cfg).unwrap();
    assert_eq!(scoped_to_a.candidates.len(), 1);
    assert_eq!(scoped_to_a.candidates[0].node.summary, "leaf under team a");

    let ancestor_filtered = handlers::next(
        &conn,
        "scoped",
        None,
        &NextFilter { property_equals: None, ancestor_filter: Some(("urgent".into(), taskgraph_core::Value::Bool(true))) },
        10,
        false,
        "agent",
        &h.cfg,
    )
    .unwrap();
    assert_eq!(ancestor_filtered.candidates.len(), 1);
    assert_eq!(ancestor_filtered.candidates[0].node.summary, "leaf under team a");
}

#[test]
fn empty_plan_batch_is_rejected_deterministically() {
    let h = Harness::new();
    let root_id = open_project(&h, "emptybatch");
    let _ = root_id;

    let err = {
        let conn = h.store.writer();
        handlers::plan(&conn, "emptybatch", vec![], None, "agent").unwrap_err()
    };
    assert_eq!(err.code, ErrorCode::InvalidInput);
}

#[test]
fn add_then_remove_edge_returns_to_prior_state() {
    let h = Harness::new();
    let root_id = open_project(&h, "edgeroundtrip");
    mark_discovery_done(&h, &root_id);

    let plan = {
        let conn = h.store.writer();
        handlers::plan(&conn, "edgeroundtrip", vec![node("a", &root_id, "a"), node("b", &root_id, "b")], None, "agent").unwrap()
    };
    let a_id = plan.created[0].id.clone();
    let b_id = plan.created[1].id.clone();

    let conn = h.store.writer();
    handlers::connect(&conn, vec![ConnectInput { from: a_id.clone(), to: b_id.clone(), edge_type: "depends_on".into(), remove: false }], "agent").unwrap();
    let ctx_with_edge = handlers::context(&conn, &a_id, 0).unwrap();
    assert_eq!(ctx_with_edge.depends_on.len(), 1);

    handlers::connect(&conn, vec![ConnectInput { from: a_id.clone(), to: b_id.clone(), edge_type: "depends_on".into(), remove: true }], "agent").unwrap();
    let ctx_after = handlers::context(&conn, &a_id, 0).unwrap();
    assert!(ctx_after.depends_on.is_empty());

    let history = handlers::history(&conn, &a_id, 50, None).unwrap();
    assert!(history.events.iter().any(|e| e.action.as_str() == "edge_added"));
    assert!(history.events.iter().any(|e| e.action.as_str() == "edge_removed"));
}
