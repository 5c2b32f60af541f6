//! Scenario: dropping a subtree resolves it with `dropped` evidence and
//! unblocks anything that depended on it.

mod support;

use support::{mark_discovery_done, node, open_project, Harness};
use taskgraph_core::handlers::{self, ConnectInput, RestructureOp};

#[test]
fn drop_cascade_resolves_subtree_and_unblocks_dependent() {
    let h = Harness::new();
    let root_id = open_project(&h, "drop");
    mark_discovery_done(&h, &root_id);

    let plan = {
        let conn = h.store.writer();
        handlers::plan(
            &conn,
            "drop",
            vec![
                node("keep", &root_id, "keep"),
                node("drop-parent", &root_id, "drop-parent"),
                node("drop-child", "drop-parent", "drop-child"),
                node("blocked", &root_id, "blocked"),
            ],
            None,
            "agent",
        )
        .unwrap()
    };
    let drop_parent_id = plan.created[1].id.clone();
    let drop_child_id = plan.created[2].id.clone();
    let blocked_id = plan.created[3].id.clone();

    {
        let conn = h.store.writer();
        handlers::connect(
            &conn,
            vec![ConnectInput { from: blocked_id.clone(), to: drop_parent_id.clone(), edge_type: "depends_on".into(), remove: false }],
            "agent",
        )
        .unwrap();
    }

    let result = {
        let conn = h.store.writer();
        handlers::restructure(
            &conn,
            vec![RestructureOp::Drop { node_id: drop_parent_id.clone(), reason: "deprioritized".into() }],
            "agent",
        )
        .unwrap()
    };

    let dropped_parent = result.touched.iter().find(|n| n.id == drop_parent_id).unwrap();
    assert!(dropped_parent.resolved);
    assert!(dropped_parent.evidence.iter().any(|e| e.kind == "dropped" && e.reference == "deprioritized"));

    let dropped_child = result.touched.iter().find(|n| n.id == drop_child_id).unwrap();
    assert!(dropped_child.resolved);
    assert!(dropped_child.evidence.iter().any(|e| e.kind == "dropped"));

    assert!(result.newly_actionable.iter().any(|n| n.id == blocked_id));

    let after = {
        let conn = h.store.reader();
        handlers::query(&conn, "drop", handlers::QueryFilter { is_actionable: Some(true), ..Default::default() }, handlers::Sort::Readiness, 20, None).unwrap()
    };
    assert!(after.nodes.iter().any(|n| n.id == blocked_id));
}
