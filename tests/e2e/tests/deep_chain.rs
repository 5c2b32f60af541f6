//! Scenario: a five-level linear chain where only the deepest node is
//! actionable, and resolving it cascades one level up.

mod support;

use support::{mark_discovery_done, node, open_project, Harness};
use taskgraph_core::handlers::{self, QueryFilter, Sort, UpdateInput};

#[test]
fn deep_linear_chain_resolves_with_one_level_cascade() {
    let h = Harness::new();
    let root_id = open_project(&h, "deep");
    mark_discovery_done(&h, &root_id);

    let plan = {
        let conn = h.store.writer();
        handlers::plan(
            &conn,
            "deep",
            vec![
                node("l1", &root_id, "L1"),
                node("l2", "l1", "L2"),
                node("l3", "l2", "L3"),
                node("l4", "l3", "L4"),
                node("l5", "l4", "L5"),
            ],
            None,
            "agent",
        )
        .unwrap()
    };
    let by_ref: Vec<_> = plan.created.iter().map(|n| n.id.clone()).collect();
    let l4 = by_ref[3].clone();
    let l5 = by_ref[4].clone();

    // Only L5 is a leaf with no children, so only L5 is actionable.
    let query = {
        let conn = h.store.reader();
        handlers::query(&conn, "deep", QueryFilter { is_actionable: Some(true), ..Default::default() }, Sort::Readiness, 20, None).unwrap()
    };
    assert_eq!(query.nodes.len(), 1);
    assert_eq!(query.nodes[0].id, l5);

    let next = {
        let conn = h.store.writer();
        handlers::next(&conn, "deep", None, &handlers::NextFilter::default(), 5, false, "agent", &h.cfg).unwrap()
    };
    assert_eq!(next.candidates.len(), 1);
    assert_eq!(next.candidates[0].node.id, l5);
    assert_eq!(next.candidates[0].ancestors.len(), 5);

    let update = {
        let conn = h.store.writer();
        handlers::update(
            &conn,
            vec![UpdateInput {
                node_id: l5.clone(),
                resolved: Some(true),
                evidence_add: vec![taskgraph_core::node_ops::EvidenceInput { kind: "note".into(), reference: "done".into() }],
                ..Default::default()
            }],
            None,
            "agent",
        )
        .unwrap()
    };
    assert_eq!(update.auto_resolved, vec![l4.clone()]);

    let status = {
        let conn = h.store.reader();
        handlers::status(&conn, "deep").unwrap()
    };
    assert!(status.contains("total"));

    let onboard = {
        let conn = h.store.reader();
        handlers::onboard(&conn, "deep", 10).unwrap()
    };
    assert_eq!(onboard.summary.total, 6);
    assert_eq!(onboard.summary.resolved, 2);
}
