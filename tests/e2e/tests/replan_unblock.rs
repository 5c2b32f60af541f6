//! Scenario: resolving a dependency unblocks its dependent, and inserting a
//! new mid-flight dependency re-blocks it until that is resolved too.

mod support;

use support::{mark_discovery_done, node_with_deps, open_project, Harness};
use taskgraph_core::handlers::{self, ConnectInput, UpdateInput};
use taskgraph_core::node_ops::EvidenceInput;

#[test]
fn replan_with_unblock_tracks_newly_actionable() {
    let h = Harness::new();
    let root_id = open_project(&h, "replan");
    mark_discovery_done(&h, &root_id);

    let plan = {
        let conn = h.store.writer();
        handlers::plan(
            &conn,
            "replan",
            vec![
                node_with_deps("auth", &root_id, "auth", 10, &[]),
                node_with_deps("api", &root_id, "api", 8, &["auth"]),
                node_with_deps("ui", &root_id, "ui", 5, &["api"]),
            ],
            None,
            "agent",
        )
        .unwrap()
    };
    let auth_id = plan.created[0].id.clone();
    let api_id = plan.created[1].id.clone();

    {
        let conn = h.store.writer();
        handlers::update(
            &conn,
            vec![UpdateInput {
                node_id: auth_id.clone(),
                resolved: Some(true),
                evidence_add: vec![EvidenceInput { kind: "git".into(), reference: "abc123".into() }],
                context_links_add: vec!["src/auth.rs".into()],
                ..Default::default()
            }],
            None,
            "agent",
        )
        .unwrap();
    }

    let next = {
        let conn = h.store.writer();
        handlers::next(&conn, "replan", None, &handlers::NextFilter::default(), 5, false, "agent", &h.cfg).unwrap()
    };
    assert_eq!(next.candidates[0].node.id, api_id);

    // Insert `migration` mid-flight and make `api` depend on it.
    let migration_plan = {
        let conn = h.store.writer();
        handlers::plan(&conn, "replan", vec![node_with_deps("migration", &root_id, "migration", 9, &[])], None, "agent").unwrap()
    };
    let migration_id = migration_plan.created[0].id.clone();

    {
        let conn = h.store.writer();
        handlers::connect(
            &conn,
            vec![ConnectInput { from: api_id.clone(), to: migration_id.clone(), edge_type: "depends_on".into(), remove: false }],
            "agent",
        )
        .unwrap();
    }

    let next = {
        let conn = h.store.writer();
        handlers::next(&conn, "replan", None, &handlers::NextFilter::default(), 5, false, "agent", &h.cfg).unwrap()
    };
    assert_eq!(next.candidates[0].node.id, migration_id);
    assert!(!next.candidates.iter().any(|c| c.node.id == api_id));

    let resolve = {
        let conn = h.store.writer();
        handlers::update(
            &conn,
            vec![UpdateInput {
                node_id: migration_id,
                resolved: Some(true),
                resolved_reason: Some("ran the migration".into()),
                ..Default::default()
            }],
            None,
            "agent",
        )
        .unwrap()
    };
    assert!(resolve.newly_actionable.iter().any(|n| n.id == api_id));
}
