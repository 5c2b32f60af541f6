//! Scenario: a stale `expected_rev` is rejected with no side effects.

mod support;

use support::{node, open_project, Harness};
use taskgraph_core::handlers::{self, UpdateInput};
use taskgraph_core::ErrorCode;

#[test]
fn stale_expected_rev_is_rejected_without_mutation() {
    let h = Harness::new();
    let root_id = open_project(&h, "concurrency");

    let leaf_id = {
        let conn = h.store.writer();
        handlers::plan(&conn, "concurrency", vec![node("leaf", &root_id, "leaf")], None, "agent").unwrap().created[0].id.clone()
    };

    let read_rev = {
        let conn = h.store.reader();
        handlers::context(&conn, &leaf_id, 0).unwrap().node.rev
    };

    // Another writer advances the node first.
    {
        let conn = h.store.writer();
        handlers::update(
            &conn,
            vec![UpdateInput { node_id: leaf_id.clone(), summary: Some("renamed".into()), ..Default::default() }],
            None,
            "agent",
        )
        .unwrap();
    }

    let err = {
        let conn = h.store.writer();
        handlers::update(
            &conn,
            vec![UpdateInput { node_id: leaf_id.clone(), expected_rev: Some(read_rev), summary: Some("stale write".into()), ..Default::default() }],
            None,
            "agent",
        )
        .unwrap_err()
    };
    assert_eq!(err.code, ErrorCode::RevMismatch);

    let after = {
        let conn = h.store.reader();
        handlers::context(&conn, &leaf_id, 0).unwrap()
    };
    assert_eq!(after.node.summary, "renamed");
    assert_eq!(after.node.rev, read_rev + 1);

    let history = {
        let conn = h.store.reader();
        handlers::history(&conn, &leaf_id, 50, None).unwrap()
    };
    // created + the one successful rename, nothing from the rejected write.
    assert_eq!(history.events.len(), 2);
}
