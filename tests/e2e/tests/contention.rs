//! Scenario: two agents claiming concurrently never see each other's fresh
//! claims, and a stale claim (zero TTL) becomes reclaimable.

mod support;

use std::time::Duration;

use support::{mark_discovery_done, node_with_priority, open_project, Harness};
use taskgraph_core::handlers;

#[test]
fn two_agent_contention_then_zero_ttl_reclaim() {
    let h = Harness::with_claim_ttl(Duration::from_secs(600));
    let root_id = open_project(&h, "contention");
    mark_discovery_done(&h, &root_id);

    let plan = {
        let conn = h.store.writer();
        handlers::plan(
            &conn,
            "contention",
            vec![node_with_priority("a", &root_id, "A", 10), node_with_priority("b", &root_id, "B", 9)],
            None,
            "agent",
        )
        .unwrap()
    };
    let a_id = plan.created[0].id.clone();
    let b_id = plan.created[1].id.clone();

    let next1 = {
        let conn = h.store.writer();
        handlers::next(&conn, "contention", None, &handlers::NextFilter::default(), 1, true, "agent-1", &h.cfg).unwrap()
    };
    assert_eq!(next1.candidates[0].node.id, a_id);

    let next2 = {
        let conn = h.store.writer();
        handlers::next(&conn, "contention", None, &handlers::NextFilter::default(), 1, true, "agent-2", &h.cfg).unwrap()
    };
    assert_eq!(next2.candidates[0].node.id, b_id);

    // With the default TTL still in effect, A stays invisible to agent-2.
    let still_blind = {
        let conn = h.store.writer();
        handlers::next(&conn, "contention", None, &handlers::NextFilter::default(), 5, false, "agent-2", &h.cfg).unwrap()
    };
    assert!(!still_blind.candidates.iter().any(|c| c.node.id == a_id));

    // A zero-TTL config makes every fresh claim immediately stale.
    let mut zero_ttl_cfg = h.cfg.clone();
    zero_ttl_cfg.claim_ttl = Duration::from_secs(0);

    let reclaimed = {
        let conn = h.store.writer();
        handlers::next(&conn, "contention", None, &handlers::NextFilter::default(), 1, true, "agent-2", &zero_ttl_cfg).unwrap()
    };
    assert_eq!(reclaimed.candidates[0].node.id, a_id);
    assert_eq!(
        reclaimed.candidates[0].node.properties.get("_claimed_by").and_then(|v| v.as_str()),
        Some("agent-2")
    );
}
