//! Shared scaffolding for end-to-end scenarios: each test opens its own
//! temp-dir-backed store so scenarios never interfere with each other.

use std::time::Duration;

use taskgraph_core::handlers::{self, PlanNodeInput};
use taskgraph_core::{Config, PropertyMap, Store};
use tempfile::TempDir;

pub struct Harness {
    pub store: Store,
    pub cfg: Config,
    _dir: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let store = Store::new(Some(dir.path().join("e2e.db"))).expect("open store");
        Self { store, cfg: Config::default(), _dir: dir }
    }

    pub fn with_claim_ttl(ttl: Duration) -> Self {
        let mut h = Self::new();
        h.cfg.claim_ttl = ttl;
        h
    }
}

/// Builds a bare `PlanNodeInput` with no properties, context links, or deps.
pub fn node(node_ref: &str, parent_ref: &str, summary: &str) -> PlanNodeInput {
    PlanNodeInput {
        node_ref: node_ref.to_string(),
        parent_ref: parent_ref.to_string(),
        summary: summary.to_string(),
        context_links: vec![],
        properties: PropertyMap::new(),
        depends_on: vec![],
    }
}

pub fn node_with_priority(node_ref: &str, parent_ref: &str, summary: &str, priority: i64) -> PlanNodeInput {
    let mut n = node(node_ref, parent_ref, summary);
    n.properties.insert("priority".into(), taskgraph_core::Value::Number(priority as f64));
    n
}

pub fn node_with_deps(node_ref: &str, parent_ref: &str, summary: &str, priority: i64, depends_on: &[&str]) -> PlanNodeInput {
    let mut n = node_with_priority(node_ref, parent_ref, summary, priority);
    n.depends_on = depends_on.iter().map(|s| s.to_string()).collect();
    n
}

/// Opens `project`, returning the root node id.
pub fn open_project(h: &Harness, project: &str) -> String {
    let conn = h.store.writer();
    match handlers::open(&conn, Some(project), None, "agent").unwrap() {
        handlers::OpenResult::Project { root, .. } => root.id,
        handlers::OpenResult::Projects { .. } => panic!("expected a project result"),
    }
}

/// Flips the root's `discovery` to `done` so `plan` can attach children
/// directly to it without `plan` itself marking it done (only a batch's
/// own internal parent refs get that treatment).
pub fn mark_discovery_done(h: &Harness, node_id: &str) {
    let conn = h.store.writer();
    let mut patch = taskgraph_core::node_ops::NodePatch::default();
    patch.discovery = Some(taskgraph_core::Discovery::Done);
    taskgraph_core::node_ops::update(&conn, node_id, "agent", patch, None).unwrap();
}
