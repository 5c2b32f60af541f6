//! Node layer: create/read/update of node records (spec.md §4.2).

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::error::{EngineError, EngineResult, ErrorCode, StoreError};
use crate::events::log_event;
use crate::model::{Change, Discovery, Evidence, EventAction, Node};
use crate::store::{new_id, now_rfc3339, row_to_node};
use crate::value::{merge_properties, PropertyMap, Value};

/// A single evidence entry supplied by a caller (agent/timestamp are
/// stamped by the engine, not accepted from input).
#[derive(Debug, Clone)]
pub struct EvidenceInput {
    pub kind: String,
    pub reference: String,
}

/// Partial update applied atomically by `update`. Every field is additive:
/// `None` leaves the column untouched. `blocked`/`resolved` use `Option<bool>`
/// because "absent" and "explicitly false" are different requests.
#[derive(Debug, Clone, Default)]
pub struct NodePatch {
    pub summary: Option<String>,
    pub resolved: Option<bool>,
    pub blocked: Option<bool>,
    pub blocked_reason: Option<String>,
    pub discovery: Option<Discovery>,
    pub plan: Option<Vec<String>>,
    pub state: Option<serde_json::Value>,
    pub properties_patch: PropertyMap,
    pub context_links_add: Vec<String>,
    pub context_links_remove: Vec<String>,
    pub evidence_add: Vec<EvidenceInput>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectSummary {
    pub project: String,
    pub total: i64,
    pub resolved: i64,
}

fn dedup_links(links: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    links.retain(|l| seen.insert(l.clone()));
}

/// Creates a node. Enforces `discovery=pending` gating and cross-project
/// parent rejection; both are checked here since every creation path
/// (single `create`, or `plan`'s batch loop) funnels through this function.
#[allow(clippy::too_many_arguments)]
pub fn create(
    conn: &Connection,
    project: &str,
    parent: Option<&str>,
    summary: &str,
    properties: PropertyMap,
    context_links: Vec<String>,
    plan: Option<Vec<String>>,
    state: Option<serde_json::Value>,
    discovery: Option<Discovery>,
    agent: &str,
) -> EngineResult<Node> {
    create_with_note(conn, project, parent, summary, properties, context_links, plan, state, discovery, agent, None)
}

/// Same as [`create`], but records `note` on the node's `created` event —
/// used by `plan` to carry a batch's `decision_context` onto every node it
/// creates (spec.md §4.4/§4.6).
#[allow(clippy::too_many_arguments)]
pub fn create_with_note(
    conn: &Connection,
    project: &str,
    parent: Option<&str>,
    summary: &str,
    properties: PropertyMap,
    mut context_links: Vec<String>,
    plan: Option<Vec<String>>,
    state: Option<serde_json::Value>,
    discovery: Option<Discovery>,
    agent: &str,
    note: Option<&str>,
) -> EngineResult<Node> {
    dedup_links(&mut context_links);

    let depth = match parent {
        Some(parent_id) => {
            let parent_node = get(conn, parent_id)?;
            if parent_node.project != project {
                return Err(EngineError::cross_project(parent_id, project));
            }
            if parent_node.discovery == Some(Discovery::Pending) {
                return Err(EngineError::discovery_pending(parent_id));
            }
            parent_node.depth + 1
        }
        None => 0,
    };

    let id = new_id();
    let now = now_rfc3339();

    let properties_json = serde_json::to_string(&properties)
        .map_err(|e| EngineError::new(ErrorCode::InvalidInput, e.to_string()))?;
    let links_json = serde_json::to_string(&context_links).unwrap_or_else(|_| "[]".into());
    let plan_json = plan
        .as_ref()
        .map(|p| serde_json::to_string(p).unwrap_or_else(|_| "[]".into()));
    let state_json = state
        .as_ref()
        .map(|s| serde_json::to_string(s).unwrap_or_else(|_| "null".into()));
    let discovery_str = discovery.map(|d| d.as_str().to_string());

    conn.execute(
        "INSERT INTO nodes
            (id, rev, parent, project, summary, resolved, depth, discovery, blocked,
             blocked_reason, plan, state, properties, context_links, evidence,
             created_by, created_at, updated_at)
         VALUES (?1, 1, ?2, ?3, ?4, 0, ?5, ?6, 0, NULL, ?7, ?8, ?9, ?10, '[]', ?11, ?12, ?12)",
        params![
            id, parent, project, summary, depth, discovery_str, plan_json, state_json,
            properties_json, links_json, agent, now,
        ],
    )
    .map_err(StoreError::from)?;

    log_event(conn, &id, project, EventAction::Created, &[], agent, note).map_err(StoreError::from)?;

    get(conn, &id)
}

pub fn get_opt(conn: &Connection, id: &str) -> EngineResult<Option<Node>> {
    conn.query_row("SELECT * FROM nodes WHERE id = ?1", params![id], row_to_node)
        .optional()
        .map_err(|e| EngineError::from(StoreError::from(e)))
}

pub fn get(conn: &Connection, id: &str) -> EngineResult<Node> {
    get_opt(conn, id)?.ok_or_else(|| EngineError::node_not_found(id))
}

pub fn children(conn: &Connection, id: &str) -> EngineResult<Vec<Node>> {
    let mut stmt = conn
        .prepare("SELECT * FROM nodes WHERE parent = ?1 ORDER BY created_at ASC")
        .map_err(|e| EngineError::from(StoreError::from(e)))?;
    let rows = stmt
        .query_map(params![id], row_to_node)
        .map_err(|e| EngineError::from(StoreError::from(e)))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| EngineError::from(StoreError::from(e)))?;
    Ok(rows)
}

/// Root-first ancestor chain, not including `id` itself.
pub fn ancestors(conn: &Connection, id: &str) -> EngineResult<Vec<Node>> {
    let mut chain = Vec::new();
    let mut current = get(conn, id)?;
    while let Some(parent_id) = current.parent.clone() {
        let parent = get(conn, &parent_id)?;
        chain.push(parent.clone());
        current = parent;
    }
    chain.reverse();
    Ok(chain)
}

pub fn project_root(conn: &Connection, project: &str) -> EngineResult<Option<Node>> {
    conn.query_row(
        "SELECT * FROM nodes WHERE project = ?1 AND parent IS NULL",
        params![project],
        row_to_node,
    )
    .optional()
    .map_err(|e| EngineError::from(StoreError::from(e)))
}

pub fn list_projects(conn: &Connection) -> EngineResult<Vec<ProjectSummary>> {
    let mut stmt = conn
        .prepare(
            "SELECT project, COUNT(*) as total, SUM(resolved) as resolved
             FROM nodes GROUP BY project ORDER BY project ASC",
        )
        .map_err(|e| EngineError::from(StoreError::from(e)))?;

    let rows = stmt
        .query_map([], |row| {
            Ok(ProjectSummary {
                project: row.get(0)?,
                total: row.get(1)?,
                resolved: row.get::<_, Option<i64>>(2)?.unwrap_or(0),
            })
        })
        .map_err(|e| EngineError::from(StoreError::from(e)))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| EngineError::from(StoreError::from(e)))?;

    Ok(rows)
}

/// `(resolved, total)` counts for the subtree rooted at `node_id`,
/// including the node itself.
pub fn subtree_progress(conn: &Connection, node_id: &str) -> EngineResult<(i64, i64)> {
    let root = get(conn, node_id)?;
    let mut total = 1i64;
    let mut resolved = if root.resolved { 1 } else { 0 };

    let mut frontier = vec![node_id.to_string()];
    while let Some(id) = frontier.pop() {
        for child in children(conn, &id)? {
            total += 1;
            if child.resolved {
                resolved += 1;
            }
            frontier.push(child.id);
        }
    }

    Ok((resolved, total))
}

/// Applies `patch` atomically, enforcing resolve/block invariants, and
/// appends a single `updated`/`resolved`/`blocked`/`unblocked` event whose
/// `changes` enumerate every field that actually changed. Returns the
/// refreshed node plus the diff so callers (e.g. the auto-resolve cascade)
/// can inspect what moved.
pub fn update(
    conn: &Connection,
    node_id: &str,
    agent: &str,
    patch: NodePatch,
    note: Option<&str>,
) -> EngineResult<(Node, Vec<Change>)> {
    let current = get(conn, node_id)?;
    let mut changes = Vec::new();

    let mut summary = current.summary.clone();
    let mut resolved = current.resolved;
    let mut blocked = current.blocked;
    let mut blocked_reason = current.blocked_reason.clone();
    let mut discovery = current.discovery;
    let mut plan = current.plan.clone();
    let mut state = current.state.clone();
    let mut properties = current.properties.clone();
    let mut context_links = current.context_links.clone();
    let mut evidence = current.evidence.clone();

    if let Some(new_summary) = &patch.summary {
        if new_summary != &summary {
            changes.push(Change {
                field: "summary".into(),
                before: Value::String(summary.clone()),
                after: Value::String(new_summary.clone()),
            });
            summary = new_summary.clone();
        }
    }

    for e in &patch.evidence_add {
        evidence.push(Evidence::new(e.kind.clone(), e.reference.clone(), agent));
    }
    if !patch.evidence_add.is_empty() {
        changes.push(Change {
            field: "evidence".into(),
            before: Value::Number(current.evidence.len() as f64),
            after: Value::Number(evidence.len() as f64),
        });
    }

    if let Some(new_resolved) = patch.resolved {
        if new_resolved && !resolved && evidence.is_empty() {
            return Err(EngineError::evidence_required(node_id));
        }
        if new_resolved != resolved {
            changes.push(Change {
                field: "resolved".into(),
                before: Value::Bool(resolved),
                after: Value::Bool(new_resolved),
            });
            resolved = new_resolved;
        }
    }

    if let Some(new_blocked) = patch.blocked {
        if new_blocked && !blocked && patch.blocked_reason.is_none() {
            return Err(EngineError::blocked_reason_required(node_id));
        }
        if new_blocked != blocked {
            changes.push(Change {
                field: "blocked".into(),
                before: Value::Bool(blocked),
                after: Value::Bool(new_blocked),
            });
            blocked = new_blocked;
        }
        if !new_blocked && patch.blocked_reason.is_none() {
            blocked_reason = None;
        }
    }
    if let Some(reason) = &patch.blocked_reason {
        blocked_reason = Some(reason.clone());
    }

    if let Some(new_discovery) = patch.discovery {
        if Some(new_discovery) != discovery {
            changes.push(Change {
                field: "discovery".into(),
                before: Value::String(discovery.map(|d| d.as_str().to_string()).unwrap_or_default()),
                after: Value::String(new_discovery.as_str().to_string()),
            });
            discovery = Some(new_discovery);
        }
    }

    if let Some(new_plan) = &patch.plan {
        plan = Some(new_plan.clone());
        changes.push(Change {
            field: "plan".into(),
            before: Value::Null,
            after: Value::List(new_plan.iter().cloned().map(Value::String).collect()),
        });
    }

    if let Some(new_state) = &patch.state {
        state = Some(new_state.clone());
        changes.push(Change {
            field: "state".into(),
            before: Value::Null,
            after: Value::from(new_state.clone()),
        });
    }

    if !patch.properties_patch.is_empty() {
        merge_properties(&mut properties, patch.properties_patch.clone());
        changes.push(Change {
            field: "properties".into(),
            before: Value::Null,
            after: Value::Null,
        });
    }

    for link in &patch.context_links_add {
        if !context_links.contains(link) {
            context_links.push(link.clone());
        }
    }
    context_links.retain(|l| !patch.context_links_remove.contains(l));
    if !patch.context_links_add.is_empty() || !patch.context_links_remove.is_empty() {
        changes.push(Change {
            field: "context_links".into(),
            before: Value::Number(current.context_links.len() as f64),
            after: Value::Number(context_links.len() as f64),
        });
    }

    if changes.is_empty() {
        return Ok((current, changes));
    }

    let now = now_rfc3339();
    let properties_json = serde_json::to_string(&properties)
        .map_err(|e| EngineError::new(ErrorCode::InvalidInput, e.to_string()))?;
    let links_json = serde_json::to_string(&context_links).unwrap_or_else(|_| "[]".into());
    let evidence_json = serde_json::to_string(&evidence).unwrap_or_else(|_| "[]".into());
    let plan_json = plan
        .as_ref()
        .map(|p| serde_json::to_string(p).unwrap_or_else(|_| "[]".into()));
    let state_json = state
        .as_ref()
        .map(|s| serde_json::to_string(s).unwrap_or_else(|_| "null".into()));
    let discovery_str = discovery.map(|d| d.as_str().to_string());

    conn.execute(
        "UPDATE nodes SET rev = rev + 1, summary = ?1, resolved = ?2, blocked = ?3,
            blocked_reason = ?4, discovery = ?5, plan = ?6, state = ?7,
            properties = ?8, context_links = ?9, evidence = ?10, updated_at = ?11
         WHERE id = ?12",
        params![
            summary, resolved as i64, blocked as i64, blocked_reason, discovery_str, plan_json,
            state_json, properties_json, links_json, evidence_json, now, node_id,
        ],
    )
    .map_err(StoreError::from)?;

    let action = if resolved && !current.resolved {
        EventAction::Resolved
    } else if blocked && !current.blocked {
        EventAction::Blocked
    } else if !blocked && current.blocked {
        EventAction::Unblocked
    } else {
        EventAction::Updated
    };

    log_event(conn, node_id, &current.project, action, &changes, agent, note)
        .map_err(StoreError::from)?;

    let updated = get(conn, node_id)?;
    Ok((updated, changes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store() -> (crate::store::Store, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = crate::store::Store::new(Some(dir.path().join("t.db"))).unwrap();
        (store, dir)
    }

    #[test]
    fn create_root_has_depth_zero_and_created_event() {
        let (store, _dir) = open_store();
        let conn = store.writer();
        let root = create(
            &conn, "demo", None, "root", PropertyMap::new(), vec![], None, None,
            Some(Discovery::Pending), "agent",
        )
        .unwrap();
        assert_eq!(root.depth, 0);
        assert_eq!(root.rev, 1);
        assert!(!root.resolved);
    }

    #[test]
    fn create_child_under_pending_discovery_fails() {
        let (store, _dir) = open_store();
        let conn = store.writer();
        let root = create(
            &conn, "demo", None, "root", PropertyMap::new(), vec![], None, None,
            Some(Discovery::Pending), "agent",
        )
        .unwrap();
        let err = create(
            &conn, "demo", Some(&root.id), "child", PropertyMap::new(), vec![], None, None, None,
            "agent",
        )
        .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::DiscoveryPending);
    }

    #[test]
    fn resolve_without_evidence_fails() {
        let (store, _dir) = open_store();
        let conn = store.writer();
        let root = create(
            &conn, "demo", None, "root", PropertyMap::new(), vec![], None, None, None, "agent",
        )
        .unwrap();

        let mut patch = NodePatch::default();
        patch.resolved = Some(true);
        let err = update(&conn, &root.id, "agent", patch, None).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::EvidenceRequired);
    }

    #[test]
    fn resolve_with_evidence_succeeds_and_bumps_rev() {
        let (store, _dir) = open_store();
        let conn = store.writer();
        let root = create(
            &conn, "demo", None, "root", PropertyMap::new(), vec![], None, None, None, "agent",
        )
        .unwrap();

        let mut patch = NodePatch::default();
        patch.evidence_add.push(EvidenceInput {
            kind: "note".into(),
            reference: "done".into(),
        });
        patch.resolved = Some(true);
        let (updated, changes) = update(&conn, &root.id, "agent", patch, None).unwrap();
        assert!(updated.resolved);
        assert_eq!(updated.rev, 2);
        assert!(changes.iter().any(|c| c.field == "resolved"));
    }

    #[test]
    fn block_without_reason_fails() {
        let (store, _dir) = open_store();
        let conn = store.writer();
        let root = create(
            &conn, "demo", None, "root", PropertyMap::new(), vec![], None, None, None, "agent",
        )
        .unwrap();

        let mut patch = NodePatch::default();
        patch.blocked = Some(true);
        let err = update(&conn, &root.id, "agent", patch, None).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::BlockedReasonRequired);
    }

    #[test]
    fn context_links_dedup_on_insert() {
        let (store, _dir) = open_store();
        let conn = store.writer();
        let root = create(
            &conn, "demo", None, "root", PropertyMap::new(),
            vec!["a.rs".into(), "a.rs".into()], None, None, None, "agent",
        )
        .unwrap();
        assert_eq!(root.context_links, vec!["a.rs".to_string()]);
    }

    #[test]
    fn subtree_progress_counts_self_and_descendants() {
        let (store, _dir) = open_store();
        let conn = store.writer();
        let root = create(
            &conn, "demo", None, "root", PropertyMap::new(), vec![], None, None, None, "agent",
        )
        .unwrap();
        let child = create(
            &conn, "demo", Some(&root.id), "child", PropertyMap::new(), vec![], None, None, None,
            "agent",
        )
        .unwrap();

        let mut patch = NodePatch::default();
        patch.evidence_add.push(EvidenceInput {
            kind: "note".into(),
            reference: "done".into(),
        });
        patch.resolved = Some(true);
        update(&conn, &child.id, "agent", patch, None).unwrap();

        let (resolved, total) = subtree_progress(&conn, &root.id).unwrap();
        assert_eq!((resolved, total), (1, 2));
    }
}
