//! Subtree restructuring: move, merge, drop, delete (spec.md §4.5).

use rusqlite::params;

use crate::error::{EngineError, EngineResult, ErrorCode, StoreError};
use crate::events::{delete_events_for_node, log_event};
use crate::model::{Change, EventAction, Node};
use crate::node_ops::{self, EvidenceInput, NodePatch};
use crate::store::now_rfc3339;
use crate::value::Value;

type Conn = rusqlite::Connection;

fn descendant_ids(conn: &Conn, root_id: &str) -> EngineResult<Vec<String>> {
    let mut out = Vec::new();
    let mut frontier = vec![root_id.to_string()];
    while let Some(id) = frontier.pop() {
        for child in node_ops::children(conn, &id)? {
            out.push(child.id.clone());
            frontier.push(child.id);
        }
    }
    Ok(out)
}

/// Rejects if `new_parent` is in `node`'s own subtree (parent cycle) or
/// belongs to a different project; otherwise reparents and recomputes
/// `depth` for the whole moved subtree.
pub fn move_node(conn: &Conn, node_id: &str, new_parent_id: &str, agent: &str) -> EngineResult<Node> {
    let node = node_ops::get(conn, node_id)?;
    let new_parent = node_ops::get(conn, new_parent_id)?;

    if new_parent.project != node.project {
        return Err(EngineError::cross_project(node_id, new_parent_id));
    }

    let subtree = descendant_ids(conn, node_id)?;
    if new_parent_id == node_id || subtree.iter().any(|id| id == new_parent_id) {
        return Err(EngineError::new(
            ErrorCode::InvalidParentRef,
            format!("'{new_parent_id}' is inside '{node_id}'s own subtree"),
        ));
    }

    let old_parent = node.parent.clone();
    let old_depth = node.depth;
    let new_depth = new_parent.depth + 1;
    let delta = new_depth - old_depth;

    let now = now_rfc3339();
    conn.execute(
        "UPDATE nodes SET rev = rev + 1, parent = ?1, depth = depth + ?2, updated_at = ?3 WHERE id = ?4",
        params![new_parent_id, delta, now, node_id],
    )
    .map_err(StoreError::from)?;

    for id in &subtree {
        conn.execute(
            "UPDATE nodes SET depth = depth + ?1, updated_at = ?2 WHERE id = ?3",
            params![delta, now, id],
        )
        .map_err(StoreError::from)?;
    }

    let changes = vec![Change {
        field: "parent".into(),
        before: old_parent.map(Value::String).unwrap_or(Value::Null),
        after: Value::String(new_parent_id.to_string()),
    }];
    log_event(conn, node_id, &node.project, EventAction::Moved, &changes, agent, None)
        .map_err(StoreError::from)?;

    node_ops::get(conn, node_id)
}

/// Reparents `source`'s children onto `target`, concatenates evidence,
/// rewrites source's edges onto target (de-duplicating), then deletes
/// source's events, edges, and the node itself.
pub fn merge_node(conn: &Conn, source_id: &str, target_id: &str, agent: &str) -> EngineResult<Node> {
    if source_id == target_id {
        return Err(EngineError::new(ErrorCode::InvalidInput, "cannot merge a node into itself"));
    }
    let source = node_ops::get(conn, source_id)?;
    let target = node_ops::get(conn, target_id)?;
    if source.project != target.project {
        return Err(EngineError::cross_project(source_id, target_id));
    }

    let now = now_rfc3339();

    for child in node_ops::children(conn, source_id)? {
        let delta = (target.depth + 1) - child.depth;
        conn.execute(
            "UPDATE nodes SET parent = ?1, depth = depth + ?2, updated_at = ?3 WHERE id = ?4",
            params![target_id, delta, now, child.id],
        )
        .map_err(StoreError::from)?;
        for descendant in descendant_ids(conn, &child.id)? {
            conn.execute(
                "UPDATE nodes SET depth = depth + ?1, updated_at = ?2 WHERE id = ?3",
                params![delta, now, descendant],
            )
            .map_err(StoreError::from)?;
        }
    }

    let mut merged_evidence = target.evidence.clone();
    merged_evidence.extend(source.evidence.clone());
    let evidence_json = serde_json::to_string(&merged_evidence).unwrap_or_else(|_| "[]".into());
    conn.execute(
        "UPDATE nodes SET evidence = ?1, rev = rev + 1, updated_at = ?2 WHERE id = ?3",
        params![evidence_json, now, target_id],
    )
    .map_err(StoreError::from)?;

    for edge in crate::edge_ops::edges_from(conn, source_id, None)? {
        if edge.to == target_id {
            continue;
        }
        let _ = crate::edge_ops::add_edge(conn, target_id, &edge.to, edge.kind.as_str(), agent);
    }
    for edge in crate::edge_ops::edges_to(conn, source_id, None)? {
        if edge.from == target_id {
            continue;
        }
        let _ = crate::edge_ops::add_edge(conn, &edge.from, target_id, edge.kind.as_str(), agent);
    }

    conn.execute("DELETE FROM edges WHERE from_node = ?1 OR to_node = ?1", params![source_id])
        .map_err(StoreError::from)?;
    delete_events_for_node(conn, source_id).map_err(StoreError::from)?;
    conn.execute("DELETE FROM nodes WHERE id = ?1", params![source_id]).map_err(StoreError::from)?;

    let changes = vec![Change {
        field: "merged_from".into(),
        before: Value::Null,
        after: Value::String(source_id.to_string()),
    }];
    log_event(conn, target_id, &target.project, EventAction::Merged, &changes, agent, None)
        .map_err(StoreError::from)?;

    node_ops::get(conn, target_id)
}

/// Marks `node_id` and every descendant resolved with a synthetic
/// `dropped` evidence entry; returns the ids affected so the caller can
/// feed them into `find_newly_actionable`.
pub fn drop_subtree(conn: &Conn, node_id: &str, reason: &str, agent: &str) -> EngineResult<Vec<String>> {
    let mut affected = vec![node_id.to_string()];
    affected.extend(descendant_ids(conn, node_id)?);

    for id in &affected {
        let node = node_ops::get(conn, id)?;
        if node.resolved {
            continue;
        }
        let mut patch = NodePatch::default();
        patch.evidence_add.push(EvidenceInput {
            kind: "dropped".into(),
            reference: reason.to_string(),
        });
        patch.resolved = Some(true);
        node_ops::update(conn, id, agent, patch, Some(reason))?;
        conn.execute(
            "UPDATE events SET action = ?1 WHERE node_id = ?2 AND id = (SELECT MAX(id) FROM events WHERE node_id = ?2)",
            params![EventAction::Dropped.as_str(), id],
        )
        .map_err(StoreError::from)?;
    }

    Ok(affected)
}

/// Hard delete: removes edges and events referencing the subtree first,
/// then the node rows themselves, so no dangling rows remain.
pub fn delete_subtree(conn: &Conn, node_id: &str) -> EngineResult<Vec<String>> {
    let mut ids = vec![node_id.to_string()];
    ids.extend(descendant_ids(conn, node_id)?);

    for id in &ids {
        conn.execute("DELETE FROM edges WHERE from_node = ?1 OR to_node = ?1", params![id])
            .map_err(StoreError::from)?;
        delete_events_for_node(conn, id).map_err(StoreError::from)?;
    }
    for id in ids.iter().rev() {
        conn.execute("DELETE FROM nodes WHERE id = ?1", params![id]).map_err(StoreError::from)?;
    }

    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_ops::create;
    use crate::value::PropertyMap;
    use tempfile::TempDir;

    fn open_store() -> (crate::store::Store, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = crate::store::Store::new(Some(dir.path().join("t.db"))).unwrap();
        (store, dir)
    }

    #[test]
    fn move_rejects_parent_cycle() {
        let (store, _dir) = open_store();
        let conn = store.writer();
        let root = create(&conn, "p", None, "root", PropertyMap::new(), vec![], None, None, None, "a").unwrap();
        let mid = create(&conn, "p", Some(&root.id), "mid", PropertyMap::new(), vec![], None, None, None, "a").unwrap();
        let leaf = create(&conn, "p", Some(&mid.id), "leaf", PropertyMap::new(), vec![], None, None, None, "a").unwrap();

        let err = move_node(&conn, &mid.id, &leaf.id, "agent").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParentRef);
    }

    #[test]
    fn move_recomputes_subtree_depth() {
        let (store, _dir) = open_store();
        let conn = store.writer();
        let root = create(&conn, "p", None, "root", PropertyMap::new(), vec![], None, None, None, "a").unwrap();
        let a = create(&conn, "p", Some(&root.id), "a", PropertyMap::new(), vec![], None, None, None, "a").unwrap();
        let b = create(&conn, "p", Some(&root.id), "b", PropertyMap::new(), vec![], None, None, None, "a").unwrap();
        let grandchild = create(&conn, "p", Some(&a.id), "gc", PropertyMap::new(), vec![], None, None, None, "a").unwrap();

        move_node(&conn, &a.id, &b.id, "agent").unwrap();

        let a_after = node_ops::get(&conn, &a.id).unwrap();
        let gc_after = node_ops::get(&conn, &grandchild.id).unwrap();
        assert_eq!(a_after.parent.as_deref(), Some(b.id.as_str()));
        assert_eq!(a_after.depth, 2);
        assert_eq!(gc_after.depth, 3);
    }

    #[test]
    fn drop_marks_subtree_resolved_with_reason() {
        let (store, _dir) = open_store();
        let conn = store.writer();
        let root = create(&conn, "p", None, "root", PropertyMap::new(), vec![], None, None, None, "a").unwrap();
        let parent = create(&conn, "p", Some(&root.id), "parent", PropertyMap::new(), vec![], None, None, None, "a").unwrap();
        let child = create(&conn, "p", Some(&parent.id), "child", PropertyMap::new(), vec![], None, None, None, "a").unwrap();

        let affected = drop_subtree(&conn, &parent.id, "deprioritized", "agent").unwrap();
        assert_eq!(affected.len(), 2);

        let parent_after = node_ops::get(&conn, &parent.id).unwrap();
        let child_after = node_ops::get(&conn, &child.id).unwrap();
        assert!(parent_after.resolved);
        assert!(child_after.resolved);
        assert!(parent_after.evidence.iter().any(|e| e.kind == "dropped" && e.reference == "deprioritized"));
    }

    #[test]
    fn delete_removes_subtree_and_edges() {
        let (store, _dir) = open_store();
        let conn = store.writer();
        let root = create(&conn, "p", None, "root", PropertyMap::new(), vec![], None, None, None, "a").unwrap();
        let parent = create(&conn, "p", Some(&root.id), "parent", PropertyMap::new(), vec![], None, None, None, "a").unwrap();
        let child = create(&conn, "p", Some(&parent.id), "child", PropertyMap::new(), vec![], None, None, None, "a").unwrap();
        crate::edge_ops::add_edge(&conn, &child.id, &parent.id, "relates_to", "agent").unwrap();

        delete_subtree(&conn, &parent.id).unwrap();

        assert!(node_ops::get_opt(&conn, &parent.id).unwrap().is_none());
        assert!(node_ops::get_opt(&conn, &child.id).unwrap().is_none());
        let remaining: i64 = conn.query_row("SELECT COUNT(*) FROM edges", [], |r| r.get(0)).unwrap();
        assert_eq!(remaining, 0);
    }
}
