//! Graph algorithms: actionability, ranking, auto-resolve cascade (spec.md §4.5).

use rusqlite::{params, Connection};

use crate::error::{EngineError, EngineResult, StoreError};
use crate::model::{EventAction, Node};
use crate::node_ops::{self, EvidenceInput, NodePatch};
use crate::value::Value;

/// A node N is actionable iff: unresolved, unblocked, non-root, no
/// unresolved child, and no outgoing `depends_on` edge to an unresolved
/// target.
pub fn is_actionable(conn: &Connection, node: &Node) -> EngineResult<bool> {
    if node.resolved || node.blocked || node.parent.is_none() {
        return Ok(false);
    }

    let unresolved_children: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM nodes WHERE parent = ?1 AND resolved = 0",
            params![node.id],
            |r| r.get(0),
        )
        .map_err(|e| EngineError::from(StoreError::from(e)))?;
    if unresolved_children > 0 {
        return Ok(false);
    }

    let unresolved_deps: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM edges e JOIN nodes n ON n.id = e.to_node
             WHERE e.from_node = ?1 AND e.edge_type = 'depends_on' AND n.resolved = 0",
            params![node.id],
            |r| r.get(0),
        )
        .map_err(|e| EngineError::from(StoreError::from(e)))?;

    Ok(unresolved_deps == 0)
}

/// Unresolved nodes that are either manually blocked or have at least one
/// unresolved `depends_on` target.
pub fn blocked_set(conn: &Connection, project: &str) -> EngineResult<Vec<Node>> {
    let candidates = nodes_in_project(conn, project)?;
    let mut out = Vec::new();
    for n in candidates {
        if n.resolved {
            continue;
        }
        if n.blocked {
            out.push(n);
            continue;
        }
        let unresolved_deps: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM edges e JOIN nodes t ON t.id = e.to_node
                 WHERE e.from_node = ?1 AND e.edge_type = 'depends_on' AND t.resolved = 0",
                params![n.id],
                |r| r.get(0),
            )
            .map_err(|e| EngineError::from(StoreError::from(e)))?;
        if unresolved_deps > 0 {
            out.push(n);
        }
    }
    Ok(out)
}

fn nodes_in_project(conn: &Connection, project: &str) -> EngineResult<Vec<Node>> {
    let mut stmt = conn
        .prepare("SELECT * FROM nodes WHERE project = ?1")
        .map_err(|e| EngineError::from(StoreError::from(e)))?;
    let rows = stmt
        .query_map(params![project], crate::store::row_to_node)
        .map_err(|e| EngineError::from(StoreError::from(e)))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| EngineError::from(StoreError::from(e)))?;
    Ok(rows)
}

/// True if `node` is `ancestor_id` itself or a descendant of it, walking up
/// the parent chain (spec.md §4.5 "Scope and ancestor filters").
pub fn is_descendant_of(conn: &Connection, node: &Node, ancestor_id: &str) -> EngineResult<bool> {
    if node.id == ancestor_id {
        return Ok(true);
    }
    let mut current = node.clone();
    while let Some(parent_id) = current.parent.clone() {
        if parent_id == ancestor_id {
            return Ok(true);
        }
        current = node_ops::get(conn, &parent_id)?;
    }
    Ok(false)
}

/// True if any ancestor of `node` (not `node` itself) carries
/// `properties[key] == expected`.
pub fn any_ancestor_matches(conn: &Connection, node: &Node, key: &str, expected: &Value) -> EngineResult<bool> {
    let mut current = node.clone();
    while let Some(parent_id) = current.parent.clone() {
        let parent = node_ops::get(conn, &parent_id)?;
        if parent.properties.get(key) == Some(expected) {
            return Ok(true);
        }
        current = parent;
    }
    Ok(false)
}

/// Sorts actionable nodes by priority desc, depth desc, updated_at asc.
pub fn rank(nodes: &mut [Node]) {
    nodes.sort_by(|a, b| {
        b.priority()
            .partial_cmp(&a.priority())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.depth.cmp(&a.depth))
            .then_with(|| a.updated_at.cmp(&b.updated_at))
    });
}

pub fn actionable_in_project(conn: &Connection, project: &str) -> EngineResult<Vec<Node>> {
    let mut out = Vec::new();
    for n in nodes_in_project(conn, project)? {
        if is_actionable(conn, &n)? {
            out.push(n);
        }
    }
    rank(&mut out);
    Ok(out)
}

/// After a transaction resolves one or more nodes, walk their parents: a
/// parent with all children resolved and `auto_resolve != false` resolves
/// automatically with a synthetic `auto_resolve` evidence entry. Ascent
/// stops after one level unless the auto-resolved parent itself carries
/// `cascade_resolve = true`, in which case ascent continues to its own
/// parent and so on.
pub fn auto_resolve_cascade(
    conn: &Connection,
    agent: &str,
    just_resolved: &[String],
) -> EngineResult<Vec<String>> {
    let mut newly_resolved = Vec::new();
    let mut frontier: Vec<String> = just_resolved.to_vec();

    loop {
        let mut next_frontier = Vec::new();

        for id in &frontier {
            let node = match node_ops::get_opt(conn, id)? {
                Some(n) => n,
                None => continue,
            };
            let Some(parent_id) = node.parent.clone() else {
                continue;
            };
            let parent = node_ops::get(conn, &parent_id)?;
            if parent.resolved || !parent.auto_resolve_enabled() {
                continue;
            }

            let children = node_ops::children(conn, &parent_id)?;
            let total = children.len();
            let all_resolved = children.iter().all(|c| c.resolved);
            if !all_resolved {
                continue;
            }

            let mut patch = NodePatch::default();
            patch.evidence_add.push(EvidenceInput {
                kind: "auto_resolve".into(),
                reference: format!("{total}/{total} children resolved"),
            });
            patch.resolved = Some(true);

            let (updated, _changes) = node_ops::update(conn, &parent_id, agent, patch, None)?;
            // update() logs a plain `resolved` event; overwrite its action
            // tag so history distinguishes cascade resolutions from explicit ones.
            conn.execute(
                "UPDATE events SET action = ?1 WHERE node_id = ?2 AND id = (SELECT MAX(id) FROM events WHERE node_id = ?2)",
                params![EventAction::AutoResolved.as_str(), parent_id],
            )
            .map_err(|e| EngineError::from(StoreError::from(e)))?;

            newly_resolved.push(updated.id.clone());

            if parent.cascade_resolve_enabled() {
                next_frontier.push(updated.id);
            }
        }

        if next_frontier.is_empty() {
            break;
        }
        frontier = next_frontier;
    }

    Ok(newly_resolved)
}
