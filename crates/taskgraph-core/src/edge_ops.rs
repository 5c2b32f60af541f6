//! Edge layer: typed directed edges, cycle detection (spec.md §4.3).

use std::collections::HashSet;

use rusqlite::{params, Connection, OptionalExtension};

use crate::algorithms::is_actionable;
use crate::error::{EngineError, EngineResult, StoreError};
use crate::events::log_event;
use crate::model::{Edge, EventAction, Node};
use crate::node_ops::{self};
use crate::store::{new_id, now_rfc3339, row_to_edge};

/// Adds a directed edge. Validates both endpoints exist, rejects
/// `(from, to, type)` duplicates, and for `depends_on` runs a forward DFS
/// from `to`: if `from` is reachable, the new edge would close a cycle.
pub fn add_edge(conn: &Connection, from: &str, to: &str, edge_type: &str, agent: &str) -> EngineResult<Edge> {
    let from_node = node_ops::get(conn, from)?;
    let to_node = node_ops::get(conn, to)?;

    if edge_type == "depends_on" && from_node.project != to_node.project {
        return Err(EngineError::cross_project(from, to));
    }

    let exists = conn
        .query_row(
            "SELECT 1 FROM edges WHERE from_node = ?1 AND to_node = ?2 AND edge_type = ?3",
            params![from, to, edge_type],
            |_| Ok(()),
        )
        .optional()
        .map_err(|e| EngineError::from(StoreError::from(e)))?
        .is_some();
    if exists {
        return Err(EngineError::new(
            crate::error::ErrorCode::DuplicateEdge,
            format!("edge '{from}' -{edge_type}-> '{to}' already exists"),
        ));
    }

    if edge_type == "depends_on" && reaches(conn, to, from, "depends_on")? {
        return Err(EngineError::cycle_detected(from, to));
    }

    let id = new_id();
    let now = now_rfc3339();
    conn.execute(
        "INSERT INTO edges (id, from_node, to_node, edge_type, created_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![id, from, to, edge_type, agent, now],
    )
    .map_err(StoreError::from)?;

    conn.execute(
        "UPDATE nodes SET rev = rev + 1, updated_at = ?1 WHERE id = ?2",
        params![now, from],
    )
    .map_err(StoreError::from)?;

    log_event(conn, from, &from_node.project, EventAction::EdgeAdded, &[], agent, Some(&format!("-{edge_type}-> {to}")))
        .map_err(StoreError::from)?;

    conn.query_row("SELECT * FROM edges WHERE id = ?1", params![id], row_to_edge)
        .map_err(|e| EngineError::from(StoreError::from(e)))
}

pub fn remove_edge(conn: &Connection, from: &str, to: &str, edge_type: &str, agent: &str) -> EngineResult<()> {
    let from_node = node_ops::get(conn, from)?;
    let removed = conn
        .execute(
            "DELETE FROM edges WHERE from_node = ?1 AND to_node = ?2 AND edge_type = ?3",
            params![from, to, edge_type],
        )
        .map_err(StoreError::from)?;

    if removed > 0 {
        let now = now_rfc3339();
        conn.execute("UPDATE nodes SET rev = rev + 1, updated_at = ?1 WHERE id = ?2", params![now, from])
            .map_err(StoreError::from)?;
        log_event(conn, from, &from_node.project, EventAction::EdgeRemoved, &[], agent, Some(&format!("-{edge_type}-> {to}")))
            .map_err(StoreError::from)?;
    }

    Ok(())
}

pub fn edges_from(conn: &Connection, id: &str, edge_type: Option<&str>) -> EngineResult<Vec<Edge>> {
    query_edges(conn, "from_node", id, edge_type)
}

pub fn edges_to(conn: &Connection, id: &str, edge_type: Option<&str>) -> EngineResult<Vec<Edge>> {
    query_edges(conn, "to_node", id, edge_type)
}

fn query_edges(conn: &Connection, column: &str, id: &str, edge_type: Option<&str>) -> EngineResult<Vec<Edge>> {
    let sql = match edge_type {
        Some(_) => format!("SELECT * FROM edges WHERE {column} = ?1 AND edge_type = ?2"),
        None => format!("SELECT * FROM edges WHERE {column} = ?1"),
    };
    let mut stmt = conn.prepare(&sql).map_err(|e| EngineError::from(StoreError::from(e)))?;

    let rows = match edge_type {
        Some(t) => stmt
            .query_map(params![id, t], row_to_edge)
            .map_err(|e| EngineError::from(StoreError::from(e)))?
            .collect::<rusqlite::Result<Vec<_>>>(),
        None => stmt
            .query_map(params![id], row_to_edge)
            .map_err(|e| EngineError::from(StoreError::from(e)))?
            .collect::<rusqlite::Result<Vec<_>>>(),
    }
    .map_err(|e| EngineError::from(StoreError::from(e)))?;

    Ok(rows)
}

/// Forward DFS through `depends_on` edges (or any single `edge_type`)
/// starting at `start`, answering whether `target` is reachable. Used both
/// for cycle detection and could generalize to other traversal needs.
fn reaches(conn: &Connection, start: &str, target: &str, edge_type: &str) -> EngineResult<bool> {
    let mut seen = HashSet::new();
    let mut stack = vec![start.to_string()];

    while let Some(current) = stack.pop() {
        if current == target {
            return Ok(true);
        }
        if !seen.insert(current.clone()) {
            continue;
        }
        for edge in edges_from(conn, &current, Some(edge_type))? {
            stack.push(edge.to);
        }
    }

    Ok(false)
}

/// Nodes that became actionable in consequence of `resolved_ids` becoming
/// resolved. When given, the candidate set is restricted to nodes with a
/// `depends_on` edge into the resolved set plus their parents; otherwise
/// this scans the whole project.
pub fn find_newly_actionable(
    conn: &Connection,
    project: &str,
    resolved_ids: Option<&[String]>,
) -> EngineResult<Vec<Node>> {
    let candidates = match resolved_ids {
        Some(ids) => {
            let mut seen = HashSet::new();
            let mut out = Vec::new();
            for resolved_id in ids {
                for edge in edges_to(conn, resolved_id, Some("depends_on"))? {
                    if seen.insert(edge.from.clone()) {
                        out.push(node_ops::get(conn, &edge.from)?);
                    }
                }
                if let Some(node) = node_ops::get_opt(conn, resolved_id)? {
                    if let Some(parent_id) = node.parent {
                        if seen.insert(parent_id.clone()) {
                            out.push(node_ops::get(conn, &parent_id)?);
                        }
                    }
                }
            }
            out
        }
        None => {
            let mut stmt = conn
                .prepare("SELECT * FROM nodes WHERE project = ?1")
                .map_err(|e| EngineError::from(StoreError::from(e)))?;
            stmt.query_map(params![project], crate::store::row_to_node)
                .map_err(|e| EngineError::from(StoreError::from(e)))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| EngineError::from(StoreError::from(e)))?
        }
    };

    let mut actionable = Vec::new();
    for node in candidates {
        if is_actionable(conn, &node)? {
            actionable.push(node);
        }
    }
    crate::algorithms::rank(&mut actionable);
    Ok(actionable)
}
