//! `query` — filtered, sorted, paginated node search (spec.md §4.6).

use rusqlite::Connection;
use serde::Serialize;

use crate::algorithms::{is_actionable, is_descendant_of};
use crate::error::{EngineError, EngineResult, ErrorCode};
use crate::model::Node;
use crate::node_ops;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sort {
    Readiness,
    Depth,
    Recent,
    Created,
}

#[derive(Debug, Clone, Default)]
pub struct QueryFilter {
    pub resolved: Option<bool>,
    /// `(json_pointer_path, expected_value)` exact-match on a properties key.
    pub property_equals: Option<(String, crate::value::Value)>,
    pub text: Option<String>,
    pub ancestor: Option<String>,
    pub has_evidence_type: Option<String>,
    pub is_leaf: Option<bool>,
    pub is_actionable: Option<bool>,
    pub is_blocked: Option<bool>,
    /// `Some(Some(agent))` = claimed by that agent, `Some(None)` = unclaimed.
    pub claimed_by: Option<Option<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub nodes: Vec<Node>,
    pub total: i64,
    pub next_cursor: Option<String>,
}

fn cursor_key(n: &Node) -> (String, String) {
    (n.created_at.to_rfc3339(), n.id.clone())
}

fn decode_cursor(cursor: &str) -> Option<(String, String)> {
    let (ts, id) = cursor.split_once('\u{1f}')?;
    Some((ts.to_string(), id.to_string()))
}

fn encode_cursor(key: &(String, String)) -> String {
    format!("{}\u{1f}{}", key.0, key.1)
}

fn matches(conn: &Connection, node: &Node, filter: &QueryFilter) -> EngineResult<bool> {
    if let Some(resolved) = filter.resolved {
        if node.resolved != resolved {
            return Ok(false);
        }
    }
    if let Some((key, expected)) = &filter.property_equals {
        if node.properties.get(key) != Some(expected) {
            return Ok(false);
        }
    }
    if let Some(text) = &filter.text {
        if !node.summary.to_lowercase().contains(&text.to_lowercase()) {
            return Ok(false);
        }
    }
    if let Some(ancestor) = &filter.ancestor {
        if !is_descendant_of(conn, node, ancestor)? {
            return Ok(false);
        }
    }
    if let Some(kind) = &filter.has_evidence_type {
        if !node.evidence.iter().any(|e| &e.kind == kind) {
            return Ok(false);
        }
    }
    if let Some(want_leaf) = filter.is_leaf {
        let is_leaf = node_ops::children(conn, &node.id)?.is_empty();
        if is_leaf != want_leaf {
            return Ok(false);
        }
    }
    if let Some(want_actionable) = filter.is_actionable {
        if is_actionable(conn, node)? != want_actionable {
            return Ok(false);
        }
    }
    if let Some(want_blocked) = filter.is_blocked {
        if node.blocked != want_blocked {
            return Ok(false);
        }
    }
    if let Some(claimed_by) = &filter.claimed_by {
        match claimed_by {
            Some(agent) => {
                if node.claimed_by() != Some(agent.as_str()) {
                    return Ok(false);
                }
            }
            None => {
                if node.claimed_by().is_some() {
                    return Ok(false);
                }
            }
        }
    }
    Ok(true)
}

pub fn query(
    conn: &Connection,
    project: &str,
    filter: QueryFilter,
    sort: Sort,
    limit: i64,
    cursor: Option<&str>,
) -> EngineResult<QueryResult> {
    let mut stmt = conn
        .prepare("SELECT * FROM nodes WHERE project = ?1")
        .map_err(crate::error::StoreError::from)?;
    let all: Vec<Node> = stmt
        .query_map([project], crate::store::row_to_node)
        .map_err(crate::error::StoreError::from)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(crate::error::StoreError::from)?;

    let mut matched = Vec::new();
    for node in all {
        if matches(conn, &node, &filter)? {
            matched.push(node);
        }
    }
    let total = matched.len() as i64;

    match sort {
        Sort::Readiness => crate::algorithms::rank(&mut matched),
        Sort::Depth => matched.sort_by(|a, b| b.depth.cmp(&a.depth)),
        Sort::Recent => matched.sort_by(|a, b| b.updated_at.cmp(&a.updated_at)),
        Sort::Created => matched.sort_by(|a, b| cursor_key(a).cmp(&cursor_key(b))),
    }

    let start_after = match cursor {
        Some(c) => Some(
            decode_cursor(c).ok_or_else(|| EngineError::new(ErrorCode::InvalidInput, "malformed query cursor"))?,
        ),
        None => None,
    };

    let page: Vec<Node> = match start_after {
        Some(after) => matched.into_iter().skip_while(|n| cursor_key(n) <= after).collect(),
        None => matched,
    };

    let limit = limit.max(0) as usize;
    let has_more = page.len() > limit;
    let mut nodes = page;
    nodes.truncate(limit);

    let next_cursor = if has_more {
        nodes.last().map(|n| encode_cursor(&cursor_key(n)))
    } else {
        None
    };

    Ok(QueryResult { nodes, total, next_cursor })
}
