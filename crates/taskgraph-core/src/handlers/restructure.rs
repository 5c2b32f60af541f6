//! `restructure` — atomic move/merge/drop/delete application (spec.md §4.6).

use rusqlite::Connection;
use serde::Serialize;

use crate::edge_ops::find_newly_actionable;
use crate::error::EngineResult;
use crate::model::Node;
use crate::restructure as ops;

#[derive(Debug, Clone)]
pub enum RestructureOp {
    Move { node_id: String, new_parent_id: String },
    Merge { source_id: String, target_id: String },
    Drop { node_id: String, reason: String },
    Delete { node_id: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct RestructureResult {
    pub touched: Vec<Node>,
    pub deleted_ids: Vec<String>,
    pub newly_actionable: Vec<Node>,
}

pub fn restructure(conn: &Connection, operations: Vec<RestructureOp>, agent: &str) -> EngineResult<RestructureResult> {
    let mut touched = Vec::new();
    let mut deleted_ids = Vec::new();
    let mut resolved_ids = Vec::new();
    let mut project = None;

    for op in operations {
        match op {
            RestructureOp::Move { node_id, new_parent_id } => {
                let node = ops::move_node(conn, &node_id, &new_parent_id, agent)?;
                project.get_or_insert_with(|| node.project.clone());
                touched.push(node);
            }
            RestructureOp::Merge { source_id, target_id } => {
                let node = ops::merge_node(conn, &source_id, &target_id, agent)?;
                project.get_or_insert_with(|| node.project.clone());
                touched.push(node);
            }
            RestructureOp::Drop { node_id, reason } => {
                let affected = ops::drop_subtree(conn, &node_id, &reason, agent)?;
                for id in &affected {
                    let node = crate::node_ops::get(conn, id)?;
                    project.get_or_insert_with(|| node.project.clone());
                    touched.push(node);
                }
                resolved_ids.extend(affected);
            }
            RestructureOp::Delete { node_id } => {
                if let Some(node) = crate::node_ops::get_opt(conn, &node_id)? {
                    project.get_or_insert_with(|| node.project.clone());
                }
                let ids = ops::delete_subtree(conn, &node_id)?;
                deleted_ids.extend(ids);
            }
        }
    }

    let newly_actionable = match &project {
        Some(p) if !resolved_ids.is_empty() || !deleted_ids.is_empty() => {
            let ids = if resolved_ids.is_empty() { None } else { Some(resolved_ids.as_slice()) };
            find_newly_actionable(conn, p, ids)?
        }
        _ => Vec::new(),
    };

    Ok(RestructureResult { touched, deleted_ids, newly_actionable })
}
