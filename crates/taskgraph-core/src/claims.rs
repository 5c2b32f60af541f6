//! Soft-claim coordination protocol (spec.md §4.5 "Claim protocol").
//!
//! No OS locks: claim state lives entirely inside `properties`, with a
//! TTL-driven visibility rule applied by the caller (`next`'s candidate
//! filter) rather than enforced by the store.

use std::time::Duration;

use chrono::Utc;
use rusqlite::Connection;

use crate::error::{EngineError, EngineResult, StoreError};
use crate::model::{EventAction, Node};
use crate::node_ops::{self, NodePatch};
use crate::value::Value;

fn retag_last_event(conn: &Connection, node_id: &str, action: EventAction) -> EngineResult<()> {
    conn.execute(
        "UPDATE events SET action = ?1 WHERE node_id = ?2 AND id = (SELECT MAX(id) FROM events WHERE node_id = ?2)",
        rusqlite::params![action.as_str(), node_id],
    )
    .map_err(|e| EngineError::from(StoreError::from(e)))?;
    Ok(())
}

/// True if `node` should be visible to `agent` in actionability candidate
/// lists: unclaimed, claimed by `agent` itself, or claimed but stale.
pub fn is_visible_to(node: &Node, agent: &str, ttl: Duration) -> bool {
    match node.claimed_by() {
        None => true,
        Some(owner) if owner == agent => true,
        Some(_) => match node.claimed_at() {
            Some(claimed_at) => {
                let age = Utc::now().signed_duration_since(claimed_at);
                age.to_std().map(|a| a > ttl).unwrap_or(true)
            }
            None => true,
        },
    }
}

pub fn claim(conn: &Connection, node_id: &str, agent: &str) -> EngineResult<Node> {
    let mut patch = NodePatch::default();
    patch
        .properties_patch
        .insert("_claimed_by".into(), Value::String(agent.to_string()));
    patch
        .properties_patch
        .insert("_claimed_at".into(), Value::String(Utc::now().to_rfc3339()));
    let (node, _) = node_ops::update(conn, node_id, agent, patch, None)?;
    retag_last_event(conn, node_id, EventAction::Claimed)?;
    Ok(node)
}

pub fn release(conn: &Connection, node_id: &str, agent: &str) -> EngineResult<Node> {
    let current = node_ops::get(conn, node_id)?;
    if let Some(owner) = current.claimed_by() {
        if owner != agent {
            return Err(EngineError::new(
                crate::error::ErrorCode::InvalidInput,
                format!("node '{node_id}' is claimed by '{owner}', not '{agent}'"),
            ));
        }
    }

    let mut patch = NodePatch::default();
    patch.properties_patch.insert("_claimed_by".into(), Value::Null);
    patch.properties_patch.insert("_claimed_at".into(), Value::Null);
    let (node, _) = node_ops::update(conn, node_id, agent, patch, None)?;
    retag_last_event(conn, node_id, EventAction::Released)?;
    Ok(node)
}
