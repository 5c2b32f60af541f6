//! Append-only event log (spec.md §4.4).

use rusqlite::{params, Connection};

use crate::error::{StoreError, StoreResult};
use crate::model::{Change, Event, EventAction};
use crate::store::{now_rfc3339, row_to_event};

/// Appends one event row. Events are never updated or deleted except as a
/// side effect of deleting their owning node (see `restructure::delete`).
pub fn log_event(
    conn: &Connection,
    node_id: &str,
    project: &str,
    action: EventAction,
    changes: &[Change],
    agent: &str,
    note: Option<&str>,
) -> StoreResult<i64> {
    let changes_json = serde_json::to_string(changes)
        .map_err(|e| StoreError::Init(format!("serializing event changes: {e}")))?;
    let now = now_rfc3339();

    conn.execute(
        "INSERT INTO events (node_id, project, action, changes, agent, note, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![node_id, project, action.as_str(), changes_json, agent, note, now],
    )?;

    Ok(conn.last_insert_rowid())
}

/// Deletes every event for `node_id` (used when the node itself is deleted).
pub fn delete_events_for_node(conn: &Connection, node_id: &str) -> StoreResult<()> {
    conn.execute("DELETE FROM events WHERE node_id = ?1", params![node_id])?;
    Ok(())
}

/// Newest-first, keyset-paginated read. `cursor`, when present, is the
/// opaque string previously returned as `next_cursor`: `"<id>"` of the last
/// row seen (event ids are monotonic, so a single integer suffices as the
/// pagination key unlike the timestamp-keyed cursor used for nodes).
pub fn get_events(
    conn: &Connection,
    node_id: &str,
    limit: i64,
    cursor: Option<&str>,
) -> StoreResult<(Vec<Event>, Option<String>)> {
    let before_id: i64 = match cursor {
        Some(c) => c.parse().unwrap_or(i64::MAX),
        None => i64::MAX,
    };

    let mut stmt = conn.prepare(
        "SELECT id, node_id, project, action, changes, agent, note, timestamp
         FROM events WHERE node_id = ?1 AND id < ?2 ORDER BY id DESC LIMIT ?3",
    )?;

    let rows: Vec<Event> = stmt
        .query_map(params![node_id, before_id, limit + 1], row_to_event)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let has_more = rows.len() as i64 > limit;
    let mut events = rows;
    events.truncate(limit as usize);
    let next_cursor = if has_more {
        events.last().map(|e| e.id.to_string())
    } else {
        None
    };

    Ok((events, next_cursor))
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
    fn log_and_read_events_paginated() {
        let (store, _dir) = open_store();
        let conn = store.writer();
        conn.execute(
            "INSERT INTO nodes (id, rev, parent, project, summary, resolved, depth, properties, context_links, evidence, created_by, created_at, updated_at) VALUES ('n1',1,NULL,'p','root',0,0,'{}','[]','[]','a','t','t')",
            [],
        ).unwrap();

        for _ in 0..3 {
            log_event(&conn, "n1", "p", EventAction::Updated, &[], "agent", None).unwrap();
        }

        let (page1, cursor) = get_events(&conn, "n1", 2, None).unwrap();
        assert_eq!(page1.len(), 2);
        let cursor = cursor.expect("more events remain");

        let (page2, cursor2) = get_events(&conn, "n1", 2, Some(&cursor)).unwrap();
        assert_eq!(page2.len(), 1);
        assert!(cursor2.is_none());
    }
}
