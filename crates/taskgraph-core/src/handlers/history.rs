//! `history` — paginated event log for one node (spec.md §4.6).

use rusqlite::Connection;
use serde::Serialize;

use crate::error::EngineResult;
use crate::events::get_events;
use crate::model::Event;

#[derive(Debug, Clone, Serialize)]
pub struct HistoryResult {
    pub events: Vec<Event>,
    pub next_cursor: Option<String>,
}

pub fn history(conn: &Connection, node_id: &str, limit: i64, cursor: Option<&str>) -> EngineResult<HistoryResult> {
    let (events, next_cursor) = get_events(conn, node_id, limit, cursor).map_err(crate::error::EngineError::from)?;
    Ok(HistoryResult { events, next_cursor })
}
